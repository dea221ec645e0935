/*
    Asteria, spaceflight dynamics in Rust
    Copyright (C) 2024-onwards Asteria contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::linalg::{Matrix3, Vector3};

mod timespan;
pub use timespan::TimeSpanMap;

/// Returns the skew-symmetric cross-product matrix of the provided vector, such that
/// `tilde_matrix(a) * b == a.cross(&b)`.
pub fn tilde_matrix(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v[2], v[1], v[2], 0.0, -v[0], -v[1], v[0], 0.0)
}

/// Returns the provided angle bounded to within [0; 2π).
pub fn between_0_2pi(angle_rad: f64) -> f64 {
    let twopi = 2.0 * std::f64::consts::PI;
    let mut bounded = angle_rad % twopi;
    if bounded < 0.0 {
        bounded += twopi;
    }
    bounded
}

/// Rotation about the X axis, angle in radians
pub fn r1(angle_rad: f64) -> Matrix3<f64> {
    let (s, c) = angle_rad.sin_cos();
    Matrix3::new(1.0, 0.0, 0.0, 0.0, c, s, 0.0, -s, c)
}

/// Rotation about the Y axis, angle in radians
pub fn r2(angle_rad: f64) -> Matrix3<f64> {
    let (s, c) = angle_rad.sin_cos();
    Matrix3::new(c, 0.0, -s, 0.0, 1.0, 0.0, s, 0.0, c)
}

/// Rotation about the Z axis, angle in radians
pub fn r3(angle_rad: f64) -> Matrix3<f64> {
    let (s, c) = angle_rad.sin_cos();
    Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0)
}

/// Root sum square of the difference between two cartesian vectors.
pub fn rss_errors(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    (a - b).norm()
}

#[cfg(test)]
mod ut_utils {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn tilde_matches_cross() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        let b = Vector3::new(-2.0, 0.5, 7.0);
        let via_tilde = tilde_matrix(&a) * b;
        let via_cross = a.cross(&b);
        for i in 0..3 {
            assert_abs_diff_eq!(via_tilde[i], via_cross[i], epsilon = 1e-14);
        }
    }

    #[test]
    fn angle_bounding() {
        use std::f64::consts::PI;
        assert_abs_diff_eq!(between_0_2pi(-PI / 2.0), 1.5 * PI, epsilon = 1e-14);
        assert_abs_diff_eq!(between_0_2pi(2.5 * PI), 0.5 * PI, epsilon = 1e-14);
    }

    #[test]
    fn rotations_are_orthonormal() {
        for dcm in &[r1(0.3), r2(-1.2), r3(2.8)] {
            let should_be_eye = dcm * dcm.transpose();
            for i in 0..3 {
                for j in 0..3 {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert_abs_diff_eq!(should_be_eye[(i, j)], expected, epsilon = 1e-14);
                }
            }
        }
    }
}
