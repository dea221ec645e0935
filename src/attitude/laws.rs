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

use super::{Attitude, AttitudeError, AttitudeLaw, PvProvider};
use crate::cosmic::Frame;
use crate::dynamics::solarpressure::sun_direction;
use crate::linalg::Vector3;
use crate::time::{Epoch, Unit};
use nalgebra::UnitQuaternion;
use std::f64::consts::PI;
use std::fmt;

/// Step used for the finite difference estimation of pointing law rates, in seconds.
const RATE_FD_STEP_S: f64 = 0.5;

/// Returns the rotation aligning the body +Z axis with the provided reference frame direction.
fn align_z_to(direction: &Vector3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::rotation_between(&Vector3::z(), direction)
        .unwrap_or_else(|| UnitQuaternion::from_axis_angle(&Vector3::x_axis(), PI))
}

/// Body frame angular rate from a central finite difference of the orientation.
fn rate_from_finite_diff(
    before: &UnitQuaternion<f64>,
    after: &UnitQuaternion<f64>,
    step_s: f64,
) -> Vector3<f64> {
    (before.inverse() * after).scaled_axis() / (2.0 * step_s)
}

/// A fixed orientation with respect to the reference frame.
#[derive(Clone, Debug)]
pub struct InertialLaw {
    pub orientation: UnitQuaternion<f64>,
}

impl InertialLaw {
    pub fn new(orientation: UnitQuaternion<f64>) -> Self {
        Self { orientation }
    }

    /// Body axes aligned with the reference frame axes.
    pub fn identity() -> Self {
        Self {
            orientation: UnitQuaternion::identity(),
        }
    }
}

impl AttitudeLaw for InertialLaw {
    fn attitude(
        &self,
        _pv: &dyn PvProvider,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<Attitude, AttitudeError> {
        Ok(Attitude::new(
            epoch,
            frame,
            self.orientation,
            Vector3::zeros(),
        ))
    }
}

impl fmt::Display for InertialLaw {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "inertial pointing")
    }
}

/// A spin stabilized law: a reference orientation rotating at a constant rate
/// about a body frame axis.
#[derive(Clone, Debug)]
pub struct SpinStabilized {
    /// Orientation at the reference epoch
    pub reference: UnitQuaternion<f64>,
    pub ref_epoch: Epoch,
    /// Spin axis, in the body frame (unit vector)
    pub axis: Vector3<f64>,
    /// Spin rate in rad/s
    pub spin_rate_rad_s: f64,
}

impl SpinStabilized {
    pub fn new(
        reference: UnitQuaternion<f64>,
        ref_epoch: Epoch,
        axis: Vector3<f64>,
        spin_rate_rad_s: f64,
    ) -> Self {
        Self {
            reference,
            ref_epoch,
            axis: axis.normalize(),
            spin_rate_rad_s,
        }
    }
}

impl AttitudeLaw for SpinStabilized {
    fn attitude(
        &self,
        _pv: &dyn PvProvider,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<Attitude, AttitudeError> {
        let angle = self.spin_rate_rad_s * (epoch - self.ref_epoch).to_seconds();
        let orientation =
            self.reference * UnitQuaternion::from_scaled_axis(self.axis * angle);
        Ok(Attitude::new(
            epoch,
            frame,
            orientation,
            self.axis * self.spin_rate_rad_s,
        ))
    }
}

impl fmt::Display for SpinStabilized {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "spin stabilized @ {:.3e} rad/s", self.spin_rate_rad_s)
    }
}

/// Body +Z axis pointed at the Sun (low precision analytical Sun direction).
#[derive(Clone, Debug, Default)]
pub struct SunPointing;

impl AttitudeLaw for SunPointing {
    fn attitude(
        &self,
        _pv: &dyn PvProvider,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<Attitude, AttitudeError> {
        let orientation = align_z_to(&sun_direction(epoch));
        let before = align_z_to(&sun_direction(epoch - RATE_FD_STEP_S * Unit::Second));
        let after = align_z_to(&sun_direction(epoch + RATE_FD_STEP_S * Unit::Second));
        let rate = rate_from_finite_diff(&before, &after, RATE_FD_STEP_S);
        Ok(Attitude::new(epoch, frame, orientation, rate))
    }
}

impl fmt::Display for SunPointing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "sun pointing")
    }
}

/// Body +Z axis pointed at the center of the frame (nadir for Earth orbits).
#[derive(Clone, Debug, Default)]
pub struct NadirPointing;

impl NadirPointing {
    fn orientation_at(
        pv: &dyn PvProvider,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<UnitQuaternion<f64>, AttitudeError> {
        let (radius, _) = pv.position_velocity(epoch, frame)?;
        Ok(align_z_to(&(-radius.normalize())))
    }
}

impl AttitudeLaw for NadirPointing {
    fn attitude(
        &self,
        pv: &dyn PvProvider,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<Attitude, AttitudeError> {
        let orientation = Self::orientation_at(pv, epoch, frame)?;
        let before = Self::orientation_at(pv, epoch - RATE_FD_STEP_S * Unit::Second, frame)?;
        let after = Self::orientation_at(pv, epoch + RATE_FD_STEP_S * Unit::Second, frame)?;
        let rate = rate_from_finite_diff(&before, &after, RATE_FD_STEP_S);
        Ok(Attitude::new(epoch, frame, orientation, rate))
    }
}

impl fmt::Display for NadirPointing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "nadir pointing")
    }
}

#[cfg(test)]
mod ut_laws {
    use super::*;
    use crate::attitude::AngularDerivativesFilter;
    use crate::cosmic::Orbit;
    use approx::assert_abs_diff_eq;

    fn leo() -> Orbit {
        let epoch = Epoch::from_gregorian_tai_at_midnight(2021, 6, 1);
        Orbit::keplerian(7000.0, 0.001, 45.0, 0.0, 0.0, 0.0, epoch, Frame::EME2000)
    }

    #[test]
    fn spin_stabilized_rotates_about_axis() {
        let orbit = leo();
        let law = SpinStabilized::new(
            UnitQuaternion::identity(),
            orbit.epoch,
            Vector3::z(),
            0.01,
        );
        let att = law
            .attitude(&orbit, orbit.epoch + 100 * Unit::Second, Frame::EME2000)
            .unwrap();
        let (_, angle) = att.orientation.axis_angle().unwrap();
        assert_abs_diff_eq!(angle, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(att.rate_rad_s[2], 0.01, epsilon = 1e-15);
    }

    #[test]
    fn nadir_points_to_center() {
        let orbit = leo();
        let att = NadirPointing
            .attitude(&orbit, orbit.epoch, Frame::EME2000)
            .unwrap();
        let z_in_frame = att.orientation * Vector3::z();
        let expected = -orbit.radius().normalize();
        for i in 0..3 {
            assert_abs_diff_eq!(z_in_frame[i], expected[i], epsilon = 1e-12);
        }
        // The pointing rate tracks the orbital rate
        let orbital_rate = orbit.hvec().norm() / orbit.rmag_km().powi(2);
        assert_abs_diff_eq!(att.rate_rad_s.norm(), orbital_rate, epsilon = 1e-6);
    }

    #[test]
    fn interpolation_boundary_continuity() {
        let orbit = leo();
        let epoch = orbit.epoch;
        let start_law = InertialLaw::identity();
        let end_law = SpinStabilized::new(
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.3),
            epoch,
            Vector3::x(),
            5e-3,
        );
        let start = start_law.attitude(&orbit, epoch, Frame::EME2000).unwrap();
        let end = end_law
            .attitude(&orbit, epoch + 60 * Unit::Second, Frame::EME2000)
            .unwrap();

        for filter in [
            AngularDerivativesFilter::UseR,
            AngularDerivativesFilter::UseRR,
            AngularDerivativesFilter::UseRRA,
        ] {
            let at_start = Attitude::interpolate(&start, &end, start.epoch, filter).unwrap();
            let at_end = Attitude::interpolate(&start, &end, end.epoch, filter).unwrap();
            assert!(
                at_start.orientation.angle_to(&start.orientation) < 1e-10,
                "rotation discontinuity at transition start with {filter:?}"
            );
            assert!(
                at_end.orientation.angle_to(&end.orientation) < 1e-10,
                "rotation discontinuity at transition end with {filter:?}"
            );
            if filter != AngularDerivativesFilter::UseR {
                for i in 0..3 {
                    assert_abs_diff_eq!(
                        at_start.rate_rad_s[i],
                        start.rate_rad_s[i],
                        epsilon = 1e-10
                    );
                    assert_abs_diff_eq!(at_end.rate_rad_s[i], end.rate_rad_s[i], epsilon = 1e-10);
                }
            }
        }
    }
}
