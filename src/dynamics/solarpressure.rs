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

use super::{DynamicsError, ForceModel};
use crate::cosmic::{Spacecraft, SC_IDX_CR, SPEED_OF_LIGHT};
use crate::linalg::{Matrix3, Vector3};
use crate::time::Epoch;
use std::fmt;

/// Cannonball solar radiation pressure with the classical (isotropic)
/// convention: the force is along the Sun-to-spacecraft direction and scales
/// linearly with the reflectivity coefficient C_r.
///
/// The Sun direction comes from a low precision analytical series; loading a
/// planetary ephemeris is out of scope.
#[derive(Clone, Copy, Debug)]
pub struct SolarPressure {
    /// Solar flux at one astronomical unit, in W/m^2
    pub phi_w_m2: f64,
    /// Whether the cylindrical Earth shadow cancels the force
    pub shadow: bool,
}

impl Default for SolarPressure {
    fn default() -> Self {
        Self {
            phi_w_m2: 1367.0,
            shadow: true,
        }
    }
}

/// Returns the unit vector from the Earth to the Sun in EME2000, from the
/// low precision series of the Astronomical Almanac (about 0.01 deg accuracy).
pub fn sun_direction(epoch: Epoch) -> Vector3<f64> {
    // Days since J2000 (TT)
    let n = (epoch - Epoch::from_gregorian_tai(2000, 1, 1, 12, 0, 0, 0)).to_unit(hifitime::Unit::Day);
    let mean_lon_deg = 280.460 + 0.985_647_4 * n;
    let mean_anomaly = (357.528 + 0.985_600_3 * n).to_radians();
    let ecliptic_lon = (mean_lon_deg
        + 1.915 * mean_anomaly.sin()
        + 0.020 * (2.0 * mean_anomaly).sin())
    .to_radians();
    let obliquity = (23.439 - 4.0e-7 * n).to_radians();
    Vector3::new(
        ecliptic_lon.cos(),
        obliquity.cos() * ecliptic_lon.sin(),
        obliquity.sin() * ecliptic_lon.sin(),
    )
}

/// Returns 0.0 if the provided position is inside the cylindrical Earth
/// shadow, 1.0 otherwise.
pub fn shadow_factor(radius_km: &Vector3<f64>, sun_dir: &Vector3<f64>, body_radius_km: f64) -> f64 {
    let along_sun = radius_km.dot(sun_dir);
    if along_sun >= 0.0 {
        // On the day side
        return 1.0;
    }
    let transverse = radius_km - along_sun * sun_dir;
    if transverse.norm() < body_radius_km {
        0.0
    } else {
        1.0
    }
}

impl ForceModel for SolarPressure {
    fn estimation_index(&self) -> Option<usize> {
        Some(SC_IDX_CR)
    }

    fn eom(&self, ctx: &Spacecraft) -> Result<Vector3<f64>, DynamicsError> {
        let sun_dir = sun_direction(ctx.orbit.epoch);
        let nu = if self.shadow {
            shadow_factor(
                &ctx.radius(),
                &sun_dir,
                ctx.orbit.frame.equatorial_radius_km(),
            )
        } else {
            1.0
        };
        // Solar pressure in N/m^2 at the spacecraft; the spacecraft-to-Sun
        // distance is within 5e-5 AU of one AU for any Earth orbit, so the
        // inverse square scaling over the orbit is omitted.
        let pressure_n_m2 = self.phi_w_m2 / SPEED_OF_LIGHT;
        // Force pushes away from the Sun, in kN
        let force = nu * pressure_n_m2 * ctx.srp_cr * ctx.srp_area_m2 * 1e-3 * (-sun_dir);
        Ok(force)
    }

    fn dual_eom(
        &self,
        ctx: &Spacecraft,
    ) -> Result<(Vector3<f64>, Matrix3<f64>, Vector3<f64>), DynamicsError> {
        let force = self.eom(ctx)?;
        // The flux gradient over an Earth orbit is negligible
        let dfdr = Matrix3::zeros();
        let dfdcr = force / ctx.srp_cr;
        Ok((force, dfdr, dfdcr))
    }
}

impl fmt::Display for SolarPressure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Cannonball SRP (phi = {:.1} W/m^2)", self.phi_w_m2)
    }
}

#[cfg(test)]
mod ut_srp {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn sun_direction_is_unit() {
        let epoch = Epoch::from_gregorian_tai_at_midnight(2023, 6, 21);
        let dir = sun_direction(epoch);
        assert_abs_diff_eq!(dir.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn shadow_cylinder() {
        let sun = Vector3::new(1.0, 0.0, 0.0);
        // Behind the Earth, inside the cylinder
        assert_eq!(
            shadow_factor(&Vector3::new(-7000.0, 100.0, 0.0), &sun, 6378.0),
            0.0
        );
        // Behind the Earth but outside the cylinder
        assert_eq!(
            shadow_factor(&Vector3::new(-7000.0, 6500.0, 0.0), &sun, 6378.0),
            1.0
        );
        // Day side
        assert_eq!(
            shadow_factor(&Vector3::new(7000.0, 0.0, 0.0), &sun, 6378.0),
            1.0
        );
    }
}
