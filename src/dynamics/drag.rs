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
use crate::cosmic::{Spacecraft, SC_IDX_CD};
use crate::linalg::{Matrix3, Vector3};
use std::fmt;

/// Earth rotation rate in rad/s, about the +Z axis of the inertial frame.
const EARTH_ROTATION_RATE: f64 = 7.292_115_146_706_979e-5;

/// Exponential atmosphere drag.
///
/// The density is `rho0 * exp(-(h - h0) / H)` where `h` is the altitude above
/// the mean equatorial radius. The relative velocity accounts for a rigidly
/// co-rotating atmosphere.
#[derive(Clone, Copy, Debug)]
pub struct AtmosphericDrag {
    /// Reference density, in kg/m^3
    pub rho0_kg_m3: f64,
    /// Reference altitude, in km
    pub ref_alt_km: f64,
    /// Scale height, in km
    pub scale_height_km: f64,
}

impl AtmosphericDrag {
    /// An exponential model of the Earth thermosphere, reasonable between roughly 300 and 500 km altitude.
    pub fn earth_exponential() -> Self {
        Self {
            rho0_kg_m3: 3.614e-13,
            ref_alt_km: 700.0,
            scale_height_km: 88.667,
        }
    }

    fn density_kg_m3(&self, altitude_km: f64) -> f64 {
        self.rho0_kg_m3 * (-(altitude_km - self.ref_alt_km) / self.scale_height_km).exp()
    }
}

impl ForceModel for AtmosphericDrag {
    fn estimation_index(&self) -> Option<usize> {
        Some(SC_IDX_CD)
    }

    fn eom(&self, ctx: &Spacecraft) -> Result<Vector3<f64>, DynamicsError> {
        let r = ctx.radius();
        let altitude_km = ctx.orbit.rmag_km() - ctx.orbit.frame.equatorial_radius_km();
        let rho = self.density_kg_m3(altitude_km);

        let omega = Vector3::new(0.0, 0.0, EARTH_ROTATION_RATE);
        let v_rel = ctx.velocity() - omega.cross(&r);

        // rho [kg/m^3] * area [m^2] * v^2 [km^2/s^2] * 1e3 yields kN
        let force = -0.5 * rho * ctx.drag_cd * ctx.drag_area_m2 * 1e3 * v_rel.norm() * v_rel;
        Ok(force)
    }

    fn dual_eom(
        &self,
        ctx: &Spacecraft,
    ) -> Result<(Vector3<f64>, Matrix3<f64>, Vector3<f64>), DynamicsError> {
        let force = self.eom(ctx)?;

        // Position partials keep only the density gradient term; the omega x r
        // contribution to the relative velocity is below the gradient term by
        // several orders of magnitude at thermospheric altitudes.
        let r_hat = ctx.radius() / ctx.orbit.rmag_km();
        let mut dfdr = Matrix3::zeros();
        for i in 0..3 {
            for j in 0..3 {
                dfdr[(i, j)] = -force[i] * r_hat[j] / self.scale_height_km;
            }
        }

        let dfdcd = force / ctx.drag_cd;
        Ok((force, dfdr, dfdcd))
    }
}

impl fmt::Display for AtmosphericDrag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Exponential drag (rho0 = {:.3e} kg/m^3, H = {:.1} km)",
            self.rho0_kg_m3, self.scale_height_km
        )
    }
}

#[cfg(test)]
mod ut_drag {
    use super::*;
    use crate::cosmic::{Frame, Orbit};
    use crate::time::Epoch;

    #[test]
    fn drag_opposes_velocity() {
        let epoch = Epoch::from_gregorian_tai_at_midnight(2022, 10, 12);
        let orbit = Orbit::keplerian(6778.0, 0.0001, 51.6, 0.0, 0.0, 0.0, epoch, Frame::EME2000);
        let sc = Spacecraft::from_orbit(orbit);
        let force = AtmosphericDrag::earth_exponential().eom(&sc).unwrap();
        assert!(force.dot(&sc.velocity()) < 0.0, "drag must oppose motion");
    }

    #[test]
    fn density_decays_with_altitude() {
        let model = AtmosphericDrag::earth_exponential();
        assert!(model.density_kg_m3(400.0) > model.density_kg_m3(500.0));
    }
}
