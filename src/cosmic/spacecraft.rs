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

use super::{AstroError, Orbit, State};
use crate::dynamics::DynamicsError;
use crate::linalg::{OMatrix, OVector, Vector3, U9, U90};
use crate::time::{Duration, Epoch};
use std::fmt;
use typed_builder::TypedBuilder;

/// A spacecraft state: an orbit plus the physical parameters needed by the
/// force models and estimated by the orbit determination process.
///
/// The state vector layout is fixed for the lifetime of the crate:
/// `[x, y, z, vx, vy, vz, cr, cd, mass]`, followed by the 9x9 STM rows when
/// STM computation is enabled.
#[derive(Copy, Clone, Debug, PartialEq, TypedBuilder)]
pub struct Spacecraft {
    /// The orbit of this spacecraft
    pub orbit: Orbit,
    /// Total mass in kg
    #[builder(default = 1_000.0)]
    pub mass_kg: f64,
    /// Solar radiation pressure reflectivity coefficient
    #[builder(default = 1.8)]
    pub srp_cr: f64,
    /// Solar radiation pressure area in m^2
    #[builder(default = 20.0)]
    pub srp_area_m2: f64,
    /// Drag coefficient
    #[builder(default = 2.2)]
    pub drag_cd: f64,
    /// Drag area in m^2
    #[builder(default = 20.0)]
    pub drag_area_m2: f64,
    /// Optional 9x9 state transition matrix, set by STM-enabled propagation.
    #[builder(default, setter(skip))]
    pub stm: Option<OMatrix<f64, U9, U9>>,
}

/// Index of the SRP coefficient in the spacecraft state vector
pub const SC_IDX_CR: usize = 6;
/// Index of the drag coefficient in the spacecraft state vector
pub const SC_IDX_CD: usize = 7;
/// Index of the mass in the spacecraft state vector
pub const SC_IDX_MASS: usize = 8;

impl Spacecraft {
    /// Creates a new spacecraft from an orbit with default physical parameters.
    pub fn from_orbit(orbit: Orbit) -> Self {
        Self::builder().orbit(orbit).build()
    }

    /// Returns a copy of this spacecraft with STM computation enabled (STM reset to identity).
    pub fn with_stm(mut self) -> Self {
        self.stm = Some(OMatrix::<f64, U9, U9>::identity());
        self
    }

    /// Returns a copy of this spacecraft with the provided orbit, keeping the physical parameters.
    pub fn with_orbit(mut self, orbit: Orbit) -> Self {
        self.orbit = orbit;
        self
    }

    /// Returns the radius vector in kilometers
    pub fn radius(&self) -> Vector3<f64> {
        self.orbit.radius()
    }

    /// Returns the velocity vector in kilometers per second
    pub fn velocity(&self) -> Vector3<f64> {
        self.orbit.velocity()
    }

    /// Two-body analytical shift of this spacecraft state, physical parameters unchanged.
    pub fn shifted_by(&self, duration: Duration) -> Result<Self, AstroError> {
        let mut shifted = *self;
        shifted.orbit = self.orbit.shifted_by(duration)?;
        Ok(shifted)
    }

    /// Applies an instantaneous velocity increment, in km/s.
    pub fn with_dv_km_s(mut self, dv: Vector3<f64>) -> Self {
        self.orbit.vx_km_s += dv[0];
        self.orbit.vy_km_s += dv[1];
        self.orbit.vz_km_s += dv[2];
        self
    }
}

impl State for Spacecraft {
    type Size = U9;
    type VecLength = U90;

    fn to_vector(&self) -> OVector<f64, U90> {
        let mut as_vec = OVector::<f64, U90>::zeros();
        as_vec[0] = self.orbit.x_km;
        as_vec[1] = self.orbit.y_km;
        as_vec[2] = self.orbit.z_km;
        as_vec[3] = self.orbit.vx_km_s;
        as_vec[4] = self.orbit.vy_km_s;
        as_vec[5] = self.orbit.vz_km_s;
        as_vec[SC_IDX_CR] = self.srp_cr;
        as_vec[SC_IDX_CD] = self.drag_cd;
        as_vec[SC_IDX_MASS] = self.mass_kg;
        if let Some(stm) = self.stm {
            for i in 0..9 {
                for j in 0..9 {
                    as_vec[9 + i * 9 + j] = stm[(i, j)];
                }
            }
        }
        as_vec
    }

    fn set(&mut self, epoch: Epoch, vector: &OVector<f64, U90>) {
        self.orbit.epoch = epoch;
        self.orbit.x_km = vector[0];
        self.orbit.y_km = vector[1];
        self.orbit.z_km = vector[2];
        self.orbit.vx_km_s = vector[3];
        self.orbit.vy_km_s = vector[4];
        self.orbit.vz_km_s = vector[5];
        self.srp_cr = vector[SC_IDX_CR];
        self.drag_cd = vector[SC_IDX_CD];
        self.mass_kg = vector[SC_IDX_MASS];
        if let Some(stm) = self.stm.as_mut() {
            for i in 0..9 {
                for j in 0..9 {
                    stm[(i, j)] = vector[9 + i * 9 + j];
                }
            }
        }
    }

    fn epoch(&self) -> Epoch {
        self.orbit.epoch
    }

    fn set_epoch(&mut self, epoch: Epoch) {
        self.orbit.epoch = epoch;
    }

    fn stm(&self) -> Result<OMatrix<f64, U9, U9>, DynamicsError> {
        self.stm.ok_or(DynamicsError::StateTransitionMatrixUnset)
    }

    fn reset_stm(&mut self) {
        if self.stm.is_some() {
            self.stm = Some(OMatrix::<f64, U9, U9>::identity());
        }
    }

    fn add(mut self, other: OVector<f64, U9>) -> Self {
        self.orbit.x_km += other[0];
        self.orbit.y_km += other[1];
        self.orbit.z_km += other[2];
        self.orbit.vx_km_s += other[3];
        self.orbit.vy_km_s += other[4];
        self.orbit.vz_km_s += other[5];
        self.srp_cr += other[SC_IDX_CR];
        self.drag_cd += other[SC_IDX_CD];
        self.mass_kg += other[SC_IDX_MASS];
        self
    }
}

impl Default for Spacecraft {
    fn default() -> Self {
        Self::from_orbit(Orbit::default())
    }
}

impl fmt::Display for Spacecraft {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}\tmass = {:.3} kg\tcr = {:.3}\tcd = {:.3}",
            self.orbit, self.mass_kg, self.srp_cr, self.drag_cd
        )
    }
}

#[cfg(test)]
mod ut_spacecraft {
    use super::*;
    use crate::cosmic::Frame;
    use approx::assert_abs_diff_eq;

    #[test]
    fn vector_roundtrip_with_stm() {
        let epoch = Epoch::from_gregorian_tai_at_midnight(2021, 3, 4);
        let orbit = Orbit::keplerian(8000.0, 0.2, 35.0, 45.0, 90.0, 10.0, epoch, Frame::EME2000);
        let sc = Spacecraft::from_orbit(orbit).with_stm();
        let vec = sc.to_vector();
        let mut rebuilt = sc;
        rebuilt.set(epoch, &vec);
        assert_eq!(rebuilt, sc);
        // STM must be identity right after enabling it
        let stm = sc.stm().unwrap();
        for i in 0..9 {
            assert_abs_diff_eq!(stm[(i, i)], 1.0);
        }
    }

    #[test]
    fn stm_unset_errors() {
        let sc = Spacecraft::default();
        assert!(sc.stm().is_err());
    }
}
