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

use super::{Dynamics, DynamicsError, ForceModel, OrbitalDynamics};
use crate::cosmic::{Spacecraft, SC_IDX_MASS};
use crate::linalg::{OMatrix, OVector, U9, U90};
use crate::time::Unit;
use crate::State;
use std::sync::Arc;

/// Spacecraft dynamics: two-body orbital dynamics plus any number of force
/// models, integrating the nine dimensional spacecraft state and, when
/// enabled, its 9x9 state transition matrix.
#[derive(Clone)]
pub struct SpacecraftDynamics {
    pub orbital_dyn: OrbitalDynamics,
    pub force_models: Vec<Arc<dyn ForceModel>>,
}

impl SpacecraftDynamics {
    /// Spacecraft dynamics with only the central body point mass.
    pub fn two_body() -> Self {
        Self {
            orbital_dyn: OrbitalDynamics::two_body(),
            force_models: Vec::new(),
        }
    }

    /// Spacecraft dynamics with the provided force models.
    pub fn new(force_models: Vec<Arc<dyn ForceModel>>) -> Self {
        Self {
            orbital_dyn: OrbitalDynamics::two_body(),
            force_models,
        }
    }

    /// Adds a force model to these dynamics.
    pub fn add_model(&mut self, force_model: Arc<dyn ForceModel>) {
        self.force_models.push(force_model);
    }
}

impl Dynamics for SpacecraftDynamics {
    type StateType = Spacecraft;

    fn eom(
        &self,
        delta_t: f64,
        state_vec: &OVector<f64, U90>,
        ctx: &Spacecraft,
    ) -> Result<OVector<f64, U90>, DynamicsError> {
        let mut osc = *ctx;
        osc.set(ctx.epoch() + delta_t * Unit::Second, state_vec);

        if osc.mass_kg <= 0.0 {
            return Err(DynamicsError::NonPositiveMass {
                mass_kg: osc.mass_kg,
            });
        }

        let mut d_vec = OVector::<f64, U90>::zeros();
        // Velocity
        for (i, vel) in osc.velocity().iter().enumerate() {
            d_vec[i] = *vel;
        }
        // Central body acceleration
        let body_acc = (-osc.orbit.frame.gm() / osc.orbit.rmag_km().powi(3)) * osc.radius();
        for i in 0..3 {
            d_vec[3 + i] = body_acc[i];
        }
        // Force models, force in kN over mass in kg yields km/s^2
        for model in &self.force_models {
            let force = model.eom(&osc)?;
            for i in 0..3 {
                d_vec[3 + i] += force[i] / osc.mass_kg;
            }
        }
        // cr, cd and mass are constant through natural dynamics

        if osc.stm.is_some() {
            let (_, grad) = self.dual_eom(delta_t, &osc)?;
            // Phi_dot = A * Phi
            let stm_dt = grad * osc.stm()?;
            for i in 0..9 {
                for j in 0..9 {
                    d_vec[9 + i * 9 + j] = stm_dt[(i, j)];
                }
            }
        }

        Ok(d_vec)
    }

    fn dual_eom(
        &self,
        delta_t: f64,
        osc: &Spacecraft,
    ) -> Result<(OVector<f64, U9>, OMatrix<f64, U9, U9>), DynamicsError> {
        let mut fx = OVector::<f64, U9>::zeros();
        let mut grad = OMatrix::<f64, U9, U9>::zeros();

        // Two-body blocks from the orbital dynamics
        let (fx_orb, grad_orb) = self.orbital_dyn.dual_eom(delta_t, &osc.orbit)?;
        for i in 0..6 {
            fx[i] = fx_orb[i];
            for j in 0..6 {
                grad[(i, j)] = grad_orb[(i, j)];
            }
        }

        // Force model contributions to the acceleration rows
        for model in &self.force_models {
            let (force, dfdr, dfdcoeff) = model.dual_eom(osc)?;
            for i in 0..3 {
                fx[3 + i] += force[i] / osc.mass_kg;
                for j in 0..3 {
                    grad[(3 + i, j)] += dfdr[(i, j)] / osc.mass_kg;
                }
                if let Some(idx) = model.estimation_index() {
                    grad[(3 + i, idx)] += dfdcoeff[i] / osc.mass_kg;
                }
                // a = F/m, so da/dm = -F/m^2
                grad[(3 + i, SC_IDX_MASS)] -= force[i] / osc.mass_kg.powi(2);
            }
        }

        Ok((fx, grad))
    }
}

#[cfg(test)]
mod ut_sc_dynamics {
    use super::*;
    use crate::cosmic::{Frame, Orbit, SC_IDX_CD, SC_IDX_CR};
    use crate::dynamics::{AtmosphericDrag, SolarPressure};
    use crate::time::Epoch;
    use approx::assert_abs_diff_eq;

    #[test]
    fn stm_gradient_has_force_partials() {
        let epoch = Epoch::from_gregorian_tai_at_midnight(2022, 10, 12);
        let orbit = Orbit::keplerian(6778.0, 0.001, 51.6, 30.0, 40.0, 0.0, epoch, Frame::EME2000);
        let sc = Spacecraft::from_orbit(orbit).with_stm();

        let mut dynamics = SpacecraftDynamics::two_body();
        dynamics.add_model(Arc::new(AtmosphericDrag::earth_exponential()));
        dynamics.add_model(Arc::new(SolarPressure::default()));

        let (_, grad) = dynamics.dual_eom(0.0, &sc).unwrap();
        // The drag and SRP coefficients columns must be populated on the acceleration rows
        let cd_col: f64 = (0..3).map(|i| grad[(3 + i, SC_IDX_CD)].abs()).sum();
        let cr_col: f64 = (0..3).map(|i| grad[(3 + i, SC_IDX_CR)].abs()).sum();
        assert!(cd_col > 0.0, "drag coefficient partials are zero");
        assert!(cr_col > 0.0, "SRP coefficient partials are zero");
        // The coefficient states have no dynamics of their own
        for j in 0..9 {
            assert_abs_diff_eq!(grad[(SC_IDX_CR, j)], 0.0);
            assert_abs_diff_eq!(grad[(SC_IDX_CD, j)], 0.0);
        }
    }
}
