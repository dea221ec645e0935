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

use super::{Dynamics, DynamicsError};
use crate::cosmic::Orbit;
use crate::linalg::{Matrix6, OVector, Vector6, U42, U6};
use crate::time::Unit;
use crate::State;
use hyperdual::linalg::norm;
use hyperdual::{hyperspace_from_vector, Float, Hyperdual};

/// Two-body orbital dynamics.
///
/// The gravity gradient needed for STM propagation is computed by automatic
/// differentiation over hyperdual numbers.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrbitalDynamics;

impl OrbitalDynamics {
    pub fn two_body() -> Self {
        Self
    }
}

impl Dynamics for OrbitalDynamics {
    type StateType = Orbit;

    fn eom(
        &self,
        delta_t: f64,
        state_vec: &OVector<f64, U42>,
        ctx: &Orbit,
    ) -> Result<OVector<f64, U42>, DynamicsError> {
        let mut osc = *ctx;
        osc.set(ctx.epoch + delta_t * Unit::Second, state_vec);

        let (d_x, d_stm) = if osc.stm.is_some() {
            let (fx, grad) = self.dual_eom(delta_t, &osc)?;
            // Phi_dot = A * Phi
            let stm_dt = grad * osc.stm()?;
            (fx, stm_dt)
        } else {
            let body_acceleration = (-osc.frame.gm() / osc.rmag_km().powi(3)) * osc.radius();
            let d_x = Vector6::from_iterator(
                osc.velocity()
                    .iter()
                    .chain(body_acceleration.iter())
                    .cloned(),
            );
            (d_x, Matrix6::zeros())
        };

        let mut d_vec = OVector::<f64, U42>::zeros();
        for i in 0..6 {
            d_vec[i] = d_x[i];
            for j in 0..6 {
                d_vec[6 + i * 6 + j] = d_stm[(i, j)];
            }
        }
        Ok(d_vec)
    }

    fn dual_eom(
        &self,
        _delta_t: f64,
        osc: &Orbit,
    ) -> Result<(Vector6<f64>, Matrix6<f64>), DynamicsError> {
        let pos_vel = Vector6::from_iterator(
            osc.radius().iter().chain(osc.velocity().iter()).cloned(),
        );
        let state: OVector<Hyperdual<f64, 7>, U6> = hyperspace_from_vector(&pos_vel);

        let radius = state.fixed_rows::<3>(0).into_owned();
        let velocity = state.fixed_rows::<3>(3).into_owned();

        let rmag = norm(&radius);
        let body_acceleration =
            radius * (Hyperdual::<f64, 7>::from_real(-osc.frame.gm()) / rmag.powi(3));

        let mut fx = Vector6::zeros();
        let mut grad = Matrix6::zeros();
        for i in 0..6 {
            fx[i] = if i < 3 {
                velocity[i].real()
            } else {
                body_acceleration[i - 3].real()
            };
            for j in 1..7 {
                grad[(i, j - 1)] = if i < 3 {
                    velocity[i][j]
                } else {
                    body_acceleration[i - 3][j]
                };
            }
        }

        Ok((fx, grad))
    }
}

#[cfg(test)]
mod ut_orbital {
    use super::*;
    use crate::cosmic::Frame;
    use crate::time::Epoch;
    use approx::assert_abs_diff_eq;

    #[test]
    fn gravity_gradient_against_analytical() {
        let epoch = Epoch::from_gregorian_tai_at_midnight(2021, 3, 4);
        let osc = Orbit::keplerian(7200.0, 0.05, 25.0, 10.0, 30.0, 80.0, epoch, Frame::EME2000);
        let dyn_ = OrbitalDynamics::two_body();
        let (_, grad) = dyn_.dual_eom(0.0, &osc).unwrap();

        // da/dr = mu * (3 r r^T / r^5 - I / r^3)
        let r = osc.radius();
        let rmag = osc.rmag_km();
        let gm = osc.frame.gm();
        for i in 0..3 {
            for j in 0..3 {
                let expected = gm * (3.0 * r[i] * r[j] / rmag.powi(5))
                    - if i == j { gm / rmag.powi(3) } else { 0.0 };
                assert_abs_diff_eq!(grad[(i + 3, j)], expected, epsilon = 1e-12);
                // dv/dv block is identity, dv/dr and da/dv blocks are zero
                let dv_dv = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(grad[(i, j + 3)], dv_dv, epsilon = 1e-14);
                assert_abs_diff_eq!(grad[(i, j)], 0.0, epsilon = 1e-14);
                assert_abs_diff_eq!(grad[(i + 3, j + 3)], 0.0, epsilon = 1e-14);
            }
        }
    }
}
