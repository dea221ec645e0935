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

use super::estimate::{KalmanEstimate, Residual};
use super::ODError;
use crate::linalg::{DMatrix, DVector};
use crate::time::Epoch;

/// Automatic residual rejection criterion: measurements whose prefit ratio
/// exceeds `num_sigmas` are rejected and replaced by a pure time update.
#[derive(Copy, Clone, Debug)]
pub struct ResidRejectCrit {
    pub num_sigmas: f64,
}

impl Default for ResidRejectCrit {
    fn default() -> Self {
        Self { num_sigmas: 3.0 }
    }
}

/// An extended Kalman filter over a runtime-dimensioned, normalized state.
///
/// The filter works exclusively in normalized units: the caller normalizes
/// the state transition matrix, the process noise, the sensitivity matrix and
/// the residuals with the parameter scales and measurement sigmas, and
/// de-normalizes the corrections it reads back.
#[derive(Clone, Debug)]
pub struct KalmanFilter {
    /// The previous estimate, updated after each time or measurement update
    pub prev_estimate: KalmanEstimate,
    h_tilde: Option<DMatrix<f64>>,
    /// Optional automatic residual rejection
    pub resid_reject: Option<ResidRejectCrit>,
}

impl KalmanFilter {
    pub fn new(initial_estimate: KalmanEstimate) -> Self {
        Self {
            prev_estimate: initial_estimate,
            h_tilde: None,
            resid_reject: None,
        }
    }

    pub fn with_rejection(mut self, crit: ResidRejectCrit) -> Self {
        self.resid_reject = Some(crit);
        self
    }

    /// Update the normalized sensitivity matrix ("H tilde"). This function
    /// **must** be called prior to each call to `measurement_update`.
    pub fn update_h_tilde(&mut self, h_tilde: DMatrix<f64>) {
        self.h_tilde = Some(h_tilde);
    }

    /// Zeroes the state deviation, to be called after the reference trajectory
    /// has absorbed the correction.
    pub fn reset_deviation(&mut self) {
        self.prev_estimate.state_deviation.fill(0.0);
    }

    /// Computes a time update/prediction: propagates the covariance with the
    /// provided normalized error STM and adds the normalized process noise.
    pub fn time_update(
        &mut self,
        epoch: Epoch,
        phi: &DMatrix<f64>,
        q: &DMatrix<f64>,
    ) -> KalmanEstimate {
        let covar_bar = phi * &self.prev_estimate.covar * phi.transpose() + q;
        let state_bar = phi * &self.prev_estimate.state_deviation;
        let estimate = KalmanEstimate {
            epoch,
            state_deviation: state_bar,
            covar: covar_bar.clone(),
            covar_bar,
            stm: phi.clone(),
            predicted: true,
        };
        self.prev_estimate = estimate.clone();
        estimate
    }

    /// Computes the measurement update from the normalized prefit residual.
    ///
    /// The provided `r` is the normalized measurement noise matrix (identity
    /// for uncorrelated noise). Fails when the innovation covariance cannot
    /// be inverted; in that case the previous estimate remains in place.
    pub fn measurement_update(
        &mut self,
        epoch: Epoch,
        phi: &DMatrix<f64>,
        q: &DMatrix<f64>,
        prefit: DVector<f64>,
        r: DMatrix<f64>,
    ) -> Result<(KalmanEstimate, Residual), ODError> {
        let h_tilde = self.h_tilde.take().ok_or(ODError::SensitivityNotUpdated)?;
        let msr_dim = prefit.len();

        // Propagate the covariance
        let covar_bar = phi * &self.prev_estimate.covar * phi.transpose() + q;
        let state_bar = phi * &self.prev_estimate.state_deviation;

        // Project the propagated covariance into the measurement space and
        // compute the innovation covariance
        let s_k = &h_tilde * &covar_bar * h_tilde.transpose() + &r;

        // Prefit ratio for the automatic rejection
        let ratio = prefit
            .iter()
            .enumerate()
            .map(|(i, y)| y / s_k[(i, i)].sqrt())
            .sum::<f64>()
            / (msr_dim as f64);

        if let Some(crit) = self.resid_reject {
            if ratio.abs() > crit.num_sigmas {
                // Reject this measurement: perform only a time update
                let pred = self.time_update(epoch, phi, q);
                return Ok((pred, Residual::rejected(epoch, prefit, ratio)));
            }
        }

        // Invert the innovation covariance
        let s_k_inv = s_k
            .try_inverse()
            .ok_or(ODError::SingularKalmanGain { epoch })?;

        let gain = &covar_bar * h_tilde.transpose() * s_k_inv;

        // Innovation with respect to the predicted deviation
        let innovation = &prefit - &h_tilde * &state_bar;
        let state_hat = &state_bar + &gain * &innovation;
        let postfit = &prefit - &h_tilde * &state_hat;

        // Joseph form covariance update
        let identity = DMatrix::identity(covar_bar.nrows(), covar_bar.ncols());
        let first_term = &identity - &gain * &h_tilde;
        let covar = &first_term * &covar_bar * first_term.transpose() + &gain * r * gain.transpose();

        let estimate = KalmanEstimate {
            epoch,
            state_deviation: state_hat.clone(),
            covar,
            covar_bar,
            stm: phi.clone(),
            predicted: false,
        };
        self.prev_estimate = estimate.clone();

        let residual = Residual::accepted(epoch, prefit, postfit, ratio);
        Ok((estimate, residual))
    }
}

#[cfg(test)]
mod ut_filter {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// One dimensional constant state observed directly: the filter must
    /// converge towards the observation with shrinking variance.
    #[test]
    fn scalar_direct_observation() {
        let epoch = Epoch::from_gregorian_tai_at_midnight(2021, 1, 1);
        let initial = KalmanEstimate::from_covar(epoch, DMatrix::from_element(1, 1, 1.0));
        let mut kf = KalmanFilter::new(initial);

        let phi = DMatrix::identity(1, 1);
        let q = DMatrix::zeros(1, 1);
        let r = DMatrix::from_element(1, 1, 0.01);

        let mut prev_var = 1.0;
        for _ in 0..3 {
            kf.update_h_tilde(DMatrix::identity(1, 1));
            // The observed deviation from the (constant) nominal state is 1.0
            let (est, resid) = kf
                .measurement_update(epoch, &phi, &q, DVector::from_element(1, 1.0), r.clone())
                .unwrap();
            assert!(!resid.rejected);
            assert!(est.covar[(0, 0)] < prev_var);
            prev_var = est.covar[(0, 0)];
        }
        // After three updates of a noise free constant observation, the
        // deviation is within the remaining covariance of the observed value
        assert_abs_diff_eq!(kf.prev_estimate.state_deviation[0], 1.0, epsilon = 1e-2);
    }

    #[test]
    fn sensitivity_must_be_updated() {
        let epoch = Epoch::from_gregorian_tai_at_midnight(2021, 1, 1);
        let initial = KalmanEstimate::from_covar(epoch, DMatrix::identity(2, 2));
        let mut kf = KalmanFilter::new(initial);
        let phi = DMatrix::identity(2, 2);
        let q = DMatrix::zeros(2, 2);
        let out = kf.measurement_update(
            epoch,
            &phi,
            &q,
            DVector::zeros(1),
            DMatrix::identity(1, 1),
        );
        assert!(matches!(out, Err(ODError::SensitivityNotUpdated)));
    }

    #[test]
    fn singular_innovation_detected() {
        let epoch = Epoch::from_gregorian_tai_at_midnight(2021, 1, 1);
        // Zero covariance, zero noise: the innovation covariance is singular
        let initial = KalmanEstimate::from_covar(epoch, DMatrix::zeros(1, 1));
        let mut kf = KalmanFilter::new(initial);
        kf.update_h_tilde(DMatrix::identity(1, 1));
        let out = kf.measurement_update(
            epoch,
            &DMatrix::identity(1, 1),
            &DMatrix::zeros(1, 1),
            DVector::from_element(1, 0.1),
            DMatrix::zeros(1, 1),
        );
        assert!(matches!(out, Err(ODError::SingularKalmanGain { .. })));
    }
}
