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

use crate::linalg::{DMatrix, Matrix3};
use crate::time::{Duration, Epoch};
use std::fmt;

/// Provides the physical covariance matrices consumed by the sequential
/// estimator: the initial covariance and the process noise accumulated
/// between two estimation epochs. All values are in physical units; the
/// process normalizes them.
pub trait CovarianceProvider: Send + Sync {
    /// Physical initial covariance of dimension `dim`.
    fn initial_covariance(&self, dim: usize) -> DMatrix<f64>;

    /// Physical process noise accumulated from `prev` to `next`, of dimension `dim`.
    fn process_noise(&self, prev: Epoch, next: Epoch, dim: usize) -> DMatrix<f64>;
}

/// A covariance provider from constant diagonals. Diagonals shorter than the
/// requested dimension are zero padded.
#[derive(Clone, Debug, Default)]
pub struct ConstantCovariance {
    pub initial_diag: Vec<f64>,
    pub process_diag: Vec<f64>,
}

impl ConstantCovariance {
    pub fn from_diagonals(initial_diag: Vec<f64>, process_diag: Vec<f64>) -> Self {
        Self {
            initial_diag,
            process_diag,
        }
    }

    fn diag_to_matrix(diag: &[f64], dim: usize) -> DMatrix<f64> {
        let mut mat = DMatrix::zeros(dim, dim);
        for (i, val) in diag.iter().take(dim).enumerate() {
            mat[(i, i)] = *val;
        }
        mat
    }
}

impl CovarianceProvider for ConstantCovariance {
    fn initial_covariance(&self, dim: usize) -> DMatrix<f64> {
        Self::diag_to_matrix(&self.initial_diag, dim)
    }

    fn process_noise(&self, _prev: Epoch, _next: Epoch, dim: usize) -> DMatrix<f64> {
        Self::diag_to_matrix(&self.process_diag, dim)
    }
}

/// State noise compensation: unmodeled accelerations with the provided
/// diagonal variances (in km^2/s^4), integrated over the time between two
/// estimation epochs through the constant acceleration approximation.
///
/// The compensation is disabled when the time between the two epochs exceeds
/// `disable_time`, and before `start_time` when one is set.
#[derive(Clone, Debug)]
pub struct ProcessNoise {
    /// Time at which this noise starts to become applicable
    pub start_time: Option<Epoch>,
    /// Apply the compensation only when the time between estimation epochs is below this
    pub disable_time: Duration,
    diag: [f64; 3],
    /// Diagonal exponential decay constants in seconds, relative to `start_time`
    decay_diag: Option<[f64; 3]>,
}

impl ProcessNoise {
    /// Initialize a state noise compensation from the acceleration variance diagonal.
    pub fn from_diagonal(disable_time: Duration, values: [f64; 3]) -> Self {
        Self {
            diag: values,
            disable_time,
            start_time: None,
            decay_diag: None,
        }
    }

    /// Initialize a state noise compensation with a start time.
    pub fn with_start_time(disable_time: Duration, values: [f64; 3], start_time: Epoch) -> Self {
        let mut me = Self::from_diagonal(disable_time, values);
        me.start_time = Some(start_time);
        me
    }

    /// Initialize an exponentially decaying compensation. Decay constants are
    /// in seconds since the start time, which must be set for the decay to apply.
    pub fn with_decay(
        disable_time: Duration,
        initial: [f64; 3],
        decay_constants_s: [f64; 3],
        start_time: Epoch,
    ) -> Self {
        let mut me = Self::with_start_time(disable_time, initial, start_time);
        me.decay_diag = Some(decay_constants_s);
        me
    }

    /// Returns the acceleration noise matrix for the provided epochs, or None if
    /// the compensation is disabled at that time.
    pub fn to_matrix(&self, prev: Epoch, next: Epoch) -> Option<Matrix3<f64>> {
        if let Some(start_time) = self.start_time {
            if start_time > next {
                debug!("@{next} SNC starts at {start_time}");
                return None;
            }
        }
        if next - prev > self.disable_time {
            debug!(
                "@{next} SNC disabled: prior estimation epoch more than {} away",
                self.disable_time
            );
            return None;
        }

        let mut snc = Matrix3::zeros();
        for i in 0..3 {
            snc[(i, i)] = self.diag[i];
        }

        if let (Some(decay), Some(start_time)) = (&self.decay_diag, self.start_time) {
            let total_delta_t = (next - start_time).to_seconds();
            for i in 0..3 {
                snc[(i, i)] *= (-decay[i] * total_delta_t).exp();
            }
        }

        Some(snc)
    }
}

impl fmt::Display for ProcessNoise {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "SNC: diag({:.1e}, {:.1e}, {:.1e})",
            self.diag[0], self.diag[1], self.diag[2]
        )?;
        if let Some(start) = self.start_time {
            write!(f, " starting at {start}")?;
        }
        Ok(())
    }
}

/// Adapts a [ProcessNoise] into a [CovarianceProvider]: the acceleration
/// noise is mapped onto the position and velocity blocks through the Gamma
/// matrix, assuming the acceleration is constant between estimation epochs.
#[derive(Clone, Debug)]
pub struct SncCovariance {
    pub initial_diag: Vec<f64>,
    pub snc: ProcessNoise,
}

impl SncCovariance {
    pub fn new(initial_diag: Vec<f64>, snc: ProcessNoise) -> Self {
        Self { initial_diag, snc }
    }
}

impl CovarianceProvider for SncCovariance {
    fn initial_covariance(&self, dim: usize) -> DMatrix<f64> {
        let mut mat = DMatrix::zeros(dim, dim);
        for (i, val) in self.initial_diag.iter().take(dim).enumerate() {
            mat[(i, i)] = *val;
        }
        mat
    }

    fn process_noise(&self, prev: Epoch, next: Epoch, dim: usize) -> DMatrix<f64> {
        let mut q = DMatrix::zeros(dim, dim);
        if dim < 6 {
            return q;
        }
        if let Some(snc) = self.snc.to_matrix(prev, next) {
            let delta_t = (next - prev).to_seconds();
            // Gamma maps accelerations onto position (dt^2/2) and velocity (dt)
            let mut gamma = DMatrix::zeros(dim, 3);
            for i in 0..3 {
                gamma[(i, i)] = delta_t.powi(2) / 2.0;
                gamma[(i + 3, i)] = delta_t;
            }
            let mut snc_dyn = DMatrix::zeros(3, 3);
            for i in 0..3 {
                snc_dyn[(i, i)] = snc[(i, i)];
            }
            q += &gamma * snc_dyn * gamma.transpose();
        }
        q
    }
}

#[cfg(test)]
mod ut_noise {
    use super::*;
    use crate::time::Unit;

    #[test]
    fn snc_disable_time_gating() {
        let start = Epoch::from_gregorian_tai_at_midnight(2021, 1, 1);
        let snc = ProcessNoise::from_diagonal(2 * Unit::Minute, [1e-12, 1e-12, 1e-12]);
        assert!(snc.to_matrix(start, start + 1 * Unit::Minute).is_some());
        assert!(snc.to_matrix(start, start + 3 * Unit::Minute).is_none());
    }

    #[test]
    fn snc_start_time_gating() {
        let start = Epoch::from_gregorian_tai_at_midnight(2021, 1, 1);
        let snc = ProcessNoise::with_start_time(
            2 * Unit::Minute,
            [1e-12, 1e-12, 1e-12],
            start + 1 * Unit::Hour,
        );
        assert!(snc.to_matrix(start, start + 1 * Unit::Minute).is_none());
    }

    #[test]
    fn gamma_mapping_shape() {
        let start = Epoch::from_gregorian_tai_at_midnight(2021, 1, 1);
        let provider = SncCovariance::new(
            vec![1.0; 6],
            ProcessNoise::from_diagonal(10 * Unit::Minute, [1e-12, 1e-12, 1e-12]),
        );
        let q = provider.process_noise(start, start + 10 * Unit::Second, 8);
        // dt = 10 s: position block dt^4/4 * 1e-12, velocity block dt^2 * 1e-12
        approx::assert_abs_diff_eq!(q[(0, 0)], 2.5e-9, epsilon = 1e-20);
        approx::assert_abs_diff_eq!(q[(3, 3)], 1e-10, epsilon = 1e-20);
        // Off block correlation dt^3/2
        approx::assert_abs_diff_eq!(q[(0, 3)], 5e-10, epsilon = 1e-20);
        // The non dynamical block stays untouched
        approx::assert_abs_diff_eq!(q[(6, 6)], 0.0);
    }
}
