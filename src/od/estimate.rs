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

use crate::linalg::{DMatrix, DVector};
use crate::time::Epoch;
use std::fmt;

/// A Kalman filter estimate, in normalized units, as the result of a time
/// update or of a measurement update.
#[derive(Clone, Debug, PartialEq)]
pub struct KalmanEstimate {
    pub epoch: Epoch,
    /// Normalized state deviation from the reference trajectory
    pub state_deviation: DVector<f64>,
    /// Normalized covariance
    pub covar: DMatrix<f64>,
    /// Normalized predicted covariance (before the measurement update)
    pub covar_bar: DMatrix<f64>,
    /// Normalized error state transition matrix used for this estimate
    pub stm: DMatrix<f64>,
    /// Whether this estimate is a prediction (time update) or came from a measurement update
    pub predicted: bool,
}

impl KalmanEstimate {
    /// An initial estimate: zero deviation with the provided normalized covariance.
    pub fn from_covar(epoch: Epoch, covar: DMatrix<f64>) -> Self {
        let dim = covar.nrows();
        Self {
            epoch,
            state_deviation: DVector::zeros(dim),
            covar: covar.clone(),
            covar_bar: covar,
            stm: DMatrix::identity(dim, dim),
            predicted: true,
        }
    }

    pub fn dimension(&self) -> usize {
        self.state_deviation.len()
    }

    /// Whether the state deviation is within `sigma` standard deviations of
    /// the covariance, per the 68-95-99.7 rule.
    pub fn within_sigma(&self, sigma: f64) -> bool {
        for i in 0..self.state_deviation.len() {
            let bound = self.covar[(i, i)].sqrt() * sigma;
            if self.state_deviation[i].abs() > bound {
                return false;
            }
        }
        true
    }

    pub fn within_3sigma(&self) -> bool {
        self.within_sigma(3.0)
    }
}

impl fmt::Display for KalmanEstimate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let word = if self.predicted {
            "Prediction"
        } else {
            "Estimate"
        };
        let mut fmt_cov = Vec::with_capacity(self.dimension());
        for i in 0..self.dimension() {
            fmt_cov.push(format!("{:.1e}", self.covar[(i, i)]));
        }
        write!(
            f,
            "=== {} @ {} -- within 3 sigma: {} ===\nsigmas [{}]",
            word,
            self.epoch,
            self.within_3sigma(),
            fmt_cov.join(",")
        )
    }
}

/// Measurement residuals, in physical units.
#[derive(Clone, Debug, PartialEq)]
pub struct Residual {
    pub epoch: Epoch,
    /// Observed minus computed, before the correction
    pub prefit: DVector<f64>,
    /// Observed minus corrected, after the correction (zero when rejected)
    pub postfit: DVector<f64>,
    /// Prefit ratio used by the automatic rejection, in units of sigma
    pub ratio: f64,
    pub rejected: bool,
}

impl Residual {
    pub fn accepted(epoch: Epoch, prefit: DVector<f64>, postfit: DVector<f64>, ratio: f64) -> Self {
        Self {
            epoch,
            prefit,
            postfit,
            ratio,
            rejected: false,
        }
    }

    pub fn rejected(epoch: Epoch, prefit: DVector<f64>, ratio: f64) -> Self {
        let dim = prefit.len();
        Self {
            epoch,
            prefit,
            postfit: DVector::zeros(dim),
            ratio,
            rejected: true,
        }
    }
}

impl fmt::Display for Residual {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.rejected {
            write!(
                f,
                "rejected residual @ {} (ratio {:.2})",
                self.epoch, self.ratio
            )
        } else {
            write!(
                f,
                "residual @ {}: prefit rss {:.3e}, postfit rss {:.3e}",
                self.epoch,
                self.prefit.norm(),
                self.postfit.norm()
            )
        }
    }
}
