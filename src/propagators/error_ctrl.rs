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

use crate::linalg::allocator::Allocator;
use crate::linalg::{DefaultAllocator, DimName, OVector};

// This determines when to take into consideration the magnitude of the state_delta and
// prevents dividing by too small of a number.
const REL_ERR_THRESH: f64 = 0.1;

/// The error control trait manages how the adaptive step integrator computes
/// the local error estimate from the b and b-star quadratures.
pub trait ErrorCtrl: Copy + Send + Sync {
    /// Computes the actual error of the current step.
    ///
    /// The `error_est` is the estimated error computed from the difference in
    /// the two error branches of the embedded Runge Kutta tableau.
    fn estimate<N: DimName>(
        error_est: &OVector<f64, N>,
        candidate: &OVector<f64, N>,
        cur_state: &OVector<f64, N>,
    ) -> f64
    where
        DefaultAllocator: Allocator<N>;
}

/// An RSS state error control for Cartesian states: the position and velocity
/// blocks are controlled independently and the largest relative error wins.
///
/// Use this as the default error control for orbit and spacecraft states.
#[derive(Clone, Copy, Debug)]
pub struct RSSCartesianStep;

impl ErrorCtrl for RSSCartesianStep {
    fn estimate<N: DimName>(
        error_est: &OVector<f64, N>,
        candidate: &OVector<f64, N>,
        cur_state: &OVector<f64, N>,
    ) -> f64
    where
        DefaultAllocator: Allocator<N>,
    {
        if N::dim() >= 6 {
            let err_radius = rss_block(error_est, candidate, cur_state, 0);
            let err_velocity = rss_block(error_est, candidate, cur_state, 3);
            err_radius.max(err_velocity)
        } else {
            LargestError::estimate(error_est, candidate, cur_state)
        }
    }
}

/// A largest error control which computes the largest relative error over each component.
#[derive(Clone, Copy, Debug)]
pub struct LargestError;

impl ErrorCtrl for LargestError {
    fn estimate<N: DimName>(
        error_est: &OVector<f64, N>,
        candidate: &OVector<f64, N>,
        cur_state: &OVector<f64, N>,
    ) -> f64
    where
        DefaultAllocator: Allocator<N>,
    {
        let mut max_err = 0.0_f64;
        for (i, prop_err_i) in error_est.iter().enumerate() {
            let delta = candidate[i] - cur_state[i];
            let err = if delta.abs() > REL_ERR_THRESH {
                (prop_err_i / delta).abs()
            } else {
                prop_err_i.abs()
            };
            max_err = max_err.max(err);
        }
        max_err
    }
}

/// RSS of a three component block starting at `offset`.
fn rss_block<N: DimName>(
    error_est: &OVector<f64, N>,
    candidate: &OVector<f64, N>,
    cur_state: &OVector<f64, N>,
    offset: usize,
) -> f64
where
    DefaultAllocator: Allocator<N>,
{
    let mut mag = 0.0;
    let mut err = 0.0;
    for i in offset..offset + 3 {
        mag += (candidate[i] - cur_state[i]).powi(2);
        err += error_est[i].powi(2);
    }
    let mag = mag.sqrt();
    let err = err.sqrt();
    if mag > REL_ERR_THRESH {
        err / mag
    } else {
        err
    }
}
