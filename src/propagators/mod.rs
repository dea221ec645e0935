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

use snafu::prelude::*;
use std::fmt;

/// Provides different methods for controlling the error computation of the integrator.
pub mod error_ctrl;
pub use self::error_ctrl::*;

/// Event detection: the detector trait, its actions, and common detectors.
pub mod events;
pub use self::events::*;

mod rk_methods;
pub use rk_methods::*;
mod propagator;
pub use propagator::*;
mod instance;
pub use instance::*;

/// Bounded, interpolated ephemerides and their aggregation.
pub mod ephemeris;
pub use ephemeris::*;

use crate::cosmic::AstroError;
use crate::dynamics::DynamicsError;
use crate::errors::EventError;
use crate::time::Duration;

/// Stores the details of the previous integration step of a given propagator.
#[derive(Copy, Clone, Debug)]
pub struct IntegrationDetails {
    /// step size used
    pub step: Duration,
    /// error in the previous integration step
    pub error: f64,
    /// number of attempts needed by an adaptive step size to be within the tolerance
    pub attempts: u8,
}

impl fmt::Display for IntegrationDetails {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "IntegrationDetails {{step: {}, error: {:.3e}, attempts: {}}}",
            self.step, self.error, self.attempts
        )
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PropagationError {
    #[snafu(display("encountered a dynamics error {source}"))]
    PropDynamics { source: DynamicsError },
    #[snafu(display("while detecting an event: {source}"))]
    PropEvent { source: EventError },
    #[snafu(display("analytical shift failed during propagation: {source}"))]
    PropAstro { source: AstroError },
    #[snafu(display("ephemeris does not cover {req}, bounds are [{start}; {end}]"))]
    OutOfEphemBounds {
        req: crate::time::Epoch,
        start: crate::time::Epoch,
        end: crate::time::Epoch,
    },
    #[snafu(display("ephemeris requires at least {need} states, got {got}"))]
    TooFewStates { need: usize, got: usize },
}
