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

use crate::attitude::AttitudeError;
use crate::dynamics::DynamicsError;
use crate::io::InputOutputError;
use crate::od::ODError;
use crate::propagators::PropagationError;
use crate::time::Epoch;
use snafu::prelude::Snafu;

/// Top level error enum, each module also defines its own errors which are wrapped here.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AsteriaError {
    #[snafu(display("error during propagation: {source}"))]
    Propagation { source: PropagationError },
    #[snafu(display("error in dynamical models: {source}"))]
    Dynamics { source: DynamicsError },
    #[snafu(display("error in attitude modeling: {source}"))]
    Attitude { source: AttitudeError },
    #[snafu(display("error during orbit determination: {source}"))]
    OrbitDetermination { source: ODError },
    #[snafu(display("input/output error: {source}"))]
    InputOutput { source: InputOutputError },
}

/// Errors when evaluating an event on a given state.
#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EventError {
    #[snafu(display("event {event} not found between {start} and {end}"))]
    NotFound {
        start: Epoch,
        end: Epoch,
        event: String,
    },
    #[snafu(display(
        "root finding for event {event} did not converge within {iterations} iterations"
    ))]
    NotConverged { event: String, iterations: usize },
    #[snafu(display("event evaluation failed on state at {epoch}: {details}"))]
    EventEval { epoch: Epoch, details: String },
}
