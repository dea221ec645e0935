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

use crate::cosmic::AstroError;
use crate::dynamics::DynamicsError;
use crate::linalg::DVector;
use crate::propagators::PropagationError;
use crate::time::Epoch;
pub use crate::TimeTagged;
use snafu::prelude::Snafu;

/// Parameter drivers: named, scaled, selectable estimation parameters.
pub mod params;
pub use params::{ParameterDriver, ParameterList};

/// Measurement models and ground stations.
pub mod msr;
pub use msr::{Measurement, MeasurementKind};

/// Provides a range and range rate measuring ground station model.
mod ground_station;
pub use ground_station::GroundStation;

/// Provides process noise modeling.
pub mod noise;

/// Provides Estimate handling functionality.
pub mod estimate;
pub use estimate::{KalmanEstimate, Residual};

/// The Kalman filter computations.
pub mod filter;
pub use filter::{KalmanFilter, ResidRejectCrit};

/// Propagator builder and Jacobian harvesting for the estimation process.
pub mod builder;
pub use builder::{MatricesHarvester, SpacecraftPropagatorBuilder};

/// The sequential orbit determination process.
pub mod process;
pub use process::{KalmanObserver, SequentialKalman};

#[allow(unused_imports)]
pub mod prelude {
    pub use super::builder::*;
    pub use super::estimate::*;
    pub use super::filter::*;
    pub use super::ground_station::*;
    pub use super::msr::*;
    pub use super::noise::*;
    pub use super::params::*;
    pub use super::process::*;
    pub use super::*;

    pub use crate::time::{Duration, Epoch, TimeUnits, Unit};
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ODError {
    #[snafu(display("during an orbit determination, encountered {source}"))]
    ODPropError { source: PropagationError },
    #[snafu(display("during an orbit determination, encountered {source}"))]
    ODDynamicsError { source: DynamicsError },
    #[snafu(display("during an orbit determination, encountered {source}"))]
    ODAstroError { source: AstroError },
    #[snafu(display("at least {need} measurements required for {action}"))]
    TooFewMeasurements { need: usize, action: &'static str },
    #[snafu(display(
        "measurement @ {epoch} is out of order: the filter has already processed {prev}"
    ))]
    OutOfOrderMeasurement { epoch: Epoch, prev: Epoch },
    #[snafu(display("sensitivity matrix must be updated before this call"))]
    SensitivityNotUpdated,
    #[snafu(display("innovation covariance is singular @ {epoch}, Kalman gain cannot be computed"))]
    SingularKalmanGain { epoch: Epoch },
    #[snafu(display("measurement noise matrix is singular"))]
    SingularNoiseRk,
    #[snafu(display("measurement references device {name} which is not configured"))]
    UnknownDevice { name: String },
    #[snafu(display("parameter {name} has an invalid normalization scale {scale}"))]
    InvalidScale { name: String, scale: f64 },
    #[snafu(display("parameter {name} is already defined"))]
    DuplicateParameter { name: String },
    #[snafu(display("parameter {name} is not defined"))]
    UnknownParameter { name: String },
    #[snafu(display("no parameter is selected for estimation"))]
    NothingToEstimate,
    #[snafu(display("measurement dimension {got} does not match {expect} for {kind}"))]
    MeasurementDimension {
        got: usize,
        expect: usize,
        kind: &'static str,
    },
}

/// Root sum squared of a residual vector, convenience for tests and reporting.
pub fn rss(vector: &DVector<f64>) -> f64 {
    vector.norm()
}
