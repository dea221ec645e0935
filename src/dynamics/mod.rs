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

use crate::cosmic::{AstroError, Spacecraft};
use crate::linalg::allocator::Allocator;
use crate::linalg::{DefaultAllocator, Matrix3, OMatrix, OVector, Vector3};
use crate::State;
use snafu::Snafu;
use std::fmt;

/// Two-body orbital dynamics with automatic differentiation of the gravity gradient.
pub mod orbital;
pub use self::orbital::*;

/// Spacecraft dynamics: orbital dynamics plus force models, with 9x9 STM computation.
pub mod spacecraft;
pub use self::spacecraft::*;

/// Cannonball solar radiation pressure with a cylindrical shadow model.
pub mod solarpressure;
pub use self::solarpressure::*;

/// Exponential atmosphere drag model.
pub mod drag;
pub use self::drag::*;

/// Event-guarded impulsive maneuvers.
pub mod maneuver;
pub use self::maneuver::*;

/// A trait for models with equations of motion that can be integrated.
pub trait Dynamics: Clone + Send + Sync
where
    DefaultAllocator: Allocator<<Self::StateType as State>::Size>
        + Allocator<<Self::StateType as State>::VecLength>
        + Allocator<<Self::StateType as State>::Size, <Self::StateType as State>::Size>,
{
    type StateType: State;

    /// Defines the equations of motion.
    ///
    /// - `delta_t`: time in seconds past the context epoch
    /// - `state_vec`: the integrated vector, which changes at each integration step
    /// - `state_ctx`: the state context, used to rebuild the state from the state vector
    fn eom(
        &self,
        delta_t: f64,
        state_vec: &OVector<f64, <Self::StateType as State>::VecLength>,
        state_ctx: &Self::StateType,
    ) -> Result<OVector<f64, <Self::StateType as State>::VecLength>, DynamicsError>;

    /// Defines the equations of motion and their gradient with respect to the state,
    /// used for state transition matrix propagation.
    fn dual_eom(
        &self,
        _delta_t: f64,
        _osculating: &Self::StateType,
    ) -> Result<
        (
            OVector<f64, <Self::StateType as State>::Size>,
            OMatrix<f64, <Self::StateType as State>::Size, <Self::StateType as State>::Size>,
        ),
        DynamicsError,
    > {
        Err(DynamicsError::StateTransitionMatrixUnset)
    }

    /// Performs final changes after each successful integration step.
    ///
    /// Also called before the first integration step to update the initial state if needed.
    fn finally(&self, next_state: Self::StateType) -> Result<Self::StateType, DynamicsError> {
        Ok(next_state)
    }
}

/// A trait for immutable dynamics that return a force, e.g. solar radiation pressure or drag.
///
/// Forces are expressed in kilonewtons so that dividing by the spacecraft mass in
/// kilograms yields an acceleration in km/s^2.
pub trait ForceModel: Send + Sync + fmt::Display {
    /// Returns the index, in the spacecraft state vector, of the coefficient
    /// of this force model if that coefficient can be estimated.
    fn estimation_index(&self) -> Option<usize>;

    /// Defines the force of this model on the provided spacecraft, in kN.
    fn eom(&self, ctx: &Spacecraft) -> Result<Vector3<f64>, DynamicsError>;

    /// Defines the force and its partial derivatives: with respect to the position
    /// (km) and with respect to the estimable coefficient of this model.
    fn dual_eom(
        &self,
        ctx: &Spacecraft,
    ) -> Result<(Vector3<f64>, Matrix3<f64>, Vector3<f64>), DynamicsError>;
}

/// Dynamical model errors.
#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DynamicsError {
    /// State Transition Matrix (STM) was expected but not set.
    #[snafu(display("expected STM to be set"))]
    StateTransitionMatrixUnset,
    /// Astrodynamics error.
    #[snafu(display("dynamical model encountered an astro error: {source}"))]
    DynamicsAstro { source: AstroError },
    /// The spacecraft mass became non-physical.
    #[snafu(display("spacecraft mass is not positive: {mass_kg} kg"))]
    NonPositiveMass { mass_kg: f64 },
}
