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

use crate::dynamics::DynamicsError;
use crate::linalg::allocator::Allocator;
use crate::linalg::{DefaultAllocator, DimName, OMatrix, OVector};
use crate::time::{Duration, Epoch};
use serde_derive::{Deserialize, Serialize};
use snafu::Snafu;
use std::fmt;

mod orbit;
pub use self::orbit::*;

mod spacecraft;
pub use self::spacecraft::*;

/// Speed of light in meters per second
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
/// Speed of light in kilometers per second
pub const SPEED_OF_LIGHT_KMS: f64 = SPEED_OF_LIGHT / 1000.0;

/// Astronomical unit, in kilometers, according to the IAU.
pub const AU: f64 = 149_597_870.700;

/// From NIST special publication 330, 2008 edition, in meters per second squared
pub const STD_GRAVITY: f64 = 9.80665;

/// An inertial reference frame with its gravitational parameter.
///
/// Frame transformations are explicitly out of scope: all states handed to a
/// given propagation or estimation setup must already be expressed in the same
/// frame, and mixing frames is reported as an error where it can be detected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    /// Earth-centered inertial, J2000
    EME2000,
    /// Moon-centered inertial, J2000
    MoonJ2000,
    /// Sun-centered inertial, J2000
    SunJ2000,
}

impl Frame {
    /// Gravitational parameter of the frame center, in km^3/s^2
    pub fn gm(&self) -> f64 {
        match self {
            Frame::EME2000 => 398_600.4418,
            Frame::MoonJ2000 => 4_902.800_066,
            Frame::SunJ2000 => 132_712_440_041.939_4,
        }
    }

    /// Mean equatorial radius of the frame center, in km
    pub fn equatorial_radius_km(&self) -> f64 {
        match self {
            Frame::EME2000 => 6_378.136_3,
            Frame::MoonJ2000 => 1_737.4,
            Frame::SunJ2000 => 696_342.0,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A trait allowing for something to have an epoch
pub trait TimeTagged {
    /// Retrieve the Epoch
    fn epoch(&self) -> Epoch;
    /// Set the Epoch
    fn set_epoch(&mut self, epoch: Epoch);

    /// Shift this epoch by a duration (can be negative)
    fn shift_by(&mut self, duration: Duration) {
        self.set_epoch(self.epoch() + duration);
    }
}

/// A trait for propagation and estimation states.
///
/// `Size` is the dimension of the state itself, `VecLength` the dimension of
/// the integrated vector, i.e. the state and its state transition matrix.
pub trait State: Copy + Default + PartialEq + fmt::Display + Send + Sync
where
    Self: Sized,
    DefaultAllocator:
        Allocator<Self::Size> + Allocator<Self::Size, Self::Size> + Allocator<Self::VecLength>,
{
    /// Size of the state
    type Size: DimName;
    /// Size of the state and its STM
    type VecLength: DimName;

    /// Return this state as a vector for the propagation/estimation
    fn to_vector(&self) -> OVector<f64, Self::VecLength>;

    /// Set this state from the provided epoch and vector
    fn set(&mut self, epoch: Epoch, vector: &OVector<f64, Self::VecLength>);

    /// Retrieve the Epoch
    fn epoch(&self) -> Epoch;
    /// Set the Epoch
    fn set_epoch(&mut self, epoch: Epoch);

    /// Returns the state transition matrix, if set.
    /// This function must be implemented when filtering on this state.
    fn stm(&self) -> Result<OMatrix<f64, Self::Size, Self::Size>, DynamicsError> {
        Err(DynamicsError::StateTransitionMatrixUnset)
    }

    /// Resets the STM to identity, must be implemented when filtering on this state.
    fn reset_stm(&mut self) {
        unimplemented!()
    }

    /// Adds the provided deviation to this state, must be implemented when filtering on this state.
    fn add(self, _other: OVector<f64, Self::Size>) -> Self {
        unimplemented!()
    }
}

/// Errors in the foundational astrodynamics computations.
#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AstroError {
    #[snafu(display("analytical propagation requires an elliptical orbit, got ecc = {ecc}"))]
    NotElliptical { ecc: f64 },
    #[snafu(display("hyperbolic or parabolic orbit has no {param}"))]
    ParamUndefined { param: &'static str },
    #[snafu(display("Kepler solver did not converge after {iterations} iterations"))]
    KeplerNotConverged { iterations: usize },
    #[snafu(display("expected a state in frame {expected} but got {got}"))]
    FrameMismatch { expected: Frame, got: Frame },
}
