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

use crate::cosmic::Spacecraft;
use crate::dynamics::solarpressure::sun_direction;
use crate::errors::EventError;
use crate::linalg::allocator::Allocator;
use crate::linalg::DefaultAllocator;
use crate::time::{Duration, Epoch, Unit};
use crate::State;
use std::fmt;

/// What the propagator must do once an event has occurred.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Keep propagating from the event state
    Continue,
    /// Stop the propagation at the event state
    Stop,
    /// Replace the propagated state with the one returned by `reset_state` and keep going
    ResetState,
}

/// An event detector exposes a continuous switching function of the state
/// whose sign changes are localized by the propagator.
///
/// The propagator calls `init` once at the start of each propagation, polls
/// `g` across every accepted integration step (subdividing by `max_check`),
/// localizes a sign change to within `event_threshold` using at most
/// `max_iter` root finder iterations, and then invokes `event_occurred`.
pub trait EventDetector<S: State>: fmt::Display + Send + Sync
where
    DefaultAllocator:
        Allocator<S::Size> + Allocator<S::Size, S::Size> + Allocator<S::VecLength>,
{
    /// The continuous switching function.
    fn g(&self, state: &S) -> Result<f64, EventError>;

    /// Convergence threshold of the root finder, as a duration.
    fn event_threshold(&self) -> Duration {
        1 * Unit::Millisecond
    }

    /// Maximum interval between two checks of the switching function sign.
    fn max_check(&self) -> Duration {
        60 * Unit::Second
    }

    /// Maximum number of root finder iterations.
    fn max_iter(&self) -> usize {
        50
    }

    /// Called once at the beginning of each propagation towards `target`.
    fn init(&self, _s0: &S, _target: Epoch) -> Result<(), EventError> {
        Ok(())
    }

    /// Called when the event has been localized. `increasing` is true when the
    /// switching function goes from negative to positive at this crossing.
    fn event_occurred(&self, _state: &S, _increasing: bool) -> Result<Action, EventError> {
        Ok(Action::Continue)
    }

    /// Called when `event_occurred` returned [Action::ResetState]: returns the
    /// state from which the propagation resumes.
    fn reset_state(&self, state: &S) -> Result<S, EventError> {
        Ok(*state)
    }
}

/// An event occurring at a fixed date: g is the elapsed time in seconds since that date.
#[derive(Clone, Debug)]
pub struct DateEvent {
    pub epoch: Epoch,
    /// Action returned when the date is reached
    pub action: Action,
    pub threshold: Duration,
}

impl DateEvent {
    pub fn new(epoch: Epoch) -> Self {
        Self {
            epoch,
            action: Action::Continue,
            threshold: 1 * Unit::Millisecond,
        }
    }

    /// A date event which stops the propagation.
    pub fn stop_at(epoch: Epoch) -> Self {
        Self {
            epoch,
            action: Action::Stop,
            threshold: 1 * Unit::Millisecond,
        }
    }
}

impl<S: State> EventDetector<S> for DateEvent
where
    DefaultAllocator:
        Allocator<S::Size> + Allocator<S::Size, S::Size> + Allocator<S::VecLength>,
{
    fn g(&self, state: &S) -> Result<f64, EventError> {
        Ok((state.epoch() - self.epoch).to_seconds())
    }

    fn event_threshold(&self) -> Duration {
        self.threshold
    }

    fn event_occurred(&self, _state: &S, _increasing: bool) -> Result<Action, EventError> {
        Ok(self.action)
    }
}

impl fmt::Display for DateEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "date event @ {}", self.epoch)
    }
}

/// Crossing of a given radius magnitude, in kilometers.
#[derive(Clone, Debug)]
pub struct RadiusCrossing {
    pub radius_km: f64,
    pub action: Action,
}

impl RadiusCrossing {
    pub fn new(radius_km: f64) -> Self {
        Self {
            radius_km,
            action: Action::Continue,
        }
    }
}

impl EventDetector<Spacecraft> for RadiusCrossing {
    fn g(&self, state: &Spacecraft) -> Result<f64, EventError> {
        Ok(state.orbit.rmag_km() - self.radius_km)
    }

    fn event_occurred(&self, _state: &Spacecraft, _increasing: bool) -> Result<Action, EventError> {
        Ok(self.action)
    }
}

impl fmt::Display for RadiusCrossing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "radius crossing @ {} km", self.radius_km)
    }
}

/// Apsis passage: g is the radial velocity, negative towards periapsis,
/// increasing through zero at periapsis and decreasing through zero at apoapsis.
#[derive(Clone, Debug, Default)]
pub struct ApsisEvent;

impl EventDetector<Spacecraft> for ApsisEvent {
    fn g(&self, state: &Spacecraft) -> Result<f64, EventError> {
        Ok(state.radius().dot(&state.velocity()))
    }
}

impl fmt::Display for ApsisEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "apsis passage")
    }
}

/// Umbra entry/exit with a cylindrical shadow: g is positive in sunlight and
/// negative inside the shadow cylinder, so eclipse entry is a decreasing event.
#[derive(Clone, Debug, Default)]
pub struct EclipseEvent;

impl EventDetector<Spacecraft> for EclipseEvent {
    fn g(&self, state: &Spacecraft) -> Result<f64, EventError> {
        let sun = sun_direction(state.epoch());
        let r = state.radius();
        let along_sun = r.dot(&sun);
        let transverse = (r - along_sun * sun).norm();
        let margin = transverse - state.orbit.frame.equatorial_radius_km();
        // Continuous by construction: both terms are negative only inside the cylinder
        Ok(along_sun.max(margin))
    }
}

impl fmt::Display for EclipseEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "umbra crossing")
    }
}
