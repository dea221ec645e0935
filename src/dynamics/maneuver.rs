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

use crate::cosmic::{Spacecraft, STD_GRAVITY};
use crate::errors::EventError;
use crate::linalg::Vector3;
use crate::propagators::{Action, EventDetector};
use crate::time::{Duration, Epoch};
use crate::State;
use std::fmt;
use std::sync::Arc;

/// An impulsive maneuver guarded by an event.
///
/// When the trigger event occurs, the velocity increment is applied
/// instantaneously through the propagator's state reset mechanism, and the
/// mass is reduced per the rocket equation using the provided specific
/// impulse.
pub struct ImpulseManeuver {
    pub trigger: Arc<dyn EventDetector<Spacecraft>>,
    /// Velocity increment in the inertial frame, km/s
    pub dv_km_s: Vector3<f64>,
    /// Specific impulse, in seconds
    pub isp_s: f64,
}

impl ImpulseManeuver {
    pub fn new(
        trigger: Arc<dyn EventDetector<Spacecraft>>,
        dv_km_s: Vector3<f64>,
        isp_s: f64,
    ) -> Self {
        Self {
            trigger,
            dv_km_s,
            isp_s,
        }
    }
}

impl EventDetector<Spacecraft> for ImpulseManeuver {
    fn g(&self, state: &Spacecraft) -> Result<f64, EventError> {
        self.trigger.g(state)
    }

    fn event_threshold(&self) -> Duration {
        self.trigger.event_threshold()
    }

    fn max_check(&self) -> Duration {
        self.trigger.max_check()
    }

    fn max_iter(&self) -> usize {
        self.trigger.max_iter()
    }

    fn init(&self, s0: &Spacecraft, target: Epoch) -> Result<(), EventError> {
        self.trigger.init(s0, target)
    }

    fn event_occurred(&self, _state: &Spacecraft, _increasing: bool) -> Result<Action, EventError> {
        Ok(Action::ResetState)
    }

    fn reset_state(&self, state: &Spacecraft) -> Result<Spacecraft, EventError> {
        let mut maneuvered = state.with_dv_km_s(self.dv_km_s);
        // Tsiolkovsky mass ratio, dv in m/s
        let dv_m_s = self.dv_km_s.norm() * 1e3;
        maneuvered.mass_kg *= (-dv_m_s / (self.isp_s * STD_GRAVITY)).exp();
        info!(
            "impulsive maneuver of {:.3} m/s applied @ {}, mass {:.3} -> {:.3} kg",
            dv_m_s,
            state.epoch(),
            state.mass_kg,
            maneuvered.mass_kg
        );
        Ok(maneuvered)
    }
}

impl fmt::Display for ImpulseManeuver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "impulsive maneuver |dv| = {:.3} m/s on [{}]",
            self.dv_km_s.norm() * 1e3,
            self.trigger
        )
    }
}
