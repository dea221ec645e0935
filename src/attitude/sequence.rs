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

use super::{
    AngularDerivativesFilter, Attitude, AttitudeError, AttitudeLaw, PvProvider,
};
use crate::cosmic::Spacecraft;
use crate::dynamics::Dynamics;
use crate::errors::EventError;
use crate::propagators::{Action, ErrorCtrl, EventDetector, PropInstance};
use crate::time::{Duration, Epoch};
use crate::utils::TimeSpanMap;
use crate::{Frame, State};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared handle on an attitude law.
pub type LawArc = Arc<dyn AttitudeLaw>;

/// Notified when an attitude switch actually occurs.
///
/// `preceding` is the law active before the switch in the direction of
/// propagation, `following` the law activated by it, and `state` the
/// spacecraft state at the transition start.
pub trait SwitchHandler: Send + Sync {
    fn switch_occurred(&self, preceding: &LawArc, following: &LawArc, state: &Spacecraft);
}

/// Manages a sequence of attitude laws activated in turn by switching events.
///
/// Only one law is active at any time. When a switch event tied to the active
/// law occurs, the law configured as its successor becomes active after an
/// interpolated transition of configurable duration.
///
/// This provider is stateful: it keeps in memory the sequence of activated
/// laws with their switch dates. It must therefore *not* be shared between
/// simultaneous propagations; each propagation needs its own instance. The
/// history is partially reset at each propagation start: switches previously
/// computed beyond the new start date, in the direction of propagation, are
/// erased and recomputed, while those behind it are kept so that a
/// propagation restarted inside a transition completes that transition.
pub struct AttitudeSequence {
    activated: Option<Arc<RwLock<TimeSpanMap<LawArc>>>>,
    switches: Vec<Arc<Switch>>,
}

impl AttitudeSequence {
    /// Creates an initially empty sequence.
    pub fn new() -> Self {
        Self {
            activated: None,
            switches: Vec::new(),
        }
    }

    /// Resets the active law, clearing all already seen switch history.
    ///
    /// This is intended for use at setup only: calling it during a propagation
    /// discards the transitions the propagator relies on.
    pub fn reset_active_law(&mut self, law: LawArc) {
        match &self.activated {
            Some(map) => {
                *write_map(map) = TimeSpanMap::new(law);
            }
            None => {
                self.activated = Some(Arc::new(RwLock::new(TimeSpanMap::new(law))));
            }
        }
    }

    /// Adds a switching condition between two attitude laws.
    ///
    /// `past` and `future` are defined with regard to the natural flow of
    /// time: a forward propagation switches from `past` to `future` when the
    /// event occurs, a backward propagation from `future` to `past`. The event
    /// marks the start of the transition; the `future` law takes over at event
    /// date plus `transition_time`, and during the transition the attitude is
    /// interpolated, matching the derivatives requested by `transition_filter`
    /// at both boundaries.
    ///
    /// The first switching condition added seeds the sequence with its `past`
    /// law as the initially active one, unless [Self::reset_active_law] was
    /// called before.
    ///
    /// Fails when `transition_time` is shorter than the event convergence
    /// threshold: the root finder cannot locate the event any better than its
    /// threshold, so a shorter transition could start before the event is
    /// actually resolved and break attitude continuity.
    #[allow(clippy::too_many_arguments)]
    pub fn add_switching_condition(
        &mut self,
        past: LawArc,
        future: LawArc,
        event: Arc<dyn EventDetector<Spacecraft>>,
        switch_on_increase: bool,
        switch_on_decrease: bool,
        transition_time: Duration,
        transition_filter: AngularDerivativesFilter,
        handler: Option<Arc<dyn SwitchHandler>>,
    ) -> Result<(), AttitudeError> {
        if transition_time < event.event_threshold() {
            return Err(AttitudeError::TransitionTooShort {
                transition: transition_time,
                threshold: event.event_threshold(),
            });
        }

        // If this is the first switching condition, the past law starts active
        if self.activated.is_none() {
            self.reset_active_law(past.clone());
        }
        let activated = self.activated.as_ref().cloned().ok_or(AttitudeError::NoActiveLaw)?;

        self.switches.push(Arc::new(Switch {
            event,
            switch_on_increase,
            switch_on_decrease,
            past,
            future,
            transition_time,
            transition_filter,
            handler,
            activated,
            forward: RwLock::new(true),
        }));

        Ok(())
    }

    /// Registers all the switching conditions as event detectors on the
    /// provided propagator instance.
    ///
    /// Must be called once, after all the switching conditions have been set
    /// up and before the propagation starts. The switch events must not be
    /// registered on the propagator directly: they are wrapped so that the
    /// attitude bookkeeping happens before the underlying event reaction.
    pub fn register_switch_events<D, E>(&self, prop: &mut PropInstance<'_, D, E>)
    where
        D: Dynamics<StateType = Spacecraft>,
        E: ErrorCtrl,
    {
        for sw in &self.switches {
            prop.add_event_detector(sw.clone() as Arc<dyn EventDetector<Spacecraft>>);
        }
    }

    /// Returns the attitude computed by the law active at the provided epoch.
    /// This is a pure read: the activated law map is only mutated from the
    /// switch event callbacks.
    pub fn attitude(
        &self,
        pv: &dyn PvProvider,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<Attitude, AttitudeError> {
        let map = self.activated.as_ref().ok_or(AttitudeError::NoActiveLaw)?;
        let law = read_map(map).get(epoch).clone();
        law.attitude(pv, epoch, frame)
    }

    /// Returns the number of distinct law activation spans currently recorded.
    pub fn nb_spans(&self) -> usize {
        match &self.activated {
            Some(map) => read_map(map).spans(),
            None => 0,
        }
    }

    /// Returns the recorded switch dates, in increasing order. Each completed
    /// switch contributes two dates: the transition start and the transition end.
    pub fn switch_dates(&self) -> Vec<Epoch> {
        match &self.activated {
            Some(map) => read_map(map).transitions().to_vec(),
            None => Vec::new(),
        }
    }
}

impl Default for AttitudeSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl AttitudeLaw for AttitudeSequence {
    fn attitude(
        &self,
        pv: &dyn PvProvider,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<Attitude, AttitudeError> {
        AttitudeSequence::attitude(self, pv, epoch, frame)
    }
}

impl fmt::Display for AttitudeSequence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "attitude sequence ({} switches)", self.switches.len())
    }
}

fn read_map<'a>(
    map: &'a Arc<RwLock<TimeSpanMap<LawArc>>>,
) -> RwLockReadGuard<'a, TimeSpanMap<LawArc>> {
    map.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_map<'a>(
    map: &'a Arc<RwLock<TimeSpanMap<LawArc>>>,
) -> RwLockWriteGuard<'a, TimeSpanMap<LawArc>> {
    map.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn attitude_failure(epoch: Epoch, err: AttitudeError) -> EventError {
    EventError::EventEval {
        epoch,
        details: format!("{err}"),
    }
}

/// A switching condition: wraps an event detector so that, when the event
/// occurs in the configured direction while the expected law is active, the
/// activated law map gains a transition span followed by the successor law.
pub(crate) struct Switch {
    event: Arc<dyn EventDetector<Spacecraft>>,
    switch_on_increase: bool,
    switch_on_decrease: bool,
    past: LawArc,
    future: LawArc,
    transition_time: Duration,
    transition_filter: AngularDerivativesFilter,
    handler: Option<Arc<dyn SwitchHandler>>,
    activated: Arc<RwLock<TimeSpanMap<LawArc>>>,
    /// Propagation direction, set by `init` at each propagation start
    forward: RwLock<bool>,
}

impl Switch {
    fn is_forward(&self) -> bool {
        *self.forward.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventDetector<Spacecraft> for Switch {
    fn g(&self, state: &Spacecraft) -> Result<f64, EventError> {
        if self.is_forward() {
            self.event.g(state)
        } else {
            // Compensate the transition duration so that the transition start
            // and end dates match between forward and backward propagation
            let shifted = state
                .shifted_by(-self.transition_time)
                .map_err(|e| EventError::EventEval {
                    epoch: state.epoch(),
                    details: format!("{e}"),
                })?;
            self.event.g(&shifted)
        }
    }

    fn event_threshold(&self) -> Duration {
        self.event.event_threshold()
    }

    fn max_check(&self) -> Duration {
        self.event.max_check()
    }

    fn max_iter(&self) -> usize {
        self.event.max_iter()
    }

    fn init(&self, s0: &Spacecraft, target: Epoch) -> Result<(), EventError> {
        // The propagation direction is reset once per switch, despite once
        // per sequence would suffice
        let forward = (target - s0.epoch()).to_seconds() >= 0.0;
        *self
            .forward
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = forward;

        let mut map = write_map(&self.activated);
        if map.spans() > 1 {
            // Remove the transitions that will be overridden during the
            // upcoming propagation, keeping those within one transition time
            // behind the start so that a propagation restarted inside a
            // transition completes it consistently
            *map = if forward {
                map.extract_until(s0.epoch() + self.transition_time)
            } else {
                map.extract_from(s0.epoch() - self.transition_time)
            };
        }
        drop(map);

        self.event.init(s0, target)
    }

    fn event_occurred(&self, state: &Spacecraft, increasing: bool) -> Result<Action, EventError> {
        let forward = self.is_forward();
        let date = state.epoch();

        let expected_law = if forward { &self.past } else { &self.future };
        let active_matches = Arc::ptr_eq(read_map(&self.activated).get(date), expected_law);

        if active_matches
            && (increasing && self.switch_on_increase || !increasing && self.switch_on_decrease)
        {
            let frame = state.orbit.frame;
            if forward {
                // Freeze the attitude at the event date and prepare the transition
                let transition_end = date + self.transition_time;
                let frozen = self
                    .past
                    .attitude(state, date, frame)
                    .map_err(|e| attitude_failure(date, e))?;
                let transition: LawArc = Arc::new(TransitionLaw {
                    preceding: frozen,
                    transition_end,
                    future: self.future.clone(),
                    filter: self.transition_filter,
                });

                {
                    let mut map = write_map(&self.activated);
                    map.add_valid_after(transition, date);
                    // Prepare the future law after the transition
                    map.add_valid_after(self.future.clone(), transition_end);
                }

                if let Some(handler) = &self.handler {
                    handler.switch_occurred(&self.past, &self.future, state);
                }

                self.event.event_occurred(state, increasing)
            } else {
                // Estimate the state at transition start, according to the
                // past attitude law; the shift is the two-body analytical one
                let s_state = state
                    .shifted_by(-self.transition_time)
                    .map_err(|e| EventError::EventEval {
                        epoch: date,
                        details: format!("{e}"),
                    })?;
                let s_epoch = s_state.epoch();
                let s_attitude = self
                    .past
                    .attitude(&s_state, s_epoch, frame)
                    .map_err(|e| attitude_failure(s_epoch, e))?;
                let transition: LawArc = Arc::new(TransitionLaw {
                    preceding: s_attitude,
                    transition_end: date,
                    future: self.future.clone(),
                    filter: self.transition_filter,
                });

                {
                    let mut map = write_map(&self.activated);
                    map.add_valid_before(transition, date);
                    // Prepare the past law before the transition
                    map.add_valid_before(self.past.clone(), s_epoch);
                }

                if let Some(handler) = &self.handler {
                    handler.switch_occurred(&self.future, &self.past, &s_state);
                }

                self.event.event_occurred(&s_state, increasing)
            }
        } else {
            // Trigger the underlying event despite no attitude switch occurred
            self.event.event_occurred(state, increasing)
        }
    }

    fn reset_state(&self, state: &Spacecraft) -> Result<Spacecraft, EventError> {
        // Delegate to the underlying event
        self.event.reset_state(state)
    }
}

impl fmt::Display for Switch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "attitude switch on [{}] ({} -> {})",
            self.event, self.past, self.future
        )
    }
}

/// The ephemeral law bridging two laws during a switch: interpolates between
/// the attitude frozen at transition start and the future law evaluated at
/// transition end.
struct TransitionLaw {
    preceding: Attitude,
    transition_end: Epoch,
    future: LawArc,
    filter: AngularDerivativesFilter,
}

impl AttitudeLaw for TransitionLaw {
    fn attitude(
        &self,
        pv: &dyn PvProvider,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<Attitude, AttitudeError> {
        let end = self.future.attitude(pv, self.transition_end, frame)?;
        Attitude::interpolate(&self.preceding, &end, epoch, self.filter)
    }
}

impl fmt::Display for TransitionLaw {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "transition to {} @ {}", self.future, self.transition_end)
    }
}
