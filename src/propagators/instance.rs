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

use super::error_ctrl::ErrorCtrl;
use super::events::{Action, EventDetector};
use super::{
    IntegrationDetails, PropDynamicsSnafu, PropEventSnafu, PropagationError, Propagator,
};
use crate::dynamics::Dynamics;
use crate::errors::EventError;
use crate::linalg::allocator::Allocator;
use crate::linalg::{DefaultAllocator, OVector};
use crate::time::{Duration, Epoch, Unit};
use crate::State;
use snafu::ResultExt;
use std::sync::Arc;

/// A propagator instance: the mutable stepping state created from a
/// [Propagator] setup, including the registered event detectors.
pub struct PropInstance<'a, D: Dynamics, E: ErrorCtrl>
where
    DefaultAllocator: Allocator<<D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::Size, <D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::VecLength>,
{
    /// The state of this propagator instance
    pub state: D::StateType,
    /// The propagator setup (kind, stages, etc.)
    pub prop: &'a Propagator<D, E>,
    /// Stores the details of the previous integration step
    pub details: IntegrationDetails,
    /// Set when the last propagation was interrupted by an event returning [Action::Stop]
    pub stopped_on_event: Option<Epoch>,
    pub(crate) step_size: Duration, // Stores the adapted step for the _next_ call
    pub(crate) fixed_step: bool,
    // Allows us to do pre-allocation of the ki vectors
    pub(crate) k: Vec<OVector<f64, <D::StateType as State>::VecLength>>,
    pub(crate) event_detectors: Vec<Arc<dyn EventDetector<D::StateType>>>,
    pub(crate) event_last_trigger: Vec<Option<Epoch>>,
}

impl<'a, D: Dynamics, E: ErrorCtrl> PropInstance<'a, D, E>
where
    DefaultAllocator: Allocator<<D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::Size, <D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::VecLength>,
{
    /// Allows setting the step size of the propagator
    pub fn set_step(&mut self, step_size: Duration, fixed: bool) {
        self.step_size = step_size;
        self.fixed_step = fixed;
    }

    /// Registers an event detector on this instance. Detectors are initialized
    /// at the start of each propagation and polled across every accepted step.
    pub fn add_event_detector(&mut self, detector: Arc<dyn EventDetector<D::StateType>>) {
        self.event_detectors.push(detector);
        self.event_last_trigger.push(None);
    }

    /// This method propagates the provided Dynamics for the provided duration
    /// (negative durations propagate backward).
    pub fn for_duration(&mut self, duration: Duration) -> Result<D::StateType, PropagationError> {
        if duration == Duration::ZERO {
            return Ok(self.state);
        }
        let stop_time = self.state.epoch() + duration;
        self.stopped_on_event = None;

        let log_progress = duration.abs() >= 2 * Unit::Minute;
        if log_progress {
            // Prevent the print spam for orbit determination cases
            info!("Propagating for {duration} until {stop_time}");
        }

        // Call `finally` on the current state to set anything up
        self.state = self
            .prop
            .dynamics
            .finally(self.state)
            .context(PropDynamicsSnafu)?;

        let backprop = duration.is_negative();
        if backprop {
            self.step_size = -self.step_size; // Invert the step size
        }

        // Initialize the detectors for this propagation
        let detectors = self.event_detectors.clone();
        self.event_last_trigger = vec![None; detectors.len()];
        for detector in &detectors {
            detector
                .init(&self.state, stop_time)
                .context(PropEventSnafu)?;
        }

        let rtn = self.prop_loop(stop_time, backprop);
        if backprop {
            self.step_size = -self.step_size; // Restore to a positive step size
        }
        rtn
    }

    /// Propagates the provided Dynamics until the provided epoch. Returns the end state.
    pub fn until_epoch(&mut self, end_time: Epoch) -> Result<D::StateType, PropagationError> {
        let duration: Duration = end_time - self.state.epoch();
        self.for_duration(duration)
    }

    fn prop_loop(
        &mut self,
        stop_time: Epoch,
        backprop: bool,
    ) -> Result<D::StateType, PropagationError> {
        loop {
            let epoch = self.state.epoch();
            if epoch == stop_time {
                return Ok(self.state);
            }
            let prev_state = self.state;
            if (!backprop && epoch + self.step_size > stop_time)
                || (backprop && epoch + self.step_size < stop_time)
            {
                // Take one final step of exactly the needed duration until the stop time
                let prev_step_size = self.step_size;
                let prev_step_kind = self.fixed_step;
                self.set_step(stop_time - epoch, true);
                self.single_step()?;
                // Restore the step size for subsequent calls
                self.set_step(prev_step_size, prev_step_kind);
            } else {
                self.single_step()?;
            }

            if self.check_events(&prev_state)? {
                return Ok(self.state);
            }
        }
    }

    /// Take a single propagator step
    pub fn single_step(&mut self) -> Result<(), PropagationError> {
        let (t, state_vec) = self.derive()?;
        self.state.set(self.state.epoch() + t, &state_vec);
        self.state = self
            .prop
            .dynamics
            .finally(self.state)
            .context(PropDynamicsSnafu)?;

        Ok(())
    }

    /// This method integrates the equations of motion. Everything passed to
    /// this function is in **seconds**.
    ///
    /// Returns the step size used (as a Duration) and the next state vector.
    fn derive(
        &mut self,
    ) -> Result<(Duration, OVector<f64, <D::StateType as State>::VecLength>), PropagationError>
    {
        let state_vec = self.state.to_vector();
        let state_ctx = self.state;
        // Reset the number of attempts used (we don't reset the error because it's set before it's read)
        self.details.attempts = 1;
        let sign = if self.step_size.is_negative() {
            -1.0
        } else {
            1.0
        };
        let mut h = self.step_size.abs().to_seconds();
        loop {
            let step_size_s = sign * h;
            let ki = self
                .prop
                .dynamics
                .eom(0.0, &state_vec, &state_ctx)
                .context(PropDynamicsSnafu)?;
            self.k[0] = ki;
            let mut a_idx: usize = 0;
            for i in 0..(self.prop.stages - 1) {
                // Compute the c_i by summing the relevant items from the list of coefficients:
                // \sum_{j=1}^{i-1} a_ij  for all i in [2, s]
                let mut ci: f64 = 0.0;
                let mut wi =
                    OVector::<f64, <D::StateType as State>::VecLength>::from_element(0.0);
                for kj in &self.k[0..i + 1] {
                    let a_ij = self.prop.a_coeffs[a_idx];
                    ci += a_ij;
                    wi += a_ij * kj;
                    a_idx += 1;
                }

                let ki = self
                    .prop
                    .dynamics
                    .eom(
                        ci * step_size_s,
                        &(&state_vec + step_size_s * wi),
                        &state_ctx,
                    )
                    .context(PropDynamicsSnafu)?;
                self.k[i + 1] = ki;
            }

            // Compute the next state and the error estimate
            let mut next_state = state_vec.clone();
            let mut error_est =
                OVector::<f64, <D::StateType as State>::VecLength>::from_element(0.0);
            for (i, ki) in self.k.iter().enumerate() {
                let b_i = self.prop.b_coeffs[i];
                if !self.fixed_step {
                    let b_i_star = self.prop.b_coeffs[i + self.prop.stages];
                    error_est += step_size_s * (b_i - b_i_star) * ki;
                }
                next_state += step_size_s * b_i * ki;
            }

            if self.fixed_step {
                // Using a fixed step, no adaptive step necessary
                self.details.step = self.step_size;
                return Ok((self.details.step, next_state));
            }

            self.details.error = E::estimate(&error_est, &next_state, &state_vec);
            if self.details.error <= self.prop.opts.tolerance
                || h <= self.prop.opts.min_step.to_seconds()
                || self.details.attempts >= self.prop.opts.attempts
            {
                if self.details.attempts >= self.prop.opts.attempts {
                    warn!(
                        "Could not further decrease step size: maximum number of attempts reached ({})",
                        self.details.attempts
                    );
                }

                self.details.step = sign * h * Unit::Second;
                if self.details.error < self.prop.opts.tolerance {
                    // Error is less than the tolerance: attempt to increase the step for the next iteration
                    let proposed_step = 0.9
                        * h
                        * (self.prop.opts.tolerance / self.details.error)
                            .powf(1.0 / f64::from(self.prop.order));
                    h = proposed_step.min(self.prop.opts.max_step.to_seconds());
                }
                // In all cases, update the step size to whatever was the adapted step size
                self.step_size = sign * h * Unit::Second;
                return Ok((self.details.step, next_state));
            } else {
                // Error is too high, adapt the step size downward
                self.details.attempts += 1;
                let proposed_step = 0.9
                    * h
                    * (self.prop.opts.tolerance / self.details.error)
                        .powf(1.0 / f64::from(self.prop.order - 1));
                h = proposed_step.max(self.prop.opts.min_step.to_seconds());
            }
        }
    }

    /// Integrates a single fixed step of `tau_s` seconds from the provided
    /// state, using the propagation weights without error control. Used for
    /// event localization within an accepted step.
    pub(crate) fn integrate_fixed_from(
        &self,
        from: &D::StateType,
        tau_s: f64,
    ) -> Result<D::StateType, PropagationError> {
        if tau_s == 0.0 {
            return Ok(*from);
        }
        let vec0 = from.to_vector();
        let mut k: Vec<OVector<f64, <D::StateType as State>::VecLength>> =
            Vec::with_capacity(self.prop.stages);
        k.push(
            self.prop
                .dynamics
                .eom(0.0, &vec0, from)
                .context(PropDynamicsSnafu)?,
        );
        let mut a_idx: usize = 0;
        for i in 0..(self.prop.stages - 1) {
            let mut ci: f64 = 0.0;
            let mut wi = OVector::<f64, <D::StateType as State>::VecLength>::from_element(0.0);
            for kj in &k[0..i + 1] {
                let a_ij = self.prop.a_coeffs[a_idx];
                ci += a_ij;
                wi += a_ij * kj;
                a_idx += 1;
            }
            let ki = self
                .prop
                .dynamics
                .eom(ci * tau_s, &(&vec0 + tau_s * wi), from)
                .context(PropDynamicsSnafu)?;
            k.push(ki);
        }
        let mut next_state = vec0.clone();
        for (i, ki) in k.iter().enumerate() {
            next_state += tau_s * self.prop.b_coeffs[i] * ki;
        }
        let mut out = *from;
        out.set(from.epoch() + tau_s * Unit::Second, &next_state);
        self.prop
            .dynamics
            .finally(out)
            .context(PropDynamicsSnafu)
    }

    /// Sweeps all registered detectors across the step from `prev_state` to
    /// the current state, handles the earliest triggered event, and returns
    /// whether the propagation must stop.
    fn check_events(&mut self, prev_state: &D::StateType) -> Result<bool, PropagationError> {
        if self.event_detectors.is_empty() {
            return Ok(false);
        }
        let t0 = prev_state.epoch();
        let h = (self.state.epoch() - t0).to_seconds();
        if h == 0.0 {
            return Ok(false);
        }

        let detectors = self.event_detectors.clone();
        // Earliest crossing in the direction of travel wins: (detector index, tau, increasing)
        let mut best: Option<(usize, f64, bool)> = None;

        for (i, detector) in detectors.iter().enumerate() {
            let max_chk = detector.max_check().to_seconds();
            let nb_sub = ((h.abs() / max_chk).ceil() as usize).max(1);
            let dt = h / (nb_sub as f64);

            let mut tau_a = 0.0;
            let mut g_a = detector.g(prev_state).context(PropEventSnafu)?;
            for sub in 1..=nb_sub {
                let tau_b = if sub == nb_sub { h } else { dt * (sub as f64) };
                let state_b = if sub == nb_sub {
                    self.state
                } else {
                    self.integrate_fixed_from(prev_state, tau_b)?
                };
                let g_b = detector.g(&state_b).context(PropEventSnafu)?;

                if g_a * g_b < 0.0 {
                    let tau_root = self
                        .locate_event(detector.as_ref(), prev_state, tau_a, g_a, tau_b, g_b)
                        .context(PropEventSnafu)?;
                    let root_epoch = t0 + tau_root * Unit::Second;
                    let duplicate = match self.event_last_trigger[i] {
                        Some(last) => (root_epoch - last).abs() <= detector.event_threshold(),
                        None => false,
                    };
                    if !duplicate {
                        let increasing = g_b > g_a;
                        let earlier = match best {
                            Some((_, best_tau, _)) => {
                                if h > 0.0 {
                                    tau_root < best_tau
                                } else {
                                    tau_root > best_tau
                                }
                            }
                            None => true,
                        };
                        if earlier {
                            best = Some((i, tau_root, increasing));
                        }
                    }
                    // Only the first crossing of each detector within this step
                    break;
                }
                tau_a = tau_b;
                g_a = g_b;
            }
        }

        if let Some((i, tau, increasing)) = best {
            let event_state = self.integrate_fixed_from(prev_state, tau)?;
            let detector = detectors[i].clone();
            self.event_last_trigger[i] = Some(event_state.epoch());
            debug!("{detector} triggered @ {}", event_state.epoch());
            let action = detector
                .event_occurred(&event_state, increasing)
                .context(PropEventSnafu)?;
            match action {
                Action::Stop => {
                    self.state = event_state;
                    self.stopped_on_event = Some(event_state.epoch());
                    info!("propagation stopped by {detector} @ {}", event_state.epoch());
                    return Ok(true);
                }
                Action::Continue => {
                    self.state = event_state;
                }
                Action::ResetState => {
                    self.state = detector
                        .reset_state(&event_state)
                        .context(PropEventSnafu)?;
                }
            }
        }

        Ok(false)
    }

    /// Brent root localization of a bracketed sign change, in seconds from the
    /// epoch of `from`. The bracket values must have strictly opposite signs.
    fn locate_event(
        &self,
        detector: &dyn EventDetector<D::StateType>,
        from: &D::StateType,
        mut xa: f64,
        mut ya: f64,
        mut xb: f64,
        mut yb: f64,
    ) -> Result<f64, EventError> {
        let threshold_s = detector.event_threshold().to_seconds();
        let max_iter = detector.max_iter();

        let mut eval = |tau: f64| -> Result<f64, EventError> {
            let state = self
                .integrate_fixed_from(from, tau)
                .map_err(|e| EventError::EventEval {
                    epoch: from.epoch() + tau * Unit::Second,
                    details: format!("{e}"),
                })?;
            detector.g(&state)
        };

        // Keep xb as the best estimate
        if ya.abs() < yb.abs() {
            std::mem::swap(&mut xa, &mut xb);
            std::mem::swap(&mut ya, &mut yb);
        }
        let (mut xc, mut yc) = (xa, ya);
        let mut xd = xa;
        let mut flag = true;

        for _ in 0..max_iter {
            if (xa - xb).abs() <= threshold_s {
                return Ok(xb);
            }
            let mut s = if (ya - yc).abs() > f64::EPSILON && (yb - yc).abs() > f64::EPSILON {
                // Inverse quadratic interpolation
                xa * yb * yc / ((ya - yb) * (ya - yc))
                    + xb * ya * yc / ((yb - ya) * (yb - yc))
                    + xc * ya * yb / ((yc - ya) * (yc - yb))
            } else {
                // Secant
                xb - yb * (xb - xa) / (yb - ya)
            };
            let cond1 = (s - xb) * (s - (3.0 * xa + xb) / 4.0) > 0.0;
            let cond2 = flag && (s - xb).abs() >= (xb - xc).abs() / 2.0;
            let cond3 = !flag && (s - xb).abs() >= (xc - xd).abs() / 2.0;
            let cond4 = flag && (xb - xc).abs() <= threshold_s;
            let cond5 = !flag && (xc - xd).abs() <= threshold_s;
            if cond1 || cond2 || cond3 || cond4 || cond5 {
                s = (xa + xb) / 2.0;
                flag = true;
            } else {
                flag = false;
            }
            let ys = eval(s)?;
            if ys == 0.0 {
                return Ok(s);
            }
            xd = xc;
            xc = xb;
            yc = yb;
            if ya * ys < 0.0 {
                xb = s;
                yb = ys;
            } else {
                xa = s;
                ya = ys;
            }
            if ya.abs() < yb.abs() {
                std::mem::swap(&mut xa, &mut xb);
                std::mem::swap(&mut ya, &mut yb);
            }
        }
        Err(EventError::NotConverged {
            event: format!("{detector}"),
            iterations: max_iter,
        })
    }

    /// Copy the details of the latest integration step.
    pub fn latest_details(&self) -> IntegrationDetails {
        self.details
    }
}
