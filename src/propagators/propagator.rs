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

use super::error_ctrl::{ErrorCtrl, RSSCartesianStep};
use super::rk_methods::{DormandPrince45, RK, RK4Fixed};
use super::{IntegrationDetails, PropInstance};
use crate::dynamics::Dynamics;
use crate::linalg::allocator::Allocator;
use crate::linalg::{DefaultAllocator, OVector};
use crate::time::{Duration, Unit};
use crate::State;
use std::marker::PhantomData;

/// Integration options for a propagator: step bounds, tolerance and the
/// maximum number of step size reduction attempts.
#[derive(Clone, Copy, Debug)]
pub struct PropOpts<E: ErrorCtrl> {
    pub init_step: Duration,
    pub min_step: Duration,
    pub max_step: Duration,
    pub tolerance: f64,
    pub attempts: u8,
    pub fixed_step: bool,
    _errctrl: PhantomData<E>,
}

impl<E: ErrorCtrl> PropOpts<E> {
    pub fn with_adaptive_step(min_step: Duration, max_step: Duration, tolerance: f64) -> Self {
        Self {
            init_step: max_step,
            min_step,
            max_step,
            tolerance,
            attempts: 50,
            fixed_step: false,
            _errctrl: PhantomData,
        }
    }

    pub fn with_fixed_step(step: Duration) -> Self {
        Self {
            init_step: step,
            min_step: step,
            max_step: step,
            tolerance: 0.0,
            attempts: 0,
            fixed_step: true,
            _errctrl: PhantomData,
        }
    }
}

impl<E: ErrorCtrl> Default for PropOpts<E> {
    /// `default` returns the same default options as GMAT-heritage tools: a
    /// step between 1 millisecond and 60 seconds with a tolerance of 1e-12.
    fn default() -> Self {
        Self {
            init_step: 60 * Unit::Second,
            min_step: 1 * Unit::Millisecond,
            max_step: 60 * Unit::Second,
            tolerance: 1e-12,
            attempts: 50,
            fixed_step: false,
            _errctrl: PhantomData,
        }
    }
}

/// A propagator setup: the dynamics, the Runge Kutta tableau and the options.
/// Create a [PropInstance] with [Propagator::with] to actually propagate a state.
#[derive(Clone)]
pub struct Propagator<D: Dynamics, E: ErrorCtrl = RSSCartesianStep>
where
    DefaultAllocator: Allocator<<D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::Size, <D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::VecLength>,
{
    pub dynamics: D,
    pub opts: PropOpts<E>,
    pub(crate) order: u8,
    pub(crate) stages: usize,
    pub(crate) a_coeffs: &'static [f64],
    pub(crate) b_coeffs: &'static [f64],
}

impl<D: Dynamics, E: ErrorCtrl> Propagator<D, E>
where
    DefaultAllocator: Allocator<<D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::Size, <D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::VecLength>,
{
    /// Builds a propagator for the provided dynamics, Runge Kutta method and options.
    pub fn new<T: RK>(dynamics: D, opts: PropOpts<E>) -> Self {
        Self {
            dynamics,
            opts,
            stages: T::STAGES,
            order: T::ORDER,
            a_coeffs: T::A_COEFFS,
            b_coeffs: T::B_COEFFS,
        }
    }

    /// An adaptive step Dormand Prince 5(4) propagator with the provided options.
    pub fn dp45(dynamics: D, opts: PropOpts<E>) -> Self {
        Self::new::<DormandPrince45>(dynamics, opts)
    }

    /// A fixed step classical RK4 propagator.
    pub fn rk4_fixed(dynamics: D, step: Duration) -> Self {
        Self::new::<RK4Fixed>(dynamics, PropOpts::with_fixed_step(step))
    }

    /// Returns a propagator instance from this setup, starting at the provided state.
    pub fn with(&self, state: D::StateType) -> PropInstance<'_, D, E> {
        let k = (0..self.stages)
            .map(|_| OVector::<f64, <D::StateType as State>::VecLength>::zeros())
            .collect();
        PropInstance {
            state,
            prop: self,
            details: IntegrationDetails {
                step: self.opts.init_step,
                error: 0.0,
                attempts: 1,
            },
            step_size: self.opts.init_step,
            fixed_step: self.opts.fixed_step,
            k,
            event_detectors: Vec::new(),
            event_last_trigger: Vec::new(),
            stopped_on_event: None,
        }
    }
}

impl<D: Dynamics> Propagator<D, RSSCartesianStep>
where
    DefaultAllocator: Allocator<<D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::Size, <D::StateType as State>::Size>
        + Allocator<<D::StateType as State>::VecLength>,
{
    /// A default propagator: Dormand Prince 5(4) with the default options.
    pub fn default_dp45(dynamics: D) -> Self {
        Self::dp45(dynamics, PropOpts::default())
    }
}
