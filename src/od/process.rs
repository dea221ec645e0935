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

use super::builder::{MatricesHarvester, SpacecraftPropagatorBuilder};
use super::estimate::{KalmanEstimate, Residual};
use super::filter::KalmanFilter;
use super::ground_station::GroundStation;
use super::msr::Measurement;
use super::noise::CovarianceProvider;
use super::params::ParameterList;
use super::{ODError, ODPropSnafu};
use crate::cosmic::Spacecraft;
use crate::dynamics::SpacecraftDynamics;
use crate::linalg::{DMatrix, DVector};
use crate::propagators::{Propagator, RSSCartesianStep};
use crate::time::Epoch;
use crate::State;
use snafu::ResultExt;
use std::collections::BTreeMap;

/// Observer notified after each processed measurement with the current
/// estimation state in physical units.
pub trait KalmanObserver: Send {
    fn estimate_updated(
        &mut self,
        msr_index: usize,
        epoch: Epoch,
        physical_state: &DVector<f64>,
        physical_covar: &DMatrix<f64>,
    );
}

/// One entry of the estimation state vector.
#[derive(Clone, Debug, PartialEq)]
enum ParamSlot {
    /// Index in the spacecraft state vector (orbital or propagation parameter)
    State(usize),
    /// Range bias of the named ground station
    RangeBias(String),
}

/// A sequential (extended) Kalman orbit determination process.
///
/// The estimation state is the concatenation of the selected orbital drivers,
/// the selected propagation drivers, and the selected measurement (station
/// bias) drivers; this ordering is fixed at construction and shared by the
/// state vector, the covariance, and all Jacobians. All filter internals are
/// normalized with each parameter's scale; physical units appear only on the
/// public interface.
///
/// Measurements must be processed in non decreasing epoch order; an out of
/// order measurement is a usage error and aborts the processing. On a
/// numerical failure in the correction step, the error is surfaced to the
/// caller and the last successfully corrected state remains queryable.
pub struct SequentialKalman {
    pub builder: SpacecraftPropagatorBuilder,
    /// The Kalman filter itself (normalized internals)
    pub filter: KalmanFilter,
    /// Estimates computed at each processed measurement
    pub estimates: Vec<KalmanEstimate>,
    /// Residuals, in physical units, at each processed measurement
    pub residuals: Vec<Residual>,
    devices: BTreeMap<String, GroundStation>,
    covar_provider: Box<dyn CovarianceProvider>,
    msr_noise_provider: Option<Box<dyn CovarianceProvider>>,
    observer: Option<Box<dyn KalmanObserver>>,
    prop: Propagator<SpacecraftDynamics, RSSCartesianStep>,
    slots: Vec<ParamSlot>,
    scales: DVector<f64>,
    /// Number of leading slots backed by the spacecraft state (dynamical parameters)
    nb_dyn: usize,
    reference: Spacecraft,
    current_epoch: Epoch,
    msr_count: usize,
}

impl SequentialKalman {
    /// Binds the process to a propagator builder, the tracking devices, a
    /// provider for the dynamical covariance/process noise, and optionally a
    /// provider for the measurement parameter process noise.
    pub fn new(
        builder: SpacecraftPropagatorBuilder,
        devices: Vec<GroundStation>,
        covar_provider: Box<dyn CovarianceProvider>,
        msr_noise_provider: Option<Box<dyn CovarianceProvider>>,
    ) -> Result<Self, ODError> {
        let mut slots = Vec::new();
        let mut scales = Vec::new();

        for (i, driver) in builder.orbital.iter().enumerate() {
            if driver.selected {
                slots.push(ParamSlot::State(i));
                scales.push(driver.scale);
            }
        }
        for driver in builder.propagation.iter() {
            if driver.selected {
                match SpacecraftPropagatorBuilder::propagation_state_index(&driver.name) {
                    Some(idx) => {
                        slots.push(ParamSlot::State(idx));
                        scales.push(driver.scale);
                    }
                    None => {
                        return Err(ODError::UnknownParameter {
                            name: driver.name.clone(),
                        })
                    }
                }
            }
        }
        let nb_dyn = slots.len();

        let mut device_map = BTreeMap::new();
        for station in devices {
            if let Some(bias) = &station.range_bias {
                if bias.selected {
                    slots.push(ParamSlot::RangeBias(station.name.clone()));
                    scales.push(bias.scale);
                }
            }
            device_map.insert(station.name.clone(), station);
        }

        if slots.is_empty() {
            return Err(ODError::NothingToEstimate);
        }

        let dim = slots.len();
        let scales = DVector::from_vec(scales);

        let reference = builder.build_spacecraft();
        let current_epoch = reference.epoch();

        // Assemble and normalize the initial covariance
        let mut p0 = DMatrix::zeros(dim, dim);
        let p0_dyn = covar_provider.initial_covariance(nb_dyn);
        p0.view_mut((0, 0), (nb_dyn, nb_dyn)).copy_from(&p0_dyn);
        if let Some(provider) = &msr_noise_provider {
            let nb_msr = dim - nb_dyn;
            if nb_msr > 0 {
                let p0_msr = provider.initial_covariance(nb_msr);
                p0.view_mut((nb_dyn, nb_dyn), (nb_msr, nb_msr))
                    .copy_from(&p0_msr);
            }
        }
        let p0_norm = normalize_covariance(&p0, &scales);

        let filter = KalmanFilter::new(KalmanEstimate::from_covar(current_epoch, p0_norm));

        let prop = Propagator::dp45(builder.dynamics.clone(), builder.opts);

        info!(
            "Sequential Kalman estimator over {dim} parameters ({nb_dyn} dynamical), starting @ {current_epoch}"
        );

        Ok(Self {
            builder,
            filter,
            estimates: Vec::new(),
            residuals: Vec::new(),
            devices: device_map,
            covar_provider,
            msr_noise_provider,
            observer: None,
            prop,
            slots,
            scales,
            nb_dyn,
            reference,
            current_epoch,
            msr_count: 0,
        })
    }

    /// Sets the observer notified after each processed measurement.
    pub fn set_observer(&mut self, observer: Box<dyn KalmanObserver>) {
        self.observer = Some(observer);
    }

    /// Processes the provided measurements, strictly in time order, and
    /// returns the final corrected reference state.
    pub fn process_measurements(
        &mut self,
        measurements: &[Measurement],
    ) -> Result<Spacecraft, ODError> {
        if measurements.is_empty() {
            return Err(ODError::TooFewMeasurements {
                need: 1,
                action: "process_measurements",
            });
        }
        info!(
            "Processing {} measurements from {} to {}",
            measurements.len(),
            measurements[0].epoch,
            measurements[measurements.len() - 1].epoch
        );

        for (idx, msr) in measurements.iter().enumerate() {
            if msr.epoch < self.current_epoch {
                return Err(ODError::OutOfOrderMeasurement {
                    epoch: msr.epoch,
                    prev: self.current_epoch,
                });
            }
            self.process_one(idx, msr)?;
        }

        Ok(self.reference)
    }

    fn process_one(&mut self, msr_index: usize, msr: &Measurement) -> Result<(), ODError> {
        let expect = msr.kind.dimension();
        if msr.dimension() != expect || msr.sigmas.len() != expect {
            return Err(ODError::MeasurementDimension {
                got: msr.dimension(),
                expect,
                kind: "observation",
            });
        }

        let prev_epoch = self.current_epoch;

        // (a) Propagate the reference trajectory to the measurement epoch.
        let state = {
            let mut inst = self.prop.with(self.reference);
            inst.until_epoch(msr.epoch).context(ODPropSnafu)?
        };

        // Re-derive the partial derivatives from the state the propagation
        // just produced: the harvester is rebuilt here on purpose, a harvester
        // kept from a previous update would refer to a stale propagator.
        let harvester = MatricesHarvester::new(&state)?;
        let sc_indexes: Vec<usize> = self
            .slots
            .iter()
            .filter_map(|slot| match slot {
                ParamSlot::State(idx) => Some(*idx),
                ParamSlot::RangeBias(_) => None,
            })
            .collect();
        let nb_msr_params = self.slots.len() - self.nb_dyn;
        let phi = harvester.state_transition(&sc_indexes, nb_msr_params);

        // (b) Normalize the error STM and the process noise.
        let phi_norm = normalize_stm(&phi, &self.scales);
        let q = self.assemble_process_noise(prev_epoch, msr.epoch);
        let q_norm = normalize_covariance(&q, &self.scales);

        // (d) Compute the residual and its Jacobian with respect to the
        // estimated parameters.
        let device = self
            .devices
            .get(&msr.device)
            .ok_or_else(|| ODError::UnknownDevice {
                name: msr.device.clone(),
            })?;
        let computed = device.theoretical(&state, msr.kind);
        let h_sc = device.sensitivity(&state, msr.kind);

        let msr_dim = msr.dimension();
        let dim = self.slots.len();
        let mut h = DMatrix::zeros(msr_dim, dim);
        for (col, slot) in self.slots.iter().enumerate() {
            match slot {
                ParamSlot::State(idx) if *idx < 6 => {
                    for row in 0..msr_dim {
                        h[(row, col)] = h_sc[(row, *idx)];
                    }
                }
                // CR and CD do not appear directly in the measurement model
                ParamSlot::State(_) => {}
                ParamSlot::RangeBias(name) if *name == msr.device => {
                    // The bias shifts the range component only
                    h[(0, col)] = 1.0;
                }
                ParamSlot::RangeBias(_) => {}
            }
        }

        // Normalize: parameters by their scale, observables by their sigma
        let mut h_norm = h;
        let mut prefit_norm = DVector::zeros(msr_dim);
        for row in 0..msr_dim {
            let sigma = msr.sigmas[row];
            prefit_norm[row] = (msr.observation[row] - computed[row]) / sigma;
            for col in 0..dim {
                h_norm[(row, col)] *= self.scales[col] / sigma;
            }
        }
        let r_norm = DMatrix::identity(msr_dim, msr_dim);

        // (c, e) Predict and correct.
        self.filter.update_h_tilde(h_norm);
        let (estimate, residual_norm) =
            self.filter
                .measurement_update(msr.epoch, &phi_norm, &q_norm, prefit_norm, r_norm)?;
        debug!("msr update #{msr_index} @ {}", msr.epoch);

        // (f) De-normalize: apply the physical correction to the drivers and
        // rebuild the reference trajectory from them.
        self.sync_drivers_from(&state);
        if residual_norm.rejected {
            warn!(
                "measurement #{msr_index} @ {} rejected (ratio {:.2})",
                msr.epoch, residual_norm.ratio
            );
            self.reference = reset_stm(state);
        } else {
            for (col, slot) in self.slots.clone().iter().enumerate() {
                let delta = estimate.state_deviation[col] * self.scales[col];
                self.apply_delta(slot, delta)?;
            }
            self.reference = reset_stm(self.rebuild_reference(&state));
            self.filter.reset_deviation();
        }

        // Physical residuals
        let mut prefit = residual_norm.prefit.clone();
        let mut postfit = residual_norm.postfit.clone();
        for row in 0..msr_dim {
            prefit[row] *= msr.sigmas[row];
            postfit[row] *= msr.sigmas[row];
        }
        let residual = Residual {
            epoch: residual_norm.epoch,
            prefit,
            postfit,
            ratio: residual_norm.ratio,
            rejected: residual_norm.rejected,
        };

        self.current_epoch = msr.epoch;
        self.msr_count += 1;
        self.estimates.push(estimate);
        self.residuals.push(residual);

        // (g) Notify the observer with physical quantities.
        if self.observer.is_some() {
            let physical_state = self.physical_estimated_state();
            let physical_covar = self.physical_estimated_covariance();
            if let Some(observer) = self.observer.as_mut() {
                observer.estimate_updated(msr_index, msr.epoch, &physical_state, &physical_covar);
            }
        }

        Ok(())
    }

    /// Physical process noise over the full estimation state: the dynamical
    /// block from the covariance provider, the measurement parameter block
    /// from the measurement process noise provider (zero when absent).
    fn assemble_process_noise(&self, prev: Epoch, next: Epoch) -> DMatrix<f64> {
        let dim = self.slots.len();
        let mut q = DMatrix::zeros(dim, dim);
        let q_dyn = self.covar_provider.process_noise(prev, next, self.nb_dyn);
        q.view_mut((0, 0), (self.nb_dyn, self.nb_dyn))
            .copy_from(&q_dyn);
        if let Some(provider) = &self.msr_noise_provider {
            let nb_msr = dim - self.nb_dyn;
            if nb_msr > 0 {
                let q_msr = provider.process_noise(prev, next, nb_msr);
                q.view_mut((self.nb_dyn, self.nb_dyn), (nb_msr, nb_msr))
                    .copy_from(&q_msr);
            }
        }
        q
    }

    /// Updates the drivers so that they reflect the provided reference state.
    fn sync_drivers_from(&mut self, state: &Spacecraft) {
        let vec = state.to_vector();
        for (i, driver) in self.builder.orbital.iter_mut().enumerate() {
            driver.set_value(vec[i]);
        }
        for driver in self.builder.propagation.iter_mut() {
            if let Some(idx) = SpacecraftPropagatorBuilder::propagation_state_index(&driver.name) {
                driver.set_value(vec[idx]);
            }
        }
    }

    /// Applies a physical delta to the driver backing the provided slot.
    fn apply_delta(&mut self, slot: &ParamSlot, delta: f64) -> Result<(), ODError> {
        match slot {
            ParamSlot::State(idx) if *idx < 6 => {
                let name = super::builder::ORBITAL_PARAM_NAMES[*idx];
                self.builder.orbital.get_mut(name)?.apply_delta(delta);
            }
            ParamSlot::State(idx) => {
                for driver in self.builder.propagation.iter_mut() {
                    if SpacecraftPropagatorBuilder::propagation_state_index(&driver.name)
                        == Some(*idx)
                    {
                        driver.apply_delta(delta);
                    }
                }
            }
            ParamSlot::RangeBias(name) => {
                let device = self
                    .devices
                    .get_mut(name)
                    .ok_or_else(|| ODError::UnknownDevice { name: name.clone() })?;
                if let Some(bias) = device.range_bias.as_mut() {
                    bias.apply_delta(delta);
                }
            }
        }
        Ok(())
    }

    /// Rebuilds the reference spacecraft at the epoch of `state` from the
    /// corrected driver values, carrying over the non estimated quantities.
    fn rebuild_reference(&self, state: &Spacecraft) -> Spacecraft {
        let mut rebuilt = *state;
        let mut vec = rebuilt.to_vector();
        for (i, driver) in self.builder.orbital.iter().enumerate() {
            vec[i] = driver.value();
        }
        for driver in self.builder.propagation.iter() {
            if let Some(idx) = SpacecraftPropagatorBuilder::propagation_state_index(&driver.name) {
                vec[idx] = driver.value();
            }
        }
        rebuilt.set(rebuilt.epoch(), &vec);
        rebuilt
    }

    /// The "physical" estimated state (i.e. not normalized), ordered like the
    /// estimation state vector.
    pub fn physical_estimated_state(&self) -> DVector<f64> {
        let mut state = DVector::zeros(self.slots.len());
        for (i, slot) in self.slots.iter().enumerate() {
            state[i] = match slot {
                ParamSlot::State(idx) => self.reference.to_vector()[*idx],
                ParamSlot::RangeBias(name) => self
                    .devices
                    .get(name)
                    .map(|d| d.bias_km())
                    .unwrap_or(0.0),
            };
        }
        state
    }

    /// The "physical" estimated covariance matrix (i.e. not normalized).
    pub fn physical_estimated_covariance(&self) -> DMatrix<f64> {
        let covar_norm = &self.filter.prev_estimate.covar;
        let dim = covar_norm.nrows();
        let mut covar = DMatrix::zeros(dim, dim);
        for i in 0..dim {
            for j in 0..dim {
                covar[(i, j)] = covar_norm[(i, j)] * self.scales[i] * self.scales[j];
            }
        }
        covar
    }

    /// Orbital parameter drivers supported by this estimator.
    pub fn orbital_parameters_drivers(&self, estimated_only: bool) -> ParameterList {
        filtered(&self.builder.orbital, estimated_only)
    }

    /// Propagation (physical model) parameter drivers supported by this estimator.
    pub fn propagation_parameters_drivers(&self, estimated_only: bool) -> ParameterList {
        filtered(&self.builder.propagation, estimated_only)
    }

    /// The estimated measurement parameters (station biases).
    pub fn estimated_measurement_parameters(&self) -> ParameterList {
        let mut list = ParameterList::new();
        for slot in &self.slots {
            if let ParamSlot::RangeBias(name) = slot {
                if let Some(device) = self.devices.get(name) {
                    if let Some(bias) = &device.range_bias {
                        // Names are unique per station, the push cannot collide
                        let _ = list.push(bias.clone());
                    }
                }
            }
        }
        list
    }

    /// Current date of the filter.
    pub fn current_epoch(&self) -> Epoch {
        self.current_epoch
    }

    /// Number of measurements processed so far.
    pub fn measurement_count(&self) -> usize {
        self.msr_count
    }

    /// The current reference state, reflecting all corrections so far.
    pub fn reference_state(&self) -> Spacecraft {
        self.reference
    }

    /// Dimension of the estimation state.
    pub fn dimension(&self) -> usize {
        self.slots.len()
    }
}

fn filtered(list: &ParameterList, estimated_only: bool) -> ParameterList {
    let mut out = ParameterList::new();
    for driver in list.iter() {
        if driver.selected || !estimated_only {
            // Source list has unique names, the push cannot collide
            let _ = out.push(driver.clone());
        }
    }
    out
}

fn reset_stm(mut state: Spacecraft) -> Spacecraft {
    state.reset_stm();
    state
}

/// P_norm = S^-1 P S^-1 with S the diagonal matrix of scales.
fn normalize_covariance(covar: &DMatrix<f64>, scales: &DVector<f64>) -> DMatrix<f64> {
    let dim = covar.nrows();
    let mut norm = DMatrix::zeros(dim, dim);
    for i in 0..dim {
        for j in 0..dim {
            norm[(i, j)] = covar[(i, j)] / (scales[i] * scales[j]);
        }
    }
    norm
}

/// Phi_norm = S^-1 Phi S with S the diagonal matrix of scales.
fn normalize_stm(phi: &DMatrix<f64>, scales: &DVector<f64>) -> DMatrix<f64> {
    let dim = phi.nrows();
    let mut norm = DMatrix::zeros(dim, dim);
    for i in 0..dim {
        for j in 0..dim {
            norm[(i, j)] = phi[(i, j)] * scales[j] / scales[i];
        }
    }
    norm
}
