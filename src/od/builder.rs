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

use super::params::{ParameterDriver, ParameterList};
use super::{ODDynamicsSnafu, ODError};
use crate::cosmic::{Spacecraft, SC_IDX_CD, SC_IDX_CR};
use crate::dynamics::SpacecraftDynamics;
use crate::linalg::{DMatrix, OMatrix, U9};
use crate::propagators::{PropOpts, RSSCartesianStep};
use crate::time::Epoch;
use crate::State;
use snafu::ResultExt;

/// Names of the orbital parameter drivers, in state vector order.
pub const ORBITAL_PARAM_NAMES: [&str; 6] = ["X", "Y", "Z", "VX", "VY", "VZ"];
/// Name of the SRP reflectivity coefficient driver.
pub const CR_PARAM_NAME: &str = "CR";
/// Name of the drag coefficient driver.
pub const CD_PARAM_NAME: &str = "CD";

/// Builds configured spacecraft states for the estimation process from the
/// current values of its parameter drivers.
///
/// The drivers are the single source of truth for the estimated state: the
/// sequential estimator mutates their values and rebuilds the reference
/// trajectory from them.
#[derive(Clone)]
pub struct SpacecraftPropagatorBuilder {
    pub dynamics: SpacecraftDynamics,
    pub opts: PropOpts<RSSCartesianStep>,
    pub template: Spacecraft,
    /// The six Cartesian orbital drivers, all selected by default
    pub orbital: ParameterList,
    /// The physical model drivers (CR, CD), unselected by default
    pub propagation: ParameterList,
}

impl SpacecraftPropagatorBuilder {
    /// Creates a builder from a template spacecraft. Position drivers are
    /// scaled in km, velocity drivers in m/s equivalents, and the force model
    /// coefficients with a unit scale.
    pub fn new(
        template: Spacecraft,
        dynamics: SpacecraftDynamics,
        opts: PropOpts<RSSCartesianStep>,
    ) -> Result<Self, ODError> {
        let state_vec = template.to_vector();
        let mut orbital = ParameterList::new();
        for (i, name) in ORBITAL_PARAM_NAMES.iter().enumerate() {
            let scale = if i < 3 { 1.0 } else { 1e-3 };
            orbital.push(ParameterDriver::new(*name, state_vec[i], scale)?.select())?;
        }

        let mut propagation = ParameterList::new();
        propagation.push(
            ParameterDriver::new(CR_PARAM_NAME, template.srp_cr, 1.0)?.with_bounds(0.0, 4.0),
        )?;
        propagation.push(
            ParameterDriver::new(CD_PARAM_NAME, template.drag_cd, 1.0)?.with_bounds(0.0, 6.0),
        )?;

        Ok(Self {
            dynamics,
            opts,
            template,
            orbital,
            propagation,
        })
    }

    /// Marks a propagation parameter (CR or CD) as estimated.
    pub fn estimate_parameter(&mut self, name: &str) -> Result<(), ODError> {
        self.propagation.get_mut(name)?.selected = true;
        Ok(())
    }

    /// Builds a spacecraft from the current driver values, STM enabled,
    /// at the template epoch.
    pub fn build_spacecraft(&self) -> Spacecraft {
        let mut sc = self.template;
        let mut vec = sc.to_vector();
        for (i, driver) in self.orbital.iter().enumerate() {
            vec[i] = driver.value();
        }
        sc.set(sc.epoch(), &vec);
        for driver in self.propagation.iter() {
            match driver.name.as_str() {
                CR_PARAM_NAME => sc.srp_cr = driver.value(),
                CD_PARAM_NAME => sc.drag_cd = driver.value(),
                _ => {}
            }
        }
        sc.with_stm()
    }

    /// Spacecraft state vector index of the provided propagation parameter.
    pub(crate) fn propagation_state_index(name: &str) -> Option<usize> {
        match name {
            CR_PARAM_NAME => Some(SC_IDX_CR),
            CD_PARAM_NAME => Some(SC_IDX_CD),
            _ => None,
        }
    }
}

/// Harvests the partial derivative matrices from a propagated spacecraft
/// state.
///
/// A harvester is bound to the state it was built from and is intentionally
/// cheap to construct: the estimation process rebuilds one from the current
/// propagator state at every measurement update, so that no harvester can
/// outlive the propagator instance whose integration produced its matrices.
pub struct MatricesHarvester {
    pub epoch: Epoch,
    stm: OMatrix<f64, U9, U9>,
}

impl MatricesHarvester {
    /// Reads the 9x9 state transition matrix accumulated by the propagation.
    /// Fails when the state was not propagated with STM computation enabled.
    pub fn new(state: &Spacecraft) -> Result<Self, ODError> {
        Ok(Self {
            epoch: state.epoch(),
            stm: state.stm().context(ODDynamicsSnafu)?,
        })
    }

    /// Extracts the error state transition matrix over the provided spacecraft
    /// state indexes, with an identity block for the measurement parameters
    /// (biases are constant through the dynamics).
    pub fn state_transition(&self, sc_indexes: &[usize], nb_msr_params: usize) -> DMatrix<f64> {
        let dim = sc_indexes.len() + nb_msr_params;
        let mut phi = DMatrix::identity(dim, dim);
        for (i, &gi) in sc_indexes.iter().enumerate() {
            for (j, &gj) in sc_indexes.iter().enumerate() {
                phi[(i, j)] = self.stm[(gi, gj)];
            }
        }
        phi
    }
}

#[cfg(test)]
mod ut_builder {
    use super::*;
    use crate::cosmic::{Frame, Orbit};
    use approx::assert_abs_diff_eq;

    #[test]
    fn drivers_track_template() {
        let epoch = Epoch::from_gregorian_tai_at_midnight(2021, 4, 5);
        let orbit = Orbit::keplerian(7000.0, 0.01, 30.0, 0.0, 0.0, 0.0, epoch, Frame::EME2000);
        let sc = Spacecraft::from_orbit(orbit);
        let builder =
            SpacecraftPropagatorBuilder::new(sc, SpacecraftDynamics::two_body(), PropOpts::default())
                .unwrap();
        assert_eq!(builder.orbital.nb_selected(), 6);
        assert_eq!(builder.propagation.nb_selected(), 0);
        let rebuilt = builder.build_spacecraft();
        assert_abs_diff_eq!(rebuilt.orbit.x_km, orbit.x_km, epsilon = 1e-12);
        assert!(rebuilt.stm.is_some());
    }

    #[test]
    fn harvester_requires_stm() {
        let sc = Spacecraft::default();
        assert!(MatricesHarvester::new(&sc).is_err());
        let with_stm = sc.with_stm();
        let harvester = MatricesHarvester::new(&with_stm).unwrap();
        let phi = harvester.state_transition(&[0, 1, 2, 3, 4, 5], 1);
        assert_eq!(phi.nrows(), 7);
        // Identity right after enabling the STM, including the bias block
        for i in 0..7 {
            assert_abs_diff_eq!(phi[(i, i)], 1.0);
        }
    }
}
