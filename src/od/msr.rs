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

use crate::linalg::DVector;
use crate::time::Epoch;
use crate::TimeTagged;
use std::fmt;

/// The kind of observable produced by a tracking device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MeasurementKind {
    /// One way range, in km
    Range,
    /// Range and range rate, in km and km/s
    RangeDoppler,
}

impl MeasurementKind {
    /// Dimension of the observation vector for this kind.
    pub fn dimension(&self) -> usize {
        match self {
            MeasurementKind::Range => 1,
            MeasurementKind::RangeDoppler => 2,
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MeasurementKind::Range => write!(f, "range"),
            MeasurementKind::RangeDoppler => write!(f, "range+doppler"),
        }
    }
}

/// An immutable observation: an epoch, an observed vector, the standard
/// deviations of its noise, and the name of the device which produced it.
///
/// Measurements must be handed to the estimation process in non decreasing
/// epoch order.
#[derive(Clone, Debug)]
pub struct Measurement {
    pub epoch: Epoch,
    pub observation: DVector<f64>,
    pub sigmas: DVector<f64>,
    pub device: String,
    pub kind: MeasurementKind,
}

impl Measurement {
    pub fn new(
        epoch: Epoch,
        observation: DVector<f64>,
        sigmas: DVector<f64>,
        device: impl ToString,
        kind: MeasurementKind,
    ) -> Self {
        Self {
            epoch,
            observation,
            sigmas,
            device: device.to_string(),
            kind,
        }
    }

    pub fn dimension(&self) -> usize {
        self.observation.len()
    }
}

impl TimeTagged for Measurement {
    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn set_epoch(&mut self, epoch: Epoch) {
        self.epoch = epoch;
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} from {} @ {}: {:?}",
            self.kind,
            self.dimension(),
            self.device,
            self.epoch,
            self.observation.iter().collect::<Vec<_>>()
        )
    }
}
