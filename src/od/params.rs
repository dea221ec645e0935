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

use super::ODError;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// A single estimation parameter: a named value with a normalization scale,
/// optional bounds, and a selection flag deciding whether the filter estimates
/// it or keeps it fixed.
///
/// The normalized value is `(value - reference) / scale`; all filter internals
/// work on normalized values so that the covariance stays well conditioned
/// regardless of the physical magnitudes involved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterDriver {
    pub name: String,
    reference: f64,
    value: f64,
    pub scale: f64,
    pub selected: bool,
    pub min_value: f64,
    pub max_value: f64,
}

impl ParameterDriver {
    /// Creates a new, unselected driver. The scale must be non zero.
    pub fn new(name: impl ToString, reference: f64, scale: f64) -> Result<Self, ODError> {
        let name = name.to_string();
        if scale == 0.0 || !scale.is_finite() {
            return Err(ODError::InvalidScale { name, scale });
        }
        Ok(Self {
            name,
            reference,
            value: reference,
            scale,
            selected: false,
            min_value: f64::NEG_INFINITY,
            max_value: f64::INFINITY,
        })
    }

    /// Sets the bounds of this driver.
    pub fn with_bounds(mut self, min_value: f64, max_value: f64) -> Self {
        self.min_value = min_value;
        self.max_value = max_value;
        self.value = self.value.clamp(min_value, max_value);
        self
    }

    /// Marks this driver as estimated.
    pub fn select(mut self) -> Self {
        self.selected = true;
        self
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn reference(&self) -> f64 {
        self.reference
    }

    /// Sets the physical value, clamped to the bounds.
    pub fn set_value(&mut self, value: f64) {
        let clamped = value.clamp(self.min_value, self.max_value);
        if clamped != value {
            warn!(
                "{}: value {value} clamped to [{}; {}]",
                self.name, self.min_value, self.max_value
            );
        }
        self.value = clamped;
    }

    /// Adds a physical delta to the current value.
    pub fn apply_delta(&mut self, delta: f64) {
        self.set_value(self.value + delta);
    }

    pub fn normalized_value(&self) -> f64 {
        (self.value - self.reference) / self.scale
    }

    pub fn set_normalized_value(&mut self, normalized: f64) {
        self.set_value(self.reference + self.scale * normalized);
    }
}

impl fmt::Display for ParameterDriver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} = {:.6e} (scale {:.1e}{})",
            self.name,
            self.value,
            self.scale,
            if self.selected { ", estimated" } else { "" }
        )
    }
}

/// An ordered collection of parameter drivers with unique names.
///
/// The ordering of the drivers is the ordering of the estimation state vector
/// and is fixed for the life of a filter run.
#[derive(Clone, Debug, Default)]
pub struct ParameterList {
    drivers: Vec<ParameterDriver>,
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a driver, rejecting duplicated names.
    pub fn push(&mut self, driver: ParameterDriver) -> Result<(), ODError> {
        if self.drivers.iter().any(|d| d.name == driver.name) {
            return Err(ODError::DuplicateParameter { name: driver.name });
        }
        self.drivers.push(driver);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub fn nb_selected(&self) -> usize {
        self.drivers.iter().filter(|d| d.selected).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterDriver> {
        self.drivers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ParameterDriver> {
        self.drivers.iter_mut()
    }

    pub fn iter_selected(&self) -> impl Iterator<Item = &ParameterDriver> {
        self.drivers.iter().filter(|d| d.selected)
    }

    pub fn get(&self, name: &str) -> Result<&ParameterDriver, ODError> {
        self.drivers
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ODError::UnknownParameter {
                name: name.to_string(),
            })
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut ParameterDriver, ODError> {
        self.drivers
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| ODError::UnknownParameter {
                name: name.to_string(),
            })
    }
}
