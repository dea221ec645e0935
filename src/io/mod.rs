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

//! Parsing of CCSDS OPM/OMM and ILRS CPF files into typed records, and YAML
//! configuration loading.
//!
//! Only the key/value subset needed to build typed records is handled; the
//! full CCSDS grammar (XML representations, covariance sections, all
//! optional blocks) is out of scope.

use crate::od::GroundStation;
use serde::de::DeserializeOwned;
use serde::Serialize;
use snafu::prelude::*;
use std::fs;
use std::path::Path;

/// Key = Value [unit] tokenizer.
pub mod kvn;
pub use kvn::KeyValue;

/// CCSDS orbit parameter and orbit mean-elements messages.
pub mod ndm;
pub use ndm::{OmmRecord, OpmManeuver, OpmRecord};

/// ILRS consolidated prediction format ephemerides.
pub mod cpf;
pub use cpf::CpfEphemeris;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InputOutputError {
    #[snafu(display("I/O error while {action}: {source}"))]
    StdIo {
        action: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("parse error on line {line}: {details}"))]
    ParsingError { line: usize, details: String },
    #[snafu(display("missing mandatory key {key} in {kind}"))]
    MissingKey {
        key: &'static str,
        kind: &'static str,
    },
    #[snafu(display("invalid value for {key}: {value}"))]
    InvalidValue { key: String, value: String },
    #[snafu(display("could not parse epoch: {details}"))]
    EpochParsing { details: String },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("failed to read configuration {path}: {source}"))]
    ReadError {
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to parse YAML configuration: {source}"))]
    YamlError { source: serde_yaml::Error },
}

/// Configuration in YAML files: any serde type gains file loading.
pub trait ConfigRepr: Serialize + DeserializeOwned {
    /// Builds this configuration from the YAML file at the provided path.
    fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let contents = fs::read_to_string(path).context(ReadSnafu { path: path_str })?;
        serde_yaml::from_str(&contents).context(YamlSnafu)
    }

    /// Builds a list of configurations from the YAML file at the provided path.
    fn load_many<P: AsRef<Path>>(path: P) -> Result<Vec<Self>, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let contents = fs::read_to_string(path).context(ReadSnafu { path: path_str })?;
        serde_yaml::from_str(&contents).context(YamlSnafu)
    }
}

impl ConfigRepr for GroundStation {}

#[cfg(test)]
mod ut_config {
    use super::*;

    #[test]
    fn ground_stations_from_yaml() {
        let yaml = r#"
- name: DSS-13
  x_km: -2351.112
  y_km: -4655.53
  z_km: 3660.912
  range_sigma_km: 0.001
  doppler_sigma_km_s: 0.000001
  range_bias: null
- name: DSS-65
  x_km: 4846.097
  y_km: -370.196
  z_km: 4116.888
  range_sigma_km: 0.002
  doppler_sigma_km_s: 0.000002
  range_bias:
    name: DSS-65-range-bias
    reference: 0.0
    value: 0.0
    scale: 0.001
    selected: true
    min_value: -1.0
    max_value: 1.0
"#;
        let stations: Vec<GroundStation> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].name, "DSS-13");
        assert!(stations[0].range_bias.is_none());
        let bias = stations[1].range_bias.as_ref().unwrap();
        assert!(bias.selected);
        assert_eq!(bias.scale, 0.001);
    }
}
