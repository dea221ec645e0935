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

use super::InputOutputError;
use crate::time::Epoch;
use std::str::FromStr;

/// A single `KEY = value [unit]` entry of a CCSDS key/value notation file.
///
/// The unit, when present between square brackets after the value, is kept as
/// informative text and stripped from the value itself. Blank lines and
/// COMMENT lines parse to None.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    pub unit: Option<String>,
}

impl KeyValue {
    /// Parses one line of KVN. Returns None for blank lines and comments.
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("COMMENT") {
            return None;
        }
        let (key, rest) = trimmed.split_once('=')?;
        let key = key.trim().to_string();
        if key.is_empty() {
            return None;
        }
        let mut value = rest.trim();
        let mut unit = None;
        if value.ends_with(']') {
            if let Some(open) = value.rfind('[') {
                unit = Some(value[open + 1..value.len() - 1].trim().to_string());
                value = value[..open].trim();
            }
        }
        Some(Self {
            key,
            value: value.to_string(),
            unit,
        })
    }

    /// The value as a float.
    pub fn as_f64(&self) -> Result<f64, InputOutputError> {
        self.value
            .parse::<f64>()
            .map_err(|_| InputOutputError::InvalidValue {
                key: self.key.clone(),
                value: self.value.clone(),
            })
    }

    /// The value as an epoch. CCSDS calendar epochs without an explicit time
    /// system are read in the time system declared by the message, which this
    /// low level parser does not track: they default to UTC.
    pub fn as_epoch(&self) -> Result<Epoch, InputOutputError> {
        if let Ok(epoch) = Epoch::from_str(&self.value) {
            return Ok(epoch);
        }
        Epoch::from_str(&format!("{} UTC", self.value)).map_err(|e| {
            InputOutputError::EpochParsing {
                details: format!("{}: {e}", self.value),
            }
        })
    }
}

#[cfg(test)]
mod ut_kvn {
    use super::*;

    #[test]
    fn parses_plain_pairs() {
        let kv = KeyValue::parse("OBJECT_NAME = ASTERIA-SAT").unwrap();
        assert_eq!(kv.key, "OBJECT_NAME");
        assert_eq!(kv.value, "ASTERIA-SAT");
        assert!(kv.unit.is_none());
    }

    #[test]
    fn strips_units() {
        let kv = KeyValue::parse("X = -2099.29 [km]").unwrap();
        assert_eq!(kv.key, "X");
        assert_eq!(kv.value, "-2099.29");
        assert_eq!(kv.unit.as_deref(), Some("km"));
        assert_eq!(kv.as_f64().unwrap(), -2099.29);
    }

    #[test]
    fn skips_comments_and_blanks() {
        assert!(KeyValue::parse("COMMENT generated by test").is_none());
        assert!(KeyValue::parse("   ").is_none());
        assert!(KeyValue::parse("no equal sign here").is_none());
    }

    #[test]
    fn epoch_without_time_system() {
        let kv = KeyValue::parse("EPOCH = 2021-06-03T05:33:00").unwrap();
        let epoch = kv.as_epoch().unwrap();
        let (y, m, d, h, _, _, _) = epoch.to_gregorian_utc();
        assert_eq!((y, m, d, h), (2021, 6, 3, 5));
    }

    #[test]
    fn bad_float_reports_key() {
        let kv = KeyValue::parse("X = twelve").unwrap();
        assert!(matches!(
            kv.as_f64(),
            Err(InputOutputError::InvalidValue { .. })
        ));
    }
}
