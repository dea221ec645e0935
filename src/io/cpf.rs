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
use crate::cosmic::{Frame, Orbit};
use crate::linalg::Vector3;
use crate::propagators::{BoundedEphemeris, PropagationError};
use crate::time::{Epoch, Unit};

/// A satellite laser ranging consolidated prediction file: a target name and
/// time-stamped position records.
///
/// Only the "10" (position) records and the minimal header are read; drag and
/// transponder records are skipped.
#[derive(Clone, Debug, PartialEq)]
pub struct CpfEphemeris {
    pub target_name: String,
    /// Position records in km, time ordered
    pub records: Vec<(Epoch, Vector3<f64>)>,
}

impl CpfEphemeris {
    /// Parses the provided CPF content.
    pub fn parse(text: &str) -> Result<Self, InputOutputError> {
        let mut target_name = String::from("UNKNOWN");
        let mut records = Vec::new();

        for (lineno, line) in text.lines().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.first() {
                Some(&"H1") => {
                    // The target name is the last field of the H1 header
                    if let Some(name) = fields.last() {
                        target_name = name.to_string();
                    }
                }
                Some(&"10") => {
                    // 10 flag mjd sec_of_day leap x y z  (positions in meters)
                    if fields.len() < 8 {
                        return Err(InputOutputError::ParsingError {
                            line: lineno + 1,
                            details: format!("position record has {} fields", fields.len()),
                        });
                    }
                    let parse = |idx: usize| -> Result<f64, InputOutputError> {
                        fields[idx].parse::<f64>().map_err(|_| {
                            InputOutputError::ParsingError {
                                line: lineno + 1,
                                details: format!("not a number: {}", fields[idx]),
                            }
                        })
                    };
                    let mjd = parse(2)?;
                    let sec_of_day = parse(3)?;
                    let epoch = Epoch::from_mjd_utc(mjd) + sec_of_day * Unit::Second;
                    let position_km =
                        Vector3::new(parse(5)? / 1e3, parse(6)? / 1e3, parse(7)? / 1e3);
                    records.push((epoch, position_km));
                }
                _ => {}
            }
        }

        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Self {
            target_name,
            records,
        })
    }

    /// Builds a bounded ephemeris from the position records, deriving the
    /// velocities from central finite differences (one sided at the ends).
    pub fn to_ephemeris(&self, frame: Frame) -> Result<BoundedEphemeris, PropagationError> {
        let n = self.records.len();
        if n < 2 {
            return Err(PropagationError::TooFewStates { need: 2, got: n });
        }
        let mut states = Vec::with_capacity(n);
        for i in 0..n {
            let (epoch, pos) = self.records[i];
            let (lo, hi) = if i == 0 {
                (i, i + 1)
            } else if i == n - 1 {
                (i - 1, i)
            } else {
                (i - 1, i + 1)
            };
            let dt = (self.records[hi].0 - self.records[lo].0).to_seconds();
            let vel = (self.records[hi].1 - self.records[lo].1) / dt;
            states.push(Orbit::from_position_velocity(pos, vel, epoch, frame));
        }
        BoundedEphemeris::new(states)
    }
}

#[cfg(test)]
mod ut_cpf {
    use super::*;
    use approx::assert_abs_diff_eq;

    const CPF_SAMPLE: &str = "\
H1 CPF  1  ASI 2021  6  3 10  6121 lageos1
H2  7603901 1155 8820  2021  6  3  0  0  0 2021  6  4  0  0  0  300 1 1 0 0 0
10 0 59368      0.00000  0   5846463.469   7658623.303   3027053.212
10 0 59368    300.00000  0   4834834.273   8094482.364   3908162.178
10 0 59368    600.00000  0   3729835.049   8381868.063   4716858.254
99
";

    #[test]
    fn parses_position_records() {
        let cpf = CpfEphemeris::parse(CPF_SAMPLE).unwrap();
        assert_eq!(cpf.target_name, "lageos1");
        assert_eq!(cpf.records.len(), 3);
        // Positions converted from meters to km
        assert_abs_diff_eq!(cpf.records[0].1[0], 5846.463469, epsilon = 1e-9);
        // 300 s between records
        assert_abs_diff_eq!(
            (cpf.records[1].0 - cpf.records[0].0).to_seconds(),
            300.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn ephemeris_brackets_the_records() {
        let cpf = CpfEphemeris::parse(CPF_SAMPLE).unwrap();
        let ephem = cpf.to_ephemeris(Frame::EME2000).unwrap();
        let mid = cpf.records[0].0 + 150 * Unit::Second;
        let orbit = ephem.at(mid).unwrap();
        // The interpolated position stays between the bracketing records
        assert!(orbit.x_km < cpf.records[0].1[0]);
        assert!(orbit.x_km > cpf.records[1].1[0]);
    }

    #[test]
    fn truncated_record_errors() {
        let broken = "10 0 59368 0.0 0 1.0 2.0\n";
        assert!(CpfEphemeris::parse(broken).is_err());
    }
}
