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

use super::PropagationError;
use crate::cosmic::{AstroError, Orbit};
use crate::linalg::Vector3;
use crate::time::Epoch;
use crate::utils::TimeSpanMap;

/// A time bounded, interpolated trajectory built from discrete orbit states.
///
/// Interpolation is cubic Hermite on each Cartesian component between the two
/// bracketing states, using their velocities as derivatives. Querying outside
/// the bounds is an error.
#[derive(Clone, Debug)]
pub struct BoundedEphemeris {
    states: Vec<Orbit>,
    pub start: Epoch,
    pub end: Epoch,
}

impl BoundedEphemeris {
    /// Creates a new bounded ephemeris from at least two states, all in the same frame.
    pub fn new(mut states: Vec<Orbit>) -> Result<Self, PropagationError> {
        if states.len() < 2 {
            return Err(PropagationError::TooFewStates {
                need: 2,
                got: states.len(),
            });
        }
        states.sort_by(|a, b| a.epoch.cmp(&b.epoch));
        let frame = states[0].frame;
        for state in &states {
            if state.frame != frame {
                return Err(PropagationError::PropAstro {
                    source: AstroError::FrameMismatch {
                        expected: frame,
                        got: state.frame,
                    },
                });
            }
        }
        let start = states[0].epoch;
        let end = states[states.len() - 1].epoch;
        Ok(Self { states, start, end })
    }

    /// Returns the interpolated orbit at the provided epoch.
    pub fn at(&self, epoch: Epoch) -> Result<Orbit, PropagationError> {
        if epoch < self.start || epoch > self.end {
            return Err(PropagationError::OutOfEphemBounds {
                req: epoch,
                start: self.start,
                end: self.end,
            });
        }
        // Index of the first state strictly after the requested epoch
        let idx = self.states.partition_point(|s| s.epoch <= epoch);
        if idx == 0 {
            return Ok(self.states[0]);
        }
        if idx == self.states.len() {
            return Ok(self.states[idx - 1]);
        }
        let s0 = &self.states[idx - 1];
        let s1 = &self.states[idx];
        if s0.epoch == epoch {
            return Ok(*s0);
        }

        let h = (s1.epoch - s0.epoch).to_seconds();
        let s = (epoch - s0.epoch).to_seconds() / h;

        let (pos, vel) = hermite(
            &s0.radius(),
            &s0.velocity(),
            &s1.radius(),
            &s1.velocity(),
            s,
            h,
        );
        Ok(Orbit::from_position_velocity(pos, vel, epoch, s0.frame))
    }

    /// Returns the number of states of this ephemeris.
    pub fn nb_states(&self) -> usize {
        self.states.len()
    }
}

/// Cubic Hermite interpolation of position (with velocity as the derivative),
/// at normalized abscissa `s` over an interval of `h` seconds.
fn hermite(
    p0: &Vector3<f64>,
    v0: &Vector3<f64>,
    p1: &Vector3<f64>,
    v1: &Vector3<f64>,
    s: f64,
    h: f64,
) -> (Vector3<f64>, Vector3<f64>) {
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    let pos = h00 * p0 + (h10 * h) * v0 + h01 * p1 + (h11 * h) * v1;

    let d00 = 6.0 * s2 - 6.0 * s;
    let d10 = 3.0 * s2 - 4.0 * s + 1.0;
    let d01 = -6.0 * s2 + 6.0 * s;
    let d11 = 3.0 * s2 - 2.0 * s;
    let vel = (d00 / h) * p0 + d10 * v0 + (d01 / h) * p1 + d11 * v1;

    (pos, vel)
}

/// An aggregation of several bounded ephemerides, looked up by epoch.
///
/// The segment covering a given epoch is the latest one starting at or before
/// it. Queries outside the global bounds, or in a gap not covered by the
/// selected segment, error out.
#[derive(Clone, Debug)]
pub struct AggregateEphemeris {
    segments: Vec<BoundedEphemeris>,
    index: TimeSpanMap<usize>,
    pub start: Epoch,
    pub end: Epoch,
}

impl AggregateEphemeris {
    pub fn new(mut segments: Vec<BoundedEphemeris>) -> Result<Self, PropagationError> {
        if segments.is_empty() {
            return Err(PropagationError::TooFewStates { need: 1, got: 0 });
        }
        segments.sort_by(|a, b| a.start.cmp(&b.start));
        let mut index = TimeSpanMap::new(0usize);
        for (i, segment) in segments.iter().enumerate().skip(1) {
            index.add_valid_after(i, segment.start);
        }
        let start = segments[0].start;
        let end = segments.iter().map(|s| s.end).max().unwrap_or(start);
        Ok(Self {
            segments,
            index,
            start,
            end,
        })
    }

    /// Returns the interpolated orbit at the provided epoch, from the segment covering it.
    pub fn at(&self, epoch: Epoch) -> Result<Orbit, PropagationError> {
        if epoch < self.start || epoch > self.end {
            return Err(PropagationError::OutOfEphemBounds {
                req: epoch,
                start: self.start,
                end: self.end,
            });
        }
        self.segments[*self.index.get(epoch)].at(epoch)
    }

    pub fn nb_segments(&self) -> usize {
        self.segments.len()
    }
}
