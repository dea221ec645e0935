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

use crate::time::Epoch;

/// An ordered map of non overlapping time spans to values.
///
/// The map always covers the whole time line: it starts with a single value
/// valid for all times, and each insertion splits or truncates the existing
/// spans so that exactly one value is active at any instant. A span is half
/// open: the value introduced at a transition epoch is the active one at that
/// exact epoch.
#[derive(Clone, Debug)]
pub struct TimeSpanMap<T: Clone> {
    /// Active values, one more than there are transitions
    values: Vec<T>,
    /// Transition epochs, sorted in strictly increasing order
    transitions: Vec<Epoch>,
}

impl<T: Clone> TimeSpanMap<T> {
    /// Creates a new map where `init` is valid for all times.
    pub fn new(init: T) -> Self {
        Self {
            values: vec![init],
            transitions: Vec::new(),
        }
    }

    /// Returns the number of spans of this map (one more than the number of transitions).
    pub fn spans(&self) -> usize {
        self.values.len()
    }

    /// Returns the value active at the provided epoch.
    pub fn get(&self, epoch: Epoch) -> &T {
        let idx = self.transitions.partition_point(|t| *t <= epoch);
        &self.values[idx]
    }

    /// Returns the transition epochs of this map, in increasing order.
    pub fn transitions(&self) -> &[Epoch] {
        &self.transitions
    }

    /// Makes `value` valid on [epoch; +inf), dropping any span starting at or
    /// after `epoch` and truncating the span which contains it.
    pub fn add_valid_after(&mut self, value: T, epoch: Epoch) {
        let idx = self.transitions.partition_point(|t| *t < epoch);
        self.transitions.truncate(idx);
        self.values.truncate(idx + 1);
        self.transitions.push(epoch);
        self.values.push(value);
    }

    /// Makes `value` valid on (-inf; epoch), dropping any span ending at or
    /// before `epoch` and truncating the span which contains it.
    pub fn add_valid_before(&mut self, value: T, epoch: Epoch) {
        let idx = self.transitions.partition_point(|t| *t <= epoch);
        let mut transitions = Vec::with_capacity(self.transitions.len() - idx + 1);
        transitions.push(epoch);
        transitions.extend_from_slice(&self.transitions[idx..]);
        let mut values = Vec::with_capacity(self.values.len() - idx + 1);
        values.push(value);
        values.extend_from_slice(&self.values[idx..]);
        self.transitions = transitions;
        self.values = values;
    }

    /// Returns a copy of this map where all the transitions at or after `end`
    /// are dropped, the last remaining span extending to +inf.
    pub fn extract_until(&self, end: Epoch) -> Self {
        let hi = self.transitions.partition_point(|t| *t < end);
        Self {
            values: self.values[..=hi].to_vec(),
            transitions: self.transitions[..hi].to_vec(),
        }
    }

    /// Returns a copy of this map where all the transitions at or before
    /// `start` are dropped, the first remaining span extending to -inf.
    pub fn extract_from(&self, start: Epoch) -> Self {
        let lo = self.transitions.partition_point(|t| *t <= start);
        Self {
            values: self.values[lo..].to_vec(),
            transitions: self.transitions[lo..].to_vec(),
        }
    }
}

#[cfg(test)]
mod ut_timespan {
    use super::*;
    use crate::time::Unit;

    fn epoch(shift_s: i64) -> Epoch {
        Epoch::from_gregorian_tai_at_midnight(2020, 1, 1) + shift_s * Unit::Second
    }

    #[test]
    fn single_value_everywhere() {
        let map = TimeSpanMap::new("only");
        assert_eq!(map.spans(), 1);
        assert_eq!(*map.get(epoch(-1_000_000)), "only");
        assert_eq!(*map.get(epoch(1_000_000)), "only");
    }

    #[test]
    fn add_after_truncates_overlap() {
        let mut map = TimeSpanMap::new("a");
        map.add_valid_after("b", epoch(100));
        map.add_valid_after("c", epoch(200));
        assert_eq!(map.spans(), 3);
        assert_eq!(*map.get(epoch(50)), "a");
        assert_eq!(*map.get(epoch(100)), "b");
        assert_eq!(*map.get(epoch(150)), "b");
        assert_eq!(*map.get(epoch(250)), "c");
        // Inserting before an existing transition drops it
        map.add_valid_after("d", epoch(150));
        assert_eq!(map.spans(), 3);
        assert_eq!(*map.get(epoch(150)), "d");
        assert_eq!(*map.get(epoch(10_000)), "d");
    }

    #[test]
    fn add_before_truncates_overlap() {
        let mut map = TimeSpanMap::new("a");
        map.add_valid_before("z", epoch(100));
        assert_eq!(map.spans(), 2);
        assert_eq!(*map.get(epoch(99)), "z");
        assert_eq!(*map.get(epoch(100)), "a");
        map.add_valid_before("y", epoch(50));
        assert_eq!(*map.get(epoch(0)), "y");
        assert_eq!(*map.get(epoch(75)), "z");
    }

    #[test]
    fn exactly_one_value_at_any_instant() {
        let mut map = TimeSpanMap::new(0);
        map.add_valid_after(1, epoch(10));
        map.add_valid_after(2, epoch(20));
        map.add_valid_before(-1, epoch(5));
        for s in -20..40 {
            // get() always resolves to exactly one value by construction;
            // spot check the boundaries
            let v = *map.get(epoch(s));
            if s < 5 {
                assert_eq!(v, -1);
            } else if s < 10 {
                assert_eq!(v, 0);
            } else if s < 20 {
                assert_eq!(v, 1);
            } else {
                assert_eq!(v, 2);
            }
        }
    }

    #[test]
    fn extraction() {
        let mut map = TimeSpanMap::new("a");
        map.add_valid_after("b", epoch(100));
        map.add_valid_after("c", epoch(200));
        let fwd = map.extract_until(epoch(150));
        assert_eq!(fwd.spans(), 2);
        assert_eq!(*fwd.get(epoch(1_000)), "b");
        let bwd = map.extract_from(epoch(150));
        assert_eq!(bwd.spans(), 2);
        assert_eq!(*bwd.get(epoch(-1_000)), "b");
        assert_eq!(*bwd.get(epoch(250)), "c");
    }
}
