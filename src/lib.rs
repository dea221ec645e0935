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

/*! # asteria

Spaceflight dynamics for mission analysis and navigation: numerical orbit
propagation with event detection, attitude laws and event-driven attitude
sequencing, force models, and a sequential (extended) Kalman filter for orbit
determination. Ancillary modules provide GNSS measurement combinations and
parsing of CCSDS OPM/OMM and CPF files into typed records.

Coordinate frame transformations and ephemeris loading are out of scope:
frames, dates, and vectors are plain value types which the caller is expected
to provide in a consistent frame.
*/

/// Provides all the propagators / integrators, event detection, and bounded ephemerides.
pub mod propagators;

/// Provides orbital and spacecraft dynamics and the force models that plug into them.
pub mod dynamics;

/// Provides the foundational astrodynamics types: frames, orbits, spacecraft, and the `State` trait.
pub mod cosmic;

/// Provides attitude representation, attitude laws, and the event-driven attitude sequence.
pub mod attitude;

/// All the orbit determination tools: parameter drivers, measurements, and the sequential Kalman process.
pub mod od;

/// GNSS dual- and single-frequency measurement combinations.
pub mod gnss;

/// Input/output: CCSDS OPM/OMM and CPF parsing into typed records, YAML configuration loading.
pub mod io;

/// Utility functions shared by different modules.
pub mod utils;

mod errors;
pub use self::errors::{AsteriaError, EventError};

#[macro_use]
extern crate log;
extern crate hifitime;
extern crate nalgebra as na;

/// Re-export of hifitime
pub mod time {
    pub use hifitime::*;
}

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

/// Re-export some useful things
pub use self::cosmic::{Frame, Orbit, Spacecraft, State, TimeTagged};
