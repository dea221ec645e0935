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

//! GNSS measurement combinations.
//!
//! Dual frequency combinations (ionosphere free, geometry free, wide lane,
//! narrow lane, Melbourne-Wübbena) and single frequency combinations
//! (GRAPHIC, code minus carrier). Inputs are ranges in meters, either from
//! pseudo-range (code) or carrier phase converted to meters; outputs follow
//! the input units.

use crate::cosmic::SPEED_OF_LIGHT;
use enum_iterator::Sequence;
use snafu::prelude::Snafu;
use std::fmt;

/// GPS carrier signals.
#[derive(Sequence, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Carrier {
    /// L1 @ 1575.42 MHz
    L1,
    /// L2 @ 1227.60 MHz
    L2,
    /// L5 @ 1176.45 MHz
    L5,
}

impl Carrier {
    /// Carrier frequency in Hz
    pub fn frequency_hz(&self) -> f64 {
        match self {
            Carrier::L1 => 1_575.42e6,
            Carrier::L2 => 1_227.60e6,
            Carrier::L5 => 1_176.45e6,
        }
    }

    /// Carrier wavelength in meters
    pub fn wavelength_m(&self) -> f64 {
        SPEED_OF_LIGHT / self.frequency_hz()
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The result of a measurement combination, keeping track of the carriers it
/// was formed from.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CombinedObservation {
    pub lhs: Carrier,
    pub rhs: Carrier,
    pub value: f64,
}

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GnssError {
    #[snafu(display("a dual frequency combination requires two distinct carriers, got {carrier} twice"))]
    SameCarrier { carrier: Carrier },
}

fn check_distinct(c1: Carrier, c2: Carrier) -> Result<(), GnssError> {
    if c1 == c2 {
        Err(GnssError::SameCarrier { carrier: c1 })
    } else {
        Ok(())
    }
}

/// Ionosphere free combination: cancels the first order ionospheric delay.
/// `(f1^2 v1 - f2^2 v2) / (f1^2 - f2^2)`
pub fn ionosphere_free(
    c1: Carrier,
    v1: f64,
    c2: Carrier,
    v2: f64,
) -> Result<CombinedObservation, GnssError> {
    check_distinct(c1, c2)?;
    let f1 = c1.frequency_hz();
    let f2 = c2.frequency_hz();
    let value = (f1.powi(2) * v1 - f2.powi(2) * v2) / (f1.powi(2) - f2.powi(2));
    Ok(CombinedObservation {
        lhs: c1,
        rhs: c2,
        value,
    })
}

/// Geometry free combination: cancels the geometric range, leaving the
/// dispersive (ionospheric) content and the ambiguities. `v1 - v2`
pub fn geometry_free(
    c1: Carrier,
    v1: f64,
    c2: Carrier,
    v2: f64,
) -> Result<CombinedObservation, GnssError> {
    check_distinct(c1, c2)?;
    Ok(CombinedObservation {
        lhs: c1,
        rhs: c2,
        value: v1 - v2,
    })
}

/// Wide lane combination: `(f1 v1 - f2 v2) / (f1 - f2)`
pub fn wide_lane(
    c1: Carrier,
    v1: f64,
    c2: Carrier,
    v2: f64,
) -> Result<CombinedObservation, GnssError> {
    check_distinct(c1, c2)?;
    let f1 = c1.frequency_hz();
    let f2 = c2.frequency_hz();
    Ok(CombinedObservation {
        lhs: c1,
        rhs: c2,
        value: (f1 * v1 - f2 * v2) / (f1 - f2),
    })
}

/// Narrow lane combination: `(f1 v1 + f2 v2) / (f1 + f2)`
pub fn narrow_lane(
    c1: Carrier,
    v1: f64,
    c2: Carrier,
    v2: f64,
) -> Result<CombinedObservation, GnssError> {
    check_distinct(c1, c2)?;
    let f1 = c1.frequency_hz();
    let f2 = c2.frequency_hz();
    Ok(CombinedObservation {
        lhs: c1,
        rhs: c2,
        value: (f1 * v1 + f2 * v2) / (f1 + f2),
    })
}

/// Melbourne-Wübbena combination: wide lane of the phases minus narrow lane
/// of the codes. Cancels geometry, clocks, troposphere and first order
/// ionosphere, leaving the wide lane ambiguity.
pub fn melbourne_wubbena(
    c1: Carrier,
    phase1: f64,
    code1: f64,
    c2: Carrier,
    phase2: f64,
    code2: f64,
) -> Result<CombinedObservation, GnssError> {
    let wl = wide_lane(c1, phase1, c2, phase2)?;
    let nl = narrow_lane(c1, code1, c2, code2)?;
    Ok(CombinedObservation {
        lhs: wl.lhs,
        rhs: wl.rhs,
        value: wl.value - nl.value,
    })
}

/// GRAPHIC single frequency combination: `(code + phase) / 2`, which cancels
/// the first order ionospheric delay on a single carrier.
pub fn graphic(carrier: Carrier, code: f64, phase: f64) -> CombinedObservation {
    CombinedObservation {
        lhs: carrier,
        rhs: carrier,
        value: 0.5 * (code + phase),
    }
}

/// Code minus carrier single frequency combination: `code - phase`, twice the
/// ionospheric delay plus the ambiguity, used for cycle slip monitoring.
pub fn code_minus_carrier(carrier: Carrier, code: f64, phase: f64) -> CombinedObservation {
    CombinedObservation {
        lhs: carrier,
        rhs: carrier,
        value: code - phase,
    }
}

#[cfg(test)]
mod ut_gnss {
    use super::*;
    use approx::assert_abs_diff_eq;
    use enum_iterator::all;
    use rstest::rstest;

    #[test]
    fn carrier_wavelengths() {
        // L1 wavelength is about 19 cm
        assert_abs_diff_eq!(Carrier::L1.wavelength_m(), 0.1903, epsilon = 1e-4);
        for carrier in all::<Carrier>() {
            assert!(carrier.wavelength_m() > 0.0);
        }
    }

    #[rstest]
    #[case(Carrier::L1, Carrier::L2)]
    #[case(Carrier::L1, Carrier::L5)]
    #[case(Carrier::L2, Carrier::L5)]
    fn iono_free_cancels_dispersive_delay(#[case] c1: Carrier, #[case] c2: Carrier) {
        // A dispersive delay scales with 1/f^2: it must vanish from the combination
        let geometric = 22_345_678.901;
        let iono_at_l1 = 4.2;
        let k = iono_at_l1 * Carrier::L1.frequency_hz().powi(2);
        let v1 = geometric + k / c1.frequency_hz().powi(2);
        let v2 = geometric + k / c2.frequency_hz().powi(2);
        let combined = ionosphere_free(c1, v1, c2, v2).unwrap();
        assert_abs_diff_eq!(combined.value, geometric, epsilon = 1e-6);
    }

    #[rstest]
    #[case(Carrier::L1, Carrier::L2)]
    #[case(Carrier::L1, Carrier::L5)]
    fn geometry_free_cancels_geometry(#[case] c1: Carrier, #[case] c2: Carrier) {
        let geometric = 21_987_654.321;
        let v1 = geometric + 3.1;
        let v2 = geometric + 5.8;
        let combined = geometry_free(c1, v1, c2, v2).unwrap();
        assert_abs_diff_eq!(combined.value, -2.7, epsilon = 1e-9);
    }

    #[test]
    fn same_carrier_rejected() {
        assert!(ionosphere_free(Carrier::L1, 1.0, Carrier::L1, 1.0).is_err());
        assert!(wide_lane(Carrier::L2, 1.0, Carrier::L2, 1.0).is_err());
    }

    #[test]
    fn mw_cancels_geometry_and_iono() {
        let geometric = 23_456_789.0;
        let iono = 3.7;
        // Phase advances, code delays
        let phase1 = geometric - iono;
        let code1 = geometric + iono;
        let k = iono * Carrier::L1.frequency_hz().powi(2);
        let iono2 = k / Carrier::L2.frequency_hz().powi(2);
        let phase2 = geometric - iono2;
        let code2 = geometric + iono2;
        let combined =
            melbourne_wubbena(Carrier::L1, phase1, code1, Carrier::L2, phase2, code2).unwrap();
        // No ambiguity in this synthetic data: the combination must be zero
        assert_abs_diff_eq!(combined.value, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn graphic_halves_iono() {
        let geometric = 20_000_000.0;
        let iono = 6.0;
        let combined = graphic(Carrier::L1, geometric + iono, geometric - iono);
        assert_abs_diff_eq!(combined.value, geometric, epsilon = 1e-9);
    }
}
