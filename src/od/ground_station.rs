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

use super::msr::{Measurement, MeasurementKind};
use super::params::ParameterDriver;
use crate::cosmic::Spacecraft;
use crate::linalg::{DMatrix, DVector, Vector3};
use crate::State;
use rand_distr::{Distribution, Normal};
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use typed_builder::TypedBuilder;

/// A ground station measuring range and range rate to a spacecraft.
///
/// The site position is given directly in the inertial frame of the estimated
/// orbit (frame transformations are out of scope), and the station is
/// considered static in that frame. An optional range bias driver makes the
/// bias an estimable measurement parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct GroundStation {
    pub name: String,
    pub x_km: f64,
    pub y_km: f64,
    pub z_km: f64,
    /// Range measurement white noise, one sigma, in km
    #[builder(default = 1e-3)]
    pub range_sigma_km: f64,
    /// Range rate measurement white noise, one sigma, in km/s
    #[builder(default = 1e-6)]
    pub doppler_sigma_km_s: f64,
    /// Optional estimable range bias
    #[builder(default)]
    pub range_bias: Option<ParameterDriver>,
}

impl GroundStation {
    /// Site position in the inertial frame, km
    pub fn site(&self) -> Vector3<f64> {
        Vector3::new(self.x_km, self.y_km, self.z_km)
    }

    fn range_km(&self, sc: &Spacecraft) -> f64 {
        (sc.radius() - self.site()).norm()
    }

    fn range_rate_km_s(&self, sc: &Spacecraft) -> f64 {
        let rho = sc.radius() - self.site();
        rho.dot(&sc.velocity()) / rho.norm()
    }

    /// Current range bias value, zero when no bias driver is configured.
    pub fn bias_km(&self) -> f64 {
        self.range_bias.as_ref().map(|d| d.value()).unwrap_or(0.0)
    }

    /// One sigma noise vector for the provided kind.
    pub fn sigmas(&self, kind: MeasurementKind) -> DVector<f64> {
        match kind {
            MeasurementKind::Range => DVector::from_vec(vec![self.range_sigma_km]),
            MeasurementKind::RangeDoppler => {
                DVector::from_vec(vec![self.range_sigma_km, self.doppler_sigma_km_s])
            }
        }
    }

    /// Theoretical (noise free) observation of the provided spacecraft,
    /// including the configured range bias.
    pub fn theoretical(&self, sc: &Spacecraft, kind: MeasurementKind) -> DVector<f64> {
        let biased_range = self.range_km(sc) + self.bias_km();
        match kind {
            MeasurementKind::Range => DVector::from_vec(vec![biased_range]),
            MeasurementKind::RangeDoppler => {
                DVector::from_vec(vec![biased_range, self.range_rate_km_s(sc)])
            }
        }
    }

    /// Measurement partials with respect to the Cartesian orbital state,
    /// of shape (dimension x 6).
    pub fn sensitivity(&self, sc: &Spacecraft, kind: MeasurementKind) -> DMatrix<f64> {
        let rho_vec = sc.radius() - self.site();
        let rho = rho_vec.norm();
        let v = sc.velocity();
        let rho_hat = rho_vec / rho;

        match kind {
            MeasurementKind::Range => {
                let mut h = DMatrix::zeros(1, 6);
                for j in 0..3 {
                    h[(0, j)] = rho_hat[j];
                }
                h
            }
            MeasurementKind::RangeDoppler => {
                let mut h = DMatrix::zeros(2, 6);
                let rho_dot = rho_vec.dot(&v) / rho;
                for j in 0..3 {
                    h[(0, j)] = rho_hat[j];
                    h[(1, j)] = v[j] / rho - rho_dot * rho_hat[j] / rho;
                    h[(1, j + 3)] = rho_hat[j];
                }
                h
            }
        }
    }

    /// Simulates a noisy observation of the provided spacecraft.
    pub fn measure<R: rand::Rng>(
        &self,
        sc: &Spacecraft,
        kind: MeasurementKind,
        rng: &mut R,
    ) -> Measurement {
        let sigmas = self.sigmas(kind);
        let mut observation = self.theoretical(sc, kind);
        for i in 0..observation.len() {
            if let Ok(normal) = Normal::new(0.0, sigmas[i]) {
                observation[i] += normal.sample(rng);
            }
        }
        Measurement::new(sc.epoch(), observation, sigmas, &self.name, kind)
    }

    /// Noise free observation of the provided spacecraft.
    pub fn measure_exact(&self, sc: &Spacecraft, kind: MeasurementKind) -> Measurement {
        Measurement::new(
            sc.epoch(),
            self.theoretical(sc, kind),
            self.sigmas(kind),
            &self.name,
            kind,
        )
    }
}

impl fmt::Display for GroundStation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} @ [{:.3}, {:.3}, {:.3}] km",
            self.name, self.x_km, self.y_km, self.z_km
        )
    }
}

#[cfg(test)]
mod ut_ground_station {
    use super::*;
    use crate::cosmic::{Frame, Orbit};
    use crate::time::Epoch;
    use approx::assert_abs_diff_eq;

    fn setup() -> (GroundStation, Spacecraft) {
        let epoch = Epoch::from_gregorian_tai_at_midnight(2021, 2, 3);
        let orbit = Orbit::keplerian(7200.0, 0.01, 30.0, 40.0, 50.0, 60.0, epoch, Frame::EME2000);
        let station = GroundStation::builder()
            .name("DSS-65".to_string())
            .x_km(4846.0)
            .y_km(-370.0)
            .z_km(4116.0)
            .build();
        (station, Spacecraft::from_orbit(orbit))
    }

    #[test]
    fn range_partials_against_finite_diff() {
        let (station, sc) = setup();
        let h = station.sensitivity(&sc, MeasurementKind::RangeDoppler);
        let nominal = station.theoretical(&sc, MeasurementKind::RangeDoppler);
        let delta = 1e-4;
        for j in 0..6 {
            let mut perturbed = sc;
            let mut vec = perturbed.orbit.to_vector();
            vec[j] += delta;
            perturbed.orbit.set(perturbed.orbit.epoch, &vec);
            let shifted = station.theoretical(&perturbed, MeasurementKind::RangeDoppler);
            for i in 0..2 {
                let fd = (shifted[i] - nominal[i]) / delta;
                assert_abs_diff_eq!(h[(i, j)], fd, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn bias_shifts_range() {
        let (mut station, sc) = setup();
        let unbiased = station.theoretical(&sc, MeasurementKind::Range)[0];
        let mut bias = ParameterDriver::new("DSS-65-range-bias", 0.0, 1e-3).unwrap();
        bias.set_value(0.5);
        station.range_bias = Some(bias);
        let biased = station.theoretical(&sc, MeasurementKind::Range)[0];
        assert_abs_diff_eq!(biased - unbiased, 0.5, epsilon = 1e-12);
    }
}
