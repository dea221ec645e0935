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

use super::{AstroError, Frame, State};
use crate::dynamics::DynamicsError;
use crate::linalg::{Matrix6, OVector, Vector3, Vector6, U42, U6};
use crate::time::{Duration, Epoch, Unit};
use crate::utils::between_0_2pi;
use std::f64::consts::PI;
use std::fmt;

/// Below this eccentricity, the orbit is considered circular for element computation.
const ECC_EPSILON: f64 = 1e-11;

/// An osculating orbit: Cartesian position and velocity at an epoch, in a given frame.
///
/// All distances are in kilometers, all velocities in kilometers per second,
/// and all angles in degrees on the public interface.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Orbit {
    pub x_km: f64,
    pub y_km: f64,
    pub z_km: f64,
    pub vx_km_s: f64,
    pub vy_km_s: f64,
    pub vz_km_s: f64,
    pub epoch: Epoch,
    pub frame: Frame,
    /// Optional 6x6 state transition matrix, set by STM-enabled propagation.
    pub stm: Option<Matrix6<f64>>,
}

impl Orbit {
    /// Creates a new Orbit from a position and velocity in the provided frame.
    pub fn cartesian(
        x_km: f64,
        y_km: f64,
        z_km: f64,
        vx_km_s: f64,
        vy_km_s: f64,
        vz_km_s: f64,
        epoch: Epoch,
        frame: Frame,
    ) -> Self {
        Self {
            x_km,
            y_km,
            z_km,
            vx_km_s,
            vy_km_s,
            vz_km_s,
            epoch,
            frame,
            stm: None,
        }
    }

    /// Creates a new Orbit from the provided position and velocity vectors.
    pub fn from_position_velocity(
        radius_km: Vector3<f64>,
        velocity_km_s: Vector3<f64>,
        epoch: Epoch,
        frame: Frame,
    ) -> Self {
        Self::cartesian(
            radius_km[0],
            radius_km[1],
            radius_km[2],
            velocity_km_s[0],
            velocity_km_s[1],
            velocity_km_s[2],
            epoch,
            frame,
        )
    }

    /// Creates a new Orbit from the provided Keplerian elements, angles in degrees.
    #[allow(clippy::too_many_arguments)]
    pub fn keplerian(
        sma_km: f64,
        ecc: f64,
        inc_deg: f64,
        raan_deg: f64,
        aop_deg: f64,
        ta_deg: f64,
        epoch: Epoch,
        frame: Frame,
    ) -> Self {
        let gm = frame.gm();
        let inc = inc_deg.to_radians();
        let raan = raan_deg.to_radians();
        let aop = aop_deg.to_radians();
        let ta = ta_deg.to_radians();

        let p = sma_km * (1.0 - ecc.powi(2));
        let (sin_ta, cos_ta) = ta.sin_cos();
        let radius = p / (1.0 + ecc * cos_ta);

        // Perifocal position and velocity
        let r_pqw = Vector3::new(radius * cos_ta, radius * sin_ta, 0.0);
        let v_pqw = Vector3::new(-(gm / p).sqrt() * sin_ta, (gm / p).sqrt() * (ecc + cos_ta), 0.0);

        // Rotate from perifocal to the inertial frame: R3(-raan) R1(-inc) R3(-aop)
        let dcm = crate::utils::r3(-raan) * crate::utils::r1(-inc) * crate::utils::r3(-aop);
        let r = dcm * r_pqw;
        let v = dcm * v_pqw;

        Self::from_position_velocity(r, v, epoch, frame)
    }

    /// Creates a new Orbit from Keplerian elements with a mean anomaly instead
    /// of a true anomaly, solving Kepler's equation. Requires an elliptical orbit.
    #[allow(clippy::too_many_arguments)]
    pub fn keplerian_mean_anomaly(
        sma_km: f64,
        ecc: f64,
        inc_deg: f64,
        raan_deg: f64,
        aop_deg: f64,
        ma_deg: f64,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<Self, AstroError> {
        if ecc >= 1.0 {
            return Err(AstroError::NotElliptical { ecc });
        }
        let ea = kepler_solve(ma_deg.to_radians(), ecc)?;
        let ta = 2.0 * (((1.0 + ecc) / (1.0 - ecc)).sqrt() * (ea / 2.0).tan()).atan();
        Ok(Self::keplerian(
            sma_km,
            ecc,
            inc_deg,
            raan_deg,
            aop_deg,
            ta.to_degrees(),
            epoch,
            frame,
        ))
    }

    /// Returns the radius vector in kilometers
    pub fn radius(&self) -> Vector3<f64> {
        Vector3::new(self.x_km, self.y_km, self.z_km)
    }

    /// Returns the velocity vector in kilometers per second
    pub fn velocity(&self) -> Vector3<f64> {
        Vector3::new(self.vx_km_s, self.vy_km_s, self.vz_km_s)
    }

    /// Returns the magnitude of the radius vector in kilometers
    pub fn rmag_km(&self) -> f64 {
        self.radius().norm()
    }

    /// Returns the magnitude of the velocity vector in kilometers per second
    pub fn vmag_km_s(&self) -> f64 {
        self.velocity().norm()
    }

    /// Returns the orbital momentum vector
    pub fn hvec(&self) -> Vector3<f64> {
        self.radius().cross(&self.velocity())
    }

    /// Returns the specific mechanical energy in km^2/s^2
    pub fn energy_km2_s2(&self) -> f64 {
        self.vmag_km_s().powi(2) / 2.0 - self.frame.gm() / self.rmag_km()
    }

    /// Returns the semi-major axis in kilometers
    pub fn sma_km(&self) -> f64 {
        -self.frame.gm() / (2.0 * self.energy_km2_s2())
    }

    /// Returns the eccentricity vector
    pub fn evec(&self) -> Vector3<f64> {
        let gm = self.frame.gm();
        let r = self.radius();
        let v = self.velocity();
        ((v.norm_squared() - gm / r.norm()) * r - r.dot(&v) * v) / gm
    }

    /// Returns the eccentricity
    pub fn ecc(&self) -> f64 {
        self.evec().norm()
    }

    /// Returns the inclination in degrees
    pub fn inc_deg(&self) -> f64 {
        let h = self.hvec();
        (h[2] / h.norm()).acos().to_degrees()
    }

    /// Returns the right ascension of the ascending node in degrees, between 0 and 360
    pub fn raan_deg(&self) -> f64 {
        let n = Vector3::z().cross(&self.hvec());
        if n.norm() < ECC_EPSILON {
            0.0
        } else {
            between_0_2pi(n[1].atan2(n[0])).to_degrees()
        }
    }

    /// Returns the argument of periapsis in degrees, between 0 and 360
    pub fn aop_deg(&self) -> f64 {
        let n = Vector3::z().cross(&self.hvec());
        let e = self.evec();
        if e.norm() < ECC_EPSILON {
            return 0.0;
        }
        if n.norm() < ECC_EPSILON {
            // Equatorial orbit: angle from the X axis to the eccentricity vector
            return between_0_2pi(e[1].atan2(e[0])).to_degrees();
        }
        let cos_aop = n.dot(&e) / (n.norm() * e.norm());
        let aop = cos_aop.clamp(-1.0, 1.0).acos();
        if e[2] < 0.0 {
            (2.0 * PI - aop).to_degrees()
        } else {
            aop.to_degrees()
        }
    }

    /// Returns the true anomaly in degrees, between 0 and 360
    pub fn ta_deg(&self) -> f64 {
        let e = self.evec();
        let r = self.radius();
        if e.norm() < ECC_EPSILON {
            // Circular orbit: use the argument of latitude from the node line
            let n = Vector3::z().cross(&self.hvec());
            let reference = if n.norm() < ECC_EPSILON { Vector3::x() } else { n };
            let cos_u = reference.dot(&r) / (reference.norm() * r.norm());
            let u = cos_u.clamp(-1.0, 1.0).acos();
            return if r[2] < 0.0 {
                (2.0 * PI - u).to_degrees()
            } else {
                u.to_degrees()
            };
        }
        let cos_ta = e.dot(&r) / (e.norm() * r.norm());
        let ta = cos_ta.clamp(-1.0, 1.0).acos();
        if r.dot(&self.velocity()) < 0.0 {
            (2.0 * PI - ta).to_degrees()
        } else {
            ta.to_degrees()
        }
    }

    /// Returns the eccentric anomaly in radians
    pub fn ea_rad(&self) -> Result<f64, AstroError> {
        let ecc = self.ecc();
        if ecc >= 1.0 {
            return Err(AstroError::ParamUndefined {
                param: "eccentric anomaly",
            });
        }
        let ta = self.ta_deg().to_radians();
        let ea = 2.0 * (((1.0 - ecc) / (1.0 + ecc)).sqrt() * (ta / 2.0).tan()).atan();
        Ok(between_0_2pi(ea))
    }

    /// Returns the mean anomaly in radians
    pub fn ma_rad(&self) -> Result<f64, AstroError> {
        let ea = self.ea_rad()?;
        Ok(between_0_2pi(ea - self.ecc() * ea.sin()))
    }

    /// Returns the orbital period
    pub fn period(&self) -> Result<Duration, AstroError> {
        let sma = self.sma_km();
        if sma <= 0.0 {
            return Err(AstroError::ParamUndefined { param: "period" });
        }
        Ok(2.0 * PI * (sma.powi(3) / self.frame.gm()).sqrt() * Unit::Second)
    }

    /// Two-body analytical propagation: returns this orbit shifted in time by the
    /// provided duration (which may be negative), keeping the osculating elements
    /// constant and advancing the anomaly only. Requires an elliptical orbit.
    pub fn shifted_by(&self, duration: Duration) -> Result<Self, AstroError> {
        let ecc = self.ecc();
        if ecc >= 1.0 {
            return Err(AstroError::NotElliptical { ecc });
        }
        let sma = self.sma_km();
        let n = (self.frame.gm() / sma.powi(3)).sqrt();
        let m1 = between_0_2pi(self.ma_rad()? + n * duration.to_seconds());
        let ea1 = kepler_solve(m1, ecc)?;
        let ta1 = 2.0 * (((1.0 + ecc) / (1.0 - ecc)).sqrt() * (ea1 / 2.0).tan()).atan();
        let mut shifted = Self::keplerian(
            sma,
            ecc,
            self.inc_deg(),
            self.raan_deg(),
            self.aop_deg(),
            ta1.to_degrees(),
            self.epoch + duration,
            self.frame,
        );
        shifted.stm = self.stm;
        Ok(shifted)
    }

    /// Returns this orbit analytically propagated to the provided epoch (two-body).
    pub fn at_epoch(&self, epoch: Epoch) -> Result<Self, AstroError> {
        self.shifted_by(epoch - self.epoch)
    }

    /// Enables the computation of the 6x6 state transition matrix, resetting it to identity.
    pub fn with_stm(mut self) -> Self {
        self.stm = Some(Matrix6::identity());
        self
    }
}

/// Solves Kepler's equation M = E - e sin E for E, by Newton-Raphson.
fn kepler_solve(mean_anomaly_rad: f64, ecc: f64) -> Result<f64, AstroError> {
    let max_iter = 50;
    let mut ea = if ecc < 0.8 { mean_anomaly_rad } else { PI };
    for _ in 0..max_iter {
        let f = ea - ecc * ea.sin() - mean_anomaly_rad;
        let f_prime = 1.0 - ecc * ea.cos();
        let delta = f / f_prime;
        ea -= delta;
        if delta.abs() < 1e-13 {
            return Ok(ea);
        }
    }
    Err(AstroError::KeplerNotConverged {
        iterations: max_iter,
    })
}

impl State for Orbit {
    type Size = U6;
    type VecLength = U42;

    fn to_vector(&self) -> OVector<f64, U42> {
        let mut as_vec = OVector::<f64, U42>::zeros();
        as_vec[0] = self.x_km;
        as_vec[1] = self.y_km;
        as_vec[2] = self.z_km;
        as_vec[3] = self.vx_km_s;
        as_vec[4] = self.vy_km_s;
        as_vec[5] = self.vz_km_s;
        if let Some(stm) = self.stm {
            for i in 0..6 {
                for j in 0..6 {
                    as_vec[6 + i * 6 + j] = stm[(i, j)];
                }
            }
        }
        as_vec
    }

    fn set(&mut self, epoch: Epoch, vector: &OVector<f64, U42>) {
        self.epoch = epoch;
        self.x_km = vector[0];
        self.y_km = vector[1];
        self.z_km = vector[2];
        self.vx_km_s = vector[3];
        self.vy_km_s = vector[4];
        self.vz_km_s = vector[5];
        if let Some(stm) = self.stm.as_mut() {
            for i in 0..6 {
                for j in 0..6 {
                    stm[(i, j)] = vector[6 + i * 6 + j];
                }
            }
        }
    }

    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn set_epoch(&mut self, epoch: Epoch) {
        self.epoch = epoch;
    }

    fn stm(&self) -> Result<Matrix6<f64>, DynamicsError> {
        self.stm.ok_or(DynamicsError::StateTransitionMatrixUnset)
    }

    fn reset_stm(&mut self) {
        self.stm = Some(Matrix6::identity());
    }

    fn add(mut self, other: Vector6<f64>) -> Self {
        self.x_km += other[0];
        self.y_km += other[1];
        self.z_km += other[2];
        self.vx_km_s += other[3];
        self.vy_km_s += other[4];
        self.vz_km_s += other[5];
        self
    }
}

impl Default for Orbit {
    fn default() -> Self {
        Self::cartesian(
            0.0,
            0.0,
            0.0,
            0.0,
            0.0,
            0.0,
            Epoch::from_gregorian_tai(2000, 1, 1, 12, 0, 0, 0),
            Frame::EME2000,
        )
    }
}

impl fmt::Display for Orbit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}] {}\tposition = [{:.6}, {:.6}, {:.6}] km\tvelocity = [{:.6}, {:.6}, {:.6}] km/s",
            self.frame,
            self.epoch,
            self.x_km,
            self.y_km,
            self.z_km,
            self.vx_km_s,
            self.vy_km_s,
            self.vz_km_s
        )
    }
}

#[cfg(test)]
mod ut_orbit {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn leo() -> Orbit {
        let epoch = Epoch::from_gregorian_tai_at_midnight(2021, 3, 4);
        Orbit::keplerian(7000.0, 0.01, 30.0, 80.0, 40.0, 0.0, epoch, Frame::EME2000)
    }

    #[test]
    fn keplerian_roundtrip() {
        let orbit = leo();
        assert_abs_diff_eq!(orbit.sma_km(), 7000.0, epsilon = 1e-8);
        assert_abs_diff_eq!(orbit.ecc(), 0.01, epsilon = 1e-10);
        assert_abs_diff_eq!(orbit.inc_deg(), 30.0, epsilon = 1e-9);
        assert_abs_diff_eq!(orbit.raan_deg(), 80.0, epsilon = 1e-9);
        assert_abs_diff_eq!(orbit.aop_deg(), 40.0, epsilon = 1e-7);
        let ta = orbit.ta_deg();
        assert!(ta.min(360.0 - ta) < 1e-6, "true anomaly {ta} deg");
    }

    #[test]
    fn shift_one_period() {
        let orbit = leo();
        let period = orbit.period().unwrap();
        let shifted = orbit.shifted_by(period).unwrap();
        assert_abs_diff_eq!(shifted.x_km, orbit.x_km, epsilon = 1e-6);
        assert_abs_diff_eq!(shifted.y_km, orbit.y_km, epsilon = 1e-6);
        assert_abs_diff_eq!(shifted.z_km, orbit.z_km, epsilon = 1e-6);
        assert_eq!(shifted.epoch, orbit.epoch + period);
    }

    #[test]
    fn shift_forward_then_back() {
        let orbit = leo();
        let there = orbit.shifted_by(17 * Unit::Minute).unwrap();
        let back = there.shifted_by(-17 * Unit::Minute).unwrap();
        assert_abs_diff_eq!(back.x_km, orbit.x_km, epsilon = 1e-6);
        assert_abs_diff_eq!(back.vz_km_s, orbit.vz_km_s, epsilon = 1e-9);
    }

    #[test]
    fn hyperbolic_shift_rejected() {
        let epoch = Epoch::from_gregorian_tai_at_midnight(2021, 3, 4);
        let orbit = Orbit::cartesian(7000.0, 0.0, 0.0, 0.0, 15.0, 0.0, epoch, Frame::EME2000);
        assert!(orbit.shifted_by(1 * Unit::Minute).is_err());
    }
}
