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

use crate::cosmic::{AstroError, Frame, Orbit, Spacecraft};
use crate::linalg::{Matrix3, Vector3};
use crate::time::{Duration, Epoch};
use crate::utils::tilde_matrix;
use nalgebra::UnitQuaternion;
use snafu::Snafu;
use std::fmt;

mod laws;
pub use laws::*;

mod sequence;
pub use sequence::*;

/// Which angular derivatives must match when interpolating between two attitudes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AngularDerivativesFilter {
    /// Match the rotation only
    UseR,
    /// Match the rotation and the rotation rate
    UseRR,
    /// Match the rotation, the rotation rate and the rotation acceleration
    UseRRA,
}

/// A time-stamped spacecraft orientation with its angular derivatives.
///
/// `orientation` rotates body frame vectors into the reference frame. The
/// rate and acceleration are expressed in the body frame, in rad/s and
/// rad/s^2.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Attitude {
    pub epoch: Epoch,
    pub frame: Frame,
    pub orientation: UnitQuaternion<f64>,
    pub rate_rad_s: Vector3<f64>,
    pub accel_rad_s2: Vector3<f64>,
}

impl Attitude {
    pub fn new(
        epoch: Epoch,
        frame: Frame,
        orientation: UnitQuaternion<f64>,
        rate_rad_s: Vector3<f64>,
    ) -> Self {
        Self {
            epoch,
            frame,
            orientation,
            rate_rad_s,
            accel_rad_s2: Vector3::zeros(),
        }
    }

    pub fn with_accel(mut self, accel_rad_s2: Vector3<f64>) -> Self {
        self.accel_rad_s2 = accel_rad_s2;
        self
    }

    /// Interpolates between two attitudes at the provided epoch.
    ///
    /// The interpolation works on the rotation vector of the relative rotation
    /// between both attitudes. Boundary rotations always match; boundary rates
    /// and accelerations match when the filter requests them, through the
    /// right Jacobian mapping between rotation vector derivatives and body
    /// rates. The relative rotation over the interval must stay below pi.
    pub fn interpolate(
        start: &Self,
        end: &Self,
        epoch: Epoch,
        filter: AngularDerivativesFilter,
    ) -> Result<Self, AttitudeError> {
        if start.frame != end.frame {
            return Err(AttitudeError::AttitudeAstro {
                source: AstroError::FrameMismatch {
                    expected: start.frame,
                    got: end.frame,
                },
            });
        }
        let h = (end.epoch - start.epoch).to_seconds();
        if h <= 0.0 {
            return Err(AttitudeError::DegenerateInterval {
                start: start.epoch,
                end: end.epoch,
            });
        }
        let tau = (epoch - start.epoch).to_seconds() / h;

        let delta = start.orientation.inverse() * end.orientation;
        let theta_total = delta.scaled_axis();

        // Boundary conditions on the rotation vector, in normalized abscissa
        let m0 = start.rate_rad_s * h;
        let m1 = right_jacobian_inv(&theta_total) * (end.rate_rad_s * h);

        let (theta, theta_d, theta_dd) = match filter {
            AngularDerivativesFilter::UseR => {
                // Geodesic path at constant rate
                (tau * theta_total, theta_total, Vector3::zeros())
            }
            AngularDerivativesFilter::UseRR => cubic_hermite(&theta_total, &m0, &m1, tau),
            AngularDerivativesFilter::UseRRA => {
                let c0 = start.accel_rad_s2 * h * h;
                let c1 = right_jacobian_inv(&theta_total) * (end.accel_rad_s2 * h * h);
                quintic_hermite(&theta_total, &m0, &m1, &c0, &c1, tau)
            }
        };

        let jr = right_jacobian(&theta);
        let orientation = start.orientation * UnitQuaternion::from_scaled_axis(theta);
        let rate = jr * theta_d / h;
        // The Jacobian rate cross term is dropped; boundary values remain exact
        let accel = jr * theta_dd / (h * h);

        Ok(Self {
            epoch,
            frame: start.frame,
            orientation,
            rate_rad_s: rate,
            accel_rad_s2: accel,
        })
    }
}

impl fmt::Display for Attitude {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (axis, angle) = self
            .orientation
            .axis_angle()
            .map(|(a, ang)| (a.into_inner(), ang))
            .unwrap_or((Vector3::z(), 0.0));
        write!(
            f,
            "[{}] {} rot = {:.6} rad about [{:.4}, {:.4}, {:.4}], rate = {:.3e} rad/s",
            self.frame,
            self.epoch,
            angle,
            axis[0],
            axis[1],
            axis[2],
            self.rate_rad_s.norm()
        )
    }
}

/// Cubic Hermite interpolation of a rotation vector path from zero to
/// `theta_total` with the provided boundary derivatives.
fn cubic_hermite(
    theta_total: &Vector3<f64>,
    m0: &Vector3<f64>,
    m1: &Vector3<f64>,
    tau: f64,
) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
    let t2 = tau * tau;
    let t3 = t2 * tau;
    let theta =
        (t3 - 2.0 * t2 + tau) * m0 + (-2.0 * t3 + 3.0 * t2) * theta_total + (t3 - t2) * m1;
    let theta_d = (3.0 * t2 - 4.0 * tau + 1.0) * m0
        + (-6.0 * t2 + 6.0 * tau) * theta_total
        + (3.0 * t2 - 2.0 * tau) * m1;
    let theta_dd =
        (6.0 * tau - 4.0) * m0 + (-12.0 * tau + 6.0) * theta_total + (6.0 * tau - 2.0) * m1;
    (theta, theta_d, theta_dd)
}

/// Quintic Hermite interpolation of a rotation vector path from zero to
/// `theta_total` with boundary first and second derivatives.
fn quintic_hermite(
    theta_total: &Vector3<f64>,
    m0: &Vector3<f64>,
    m1: &Vector3<f64>,
    c0: &Vector3<f64>,
    c1: &Vector3<f64>,
    tau: f64,
) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
    let t2 = tau * tau;
    let t3 = t2 * tau;
    let t4 = t3 * tau;
    let t5 = t4 * tau;

    let h1 = tau - 6.0 * t3 + 8.0 * t4 - 3.0 * t5;
    let h2 = 0.5 * t2 - 1.5 * t3 + 1.5 * t4 - 0.5 * t5;
    let h3 = 0.5 * t3 - t4 + 0.5 * t5;
    let h4 = -4.0 * t3 + 7.0 * t4 - 3.0 * t5;
    let h5 = 10.0 * t3 - 15.0 * t4 + 6.0 * t5;

    let d1 = 1.0 - 18.0 * t2 + 32.0 * t3 - 15.0 * t4;
    let d2 = tau - 4.5 * t2 + 6.0 * t3 - 2.5 * t4;
    let d3 = 1.5 * t2 - 4.0 * t3 + 2.5 * t4;
    let d4 = -12.0 * t2 + 28.0 * t3 - 15.0 * t4;
    let d5 = 30.0 * t2 - 60.0 * t3 + 30.0 * t4;

    let s1 = -36.0 * tau + 96.0 * t2 - 60.0 * t3;
    let s2 = 1.0 - 9.0 * tau + 18.0 * t2 - 10.0 * t3;
    let s3 = 3.0 * tau - 12.0 * t2 + 10.0 * t3;
    let s4 = -24.0 * tau + 84.0 * t2 - 60.0 * t3;
    let s5 = 60.0 * tau - 180.0 * t2 + 120.0 * t3;

    let theta = h1 * m0 + h2 * c0 + h3 * c1 + h4 * m1 + h5 * theta_total;
    let theta_d = d1 * m0 + d2 * c0 + d3 * c1 + d4 * m1 + d5 * theta_total;
    let theta_dd = s1 * m0 + s2 * c0 + s3 * c1 + s4 * m1 + s5 * theta_total;
    (theta, theta_d, theta_dd)
}

/// Right Jacobian of SO(3) at the provided rotation vector: maps rotation
/// vector rates to body frame angular rates.
pub(crate) fn right_jacobian(theta: &Vector3<f64>) -> Matrix3<f64> {
    let angle = theta.norm();
    let tilde = tilde_matrix(theta);
    if angle < 1e-8 {
        return Matrix3::identity() - 0.5 * tilde + (tilde * tilde) / 6.0;
    }
    Matrix3::identity() - ((1.0 - angle.cos()) / angle.powi(2)) * tilde
        + ((angle - angle.sin()) / angle.powi(3)) * (tilde * tilde)
}

/// Inverse of the right Jacobian of SO(3) at the provided rotation vector.
pub(crate) fn right_jacobian_inv(theta: &Vector3<f64>) -> Matrix3<f64> {
    let angle = theta.norm();
    let tilde = tilde_matrix(theta);
    if angle < 1e-8 {
        return Matrix3::identity() + 0.5 * tilde + (tilde * tilde) / 12.0;
    }
    Matrix3::identity()
        + 0.5 * tilde
        + (1.0 / angle.powi(2) - (1.0 + angle.cos()) / (2.0 * angle * angle.sin()))
            * (tilde * tilde)
}

/// Anything that can provide a position and velocity at a given epoch, in a given frame.
pub trait PvProvider: Send + Sync {
    fn position_velocity(
        &self,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<(Vector3<f64>, Vector3<f64>), AttitudeError>;
}

impl PvProvider for Orbit {
    /// Two-body analytical shift to the requested epoch. The requested frame
    /// must match the frame of this orbit.
    fn position_velocity(
        &self,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<(Vector3<f64>, Vector3<f64>), AttitudeError> {
        if frame != self.frame {
            return Err(AttitudeError::AttitudeAstro {
                source: AstroError::FrameMismatch {
                    expected: self.frame,
                    got: frame,
                },
            });
        }
        let shifted = if epoch == self.epoch {
            *self
        } else {
            self.at_epoch(epoch)
                .map_err(|source| AttitudeError::AttitudeAstro { source })?
        };
        Ok((shifted.radius(), shifted.velocity()))
    }
}

impl PvProvider for Spacecraft {
    fn position_velocity(
        &self,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<(Vector3<f64>, Vector3<f64>), AttitudeError> {
        self.orbit.position_velocity(epoch, frame)
    }
}

/// An attitude law maps (position/velocity provider, epoch, frame) to an
/// orientation and its angular derivatives. Laws are stateless per call and
/// several laws may be active over different time spans of a sequence.
pub trait AttitudeLaw: fmt::Display + Send + Sync {
    fn attitude(
        &self,
        pv: &dyn PvProvider,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<Attitude, AttitudeError>;
}

/// Attitude modeling errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AttitudeError {
    #[snafu(display("no active attitude law: call reset_active_law or add a switching condition first"))]
    NoActiveLaw,
    #[snafu(display(
        "transition time ({transition}) must be longer than the event convergence threshold ({threshold}) to guarantee attitude continuity"
    ))]
    TransitionTooShort {
        transition: Duration,
        threshold: Duration,
    },
    #[snafu(display("cannot interpolate over a degenerate interval [{start}; {end}]"))]
    DegenerateInterval { start: Epoch, end: Epoch },
    #[snafu(display("attitude computation failed: {source}"))]
    AttitudeAstro { source: AstroError },
}
