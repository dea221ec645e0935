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

use super::kvn::KeyValue;
use super::InputOutputError;
use crate::cosmic::{AstroError, Frame, Orbit, Spacecraft};
use crate::linalg::Vector3;
use crate::time::Epoch;
use std::collections::HashMap;

/// A maneuver block of an orbit parameter message.
#[derive(Clone, Debug, PartialEq)]
pub struct OpmManeuver {
    pub epoch_ignition: Epoch,
    pub duration_s: f64,
    pub delta_mass_kg: f64,
    pub ref_frame: String,
    pub dv_km_s: Vector3<f64>,
}

/// The typed content of a CCSDS Orbit Parameter Message: an osculating state
/// vector with optional spacecraft data and maneuvers.
///
/// The reference frame and time system are kept as the strings declared by
/// the message; mapping them to typed frames is the caller's concern.
#[derive(Clone, Debug, PartialEq)]
pub struct OpmRecord {
    pub object_name: String,
    pub object_id: String,
    pub ref_frame: String,
    pub time_system: String,
    pub epoch: Epoch,
    pub position_km: Vector3<f64>,
    pub velocity_km_s: Vector3<f64>,
    pub mass_kg: Option<f64>,
    pub cr: Option<f64>,
    pub cd: Option<f64>,
    pub srp_area_m2: Option<f64>,
    pub drag_area_m2: Option<f64>,
    pub maneuvers: Vec<OpmManeuver>,
}

fn get_f64(
    map: &HashMap<String, KeyValue>,
    key: &'static str,
    kind: &'static str,
) -> Result<f64, InputOutputError> {
    map.get(key)
        .ok_or(InputOutputError::MissingKey { key, kind })?
        .as_f64()
}

fn get_opt_f64(
    map: &HashMap<String, KeyValue>,
    key: &str,
) -> Result<Option<f64>, InputOutputError> {
    map.get(key).map(|kv| kv.as_f64()).transpose()
}

fn get_string(map: &HashMap<String, KeyValue>, key: &str) -> String {
    map.get(key).map(|kv| kv.value.clone()).unwrap_or_default()
}

impl OpmRecord {
    /// Parses the KVN representation of an OPM. Unknown keys are ignored;
    /// missing mandatory keys (epoch and the six state vector components) are
    /// errors.
    pub fn parse(text: &str) -> Result<Self, InputOutputError> {
        let mut map: HashMap<String, KeyValue> = HashMap::new();
        let mut maneuvers = Vec::new();
        let mut current_man: Option<HashMap<String, KeyValue>> = None;

        for line in text.lines() {
            let Some(kv) = KeyValue::parse(line) else {
                continue;
            };
            if kv.key == "MAN_EPOCH_IGNITION" {
                // A new maneuver block starts; flush the previous one
                if let Some(man) = current_man.take() {
                    maneuvers.push(Self::parse_maneuver(&man)?);
                }
                let mut man = HashMap::new();
                man.insert(kv.key.clone(), kv);
                current_man = Some(man);
            } else if let Some(man) = current_man.as_mut() {
                man.insert(kv.key.clone(), kv);
            } else {
                map.insert(kv.key.clone(), kv);
            }
        }
        if let Some(man) = current_man.take() {
            maneuvers.push(Self::parse_maneuver(&man)?);
        }

        let kind = "OPM";
        let epoch = map
            .get("EPOCH")
            .ok_or(InputOutputError::MissingKey { key: "EPOCH", kind })?
            .as_epoch()?;

        Ok(Self {
            object_name: get_string(&map, "OBJECT_NAME"),
            object_id: get_string(&map, "OBJECT_ID"),
            ref_frame: get_string(&map, "REF_FRAME"),
            time_system: get_string(&map, "TIME_SYSTEM"),
            epoch,
            position_km: Vector3::new(
                get_f64(&map, "X", kind)?,
                get_f64(&map, "Y", kind)?,
                get_f64(&map, "Z", kind)?,
            ),
            velocity_km_s: Vector3::new(
                get_f64(&map, "X_DOT", kind)?,
                get_f64(&map, "Y_DOT", kind)?,
                get_f64(&map, "Z_DOT", kind)?,
            ),
            mass_kg: get_opt_f64(&map, "MASS")?,
            cr: get_opt_f64(&map, "SOLAR_RAD_COEFF")?,
            cd: get_opt_f64(&map, "DRAG_COEFF")?,
            srp_area_m2: get_opt_f64(&map, "SOLAR_RAD_AREA")?,
            drag_area_m2: get_opt_f64(&map, "DRAG_AREA")?,
            maneuvers,
        })
    }

    fn parse_maneuver(map: &HashMap<String, KeyValue>) -> Result<OpmManeuver, InputOutputError> {
        let kind = "OPM maneuver";
        let epoch_ignition = map
            .get("MAN_EPOCH_IGNITION")
            .ok_or(InputOutputError::MissingKey {
                key: "MAN_EPOCH_IGNITION",
                kind,
            })?
            .as_epoch()?;
        Ok(OpmManeuver {
            epoch_ignition,
            duration_s: get_f64(map, "MAN_DURATION", kind)?,
            delta_mass_kg: get_opt_f64(map, "MAN_DELTA_MASS")?.unwrap_or(0.0),
            ref_frame: get_string(map, "MAN_REF_FRAME"),
            dv_km_s: Vector3::new(
                get_f64(map, "MAN_DV_1", kind)?,
                get_f64(map, "MAN_DV_2", kind)?,
                get_f64(map, "MAN_DV_3", kind)?,
            ),
        })
    }

    /// Builds an orbit from this record, in the provided typed frame.
    pub fn to_orbit(&self, frame: Frame) -> Orbit {
        Orbit::from_position_velocity(self.position_km, self.velocity_km_s, self.epoch, frame)
    }

    /// Builds a spacecraft from this record, applying the optional physical data.
    pub fn to_spacecraft(&self, frame: Frame) -> Spacecraft {
        let mut sc = Spacecraft::from_orbit(self.to_orbit(frame));
        if let Some(mass) = self.mass_kg {
            sc.mass_kg = mass;
        }
        if let Some(cr) = self.cr {
            sc.srp_cr = cr;
        }
        if let Some(cd) = self.cd {
            sc.drag_cd = cd;
        }
        if let Some(area) = self.srp_area_m2 {
            sc.srp_area_m2 = area;
        }
        if let Some(area) = self.drag_area_m2 {
            sc.drag_area_m2 = area;
        }
        sc
    }
}

/// The typed content of a CCSDS Orbit Mean-Elements Message.
#[derive(Clone, Debug, PartialEq)]
pub struct OmmRecord {
    pub object_name: String,
    pub object_id: String,
    pub ref_frame: String,
    pub time_system: String,
    pub mean_element_theory: String,
    pub epoch: Epoch,
    /// Mean motion in revolutions per day, when given instead of the semi major axis
    pub mean_motion_rev_day: Option<f64>,
    pub sma_km: Option<f64>,
    pub ecc: f64,
    pub inc_deg: f64,
    pub raan_deg: f64,
    pub aop_deg: f64,
    pub mean_anomaly_deg: f64,
    pub bstar: Option<f64>,
}

impl OmmRecord {
    /// Parses the KVN representation of an OMM. One of MEAN_MOTION or
    /// SEMI_MAJOR_AXIS is mandatory, along with the epoch and the remaining
    /// mean elements.
    pub fn parse(text: &str) -> Result<Self, InputOutputError> {
        let mut map: HashMap<String, KeyValue> = HashMap::new();
        for line in text.lines() {
            if let Some(kv) = KeyValue::parse(line) {
                map.insert(kv.key.clone(), kv);
            }
        }

        let kind = "OMM";
        let epoch = map
            .get("EPOCH")
            .ok_or(InputOutputError::MissingKey { key: "EPOCH", kind })?
            .as_epoch()?;

        let mean_motion_rev_day = get_opt_f64(&map, "MEAN_MOTION")?;
        let sma_km = get_opt_f64(&map, "SEMI_MAJOR_AXIS")?;
        if mean_motion_rev_day.is_none() && sma_km.is_none() {
            return Err(InputOutputError::MissingKey {
                key: "MEAN_MOTION",
                kind,
            });
        }

        Ok(Self {
            object_name: get_string(&map, "OBJECT_NAME"),
            object_id: get_string(&map, "OBJECT_ID"),
            ref_frame: get_string(&map, "REF_FRAME"),
            time_system: get_string(&map, "TIME_SYSTEM"),
            mean_element_theory: get_string(&map, "MEAN_ELEMENT_THEORY"),
            epoch,
            mean_motion_rev_day,
            sma_km,
            ecc: get_f64(&map, "ECCENTRICITY", kind)?,
            inc_deg: get_f64(&map, "INCLINATION", kind)?,
            raan_deg: get_f64(&map, "RA_OF_ASC_NODE", kind)?,
            aop_deg: get_f64(&map, "ARG_OF_PERICENTER", kind)?,
            mean_anomaly_deg: get_f64(&map, "MEAN_ANOMALY", kind)?,
            bstar: get_opt_f64(&map, "BSTAR")?,
        })
    }

    /// Semi major axis, derived from the mean motion when not given directly.
    pub fn semi_major_axis_km(&self, frame: Frame) -> Result<f64, AstroError> {
        if let Some(sma) = self.sma_km {
            return Ok(sma);
        }
        match self.mean_motion_rev_day {
            Some(rev_day) => {
                let n_rad_s = rev_day * 2.0 * std::f64::consts::PI / 86_400.0;
                Ok((frame.gm() / n_rad_s.powi(2)).cbrt())
            }
            None => Err(AstroError::ParamUndefined {
                param: "semi major axis",
            }),
        }
    }

    /// Builds an osculating orbit from the mean elements, treating them as
    /// osculating: a mean element theory (SGP4, DSST) is not applied here.
    pub fn to_orbit(&self, frame: Frame) -> Result<Orbit, AstroError> {
        Orbit::keplerian_mean_anomaly(
            self.semi_major_axis_km(frame)?,
            self.ecc,
            self.inc_deg,
            self.raan_deg,
            self.aop_deg,
            self.mean_anomaly_deg,
            self.epoch,
            frame,
        )
    }
}

#[cfg(test)]
mod ut_ndm {
    use super::*;
    use approx::assert_abs_diff_eq;

    const OPM_SAMPLE: &str = r#"CCSDS_OPM_VERS = 2.0
CREATION_DATE = 2021-06-03T05:33:00
ORIGINATOR = ASTERIA
COMMENT geocentric, cartesian, earth fixed
OBJECT_NAME = ASTERIA-SAT
OBJECT_ID = 2021-064A
CENTER_NAME = EARTH
REF_FRAME = EME2000
TIME_SYSTEM = UTC
EPOCH = 2021-06-03T00:00:00.000
X = 6655.9942 [km]
Y = -40218.5751 [km]
Z = -82.9177 [km]
X_DOT = 3.11548208 [km/s]
Y_DOT = 0.47042605 [km/s]
Z_DOT = -0.00101495 [km/s]
MASS = 1913.000 [kg]
SOLAR_RAD_AREA = 10.000 [m**2]
SOLAR_RAD_COEFF = 1.300
DRAG_AREA = 10.000 [m**2]
DRAG_COEFF = 2.300
MAN_EPOCH_IGNITION = 2021-06-03T09:00:00.000
MAN_DURATION = 132.60 [s]
MAN_DELTA_MASS = -18.418 [kg]
MAN_REF_FRAME = EME2000
MAN_DV_1 = 0.202000 [km/s]
MAN_DV_2 = -0.576000 [km/s]
MAN_DV_3 = 0.000000 [km/s]
"#;

    #[test]
    fn opm_state_vector() {
        let opm = OpmRecord::parse(OPM_SAMPLE).unwrap();
        assert_eq!(opm.object_name, "ASTERIA-SAT");
        assert_abs_diff_eq!(opm.position_km[1], -40218.5751);
        assert_abs_diff_eq!(opm.velocity_km_s[0], 3.11548208);
        assert_eq!(opm.mass_kg, Some(1913.0));
        let sc = opm.to_spacecraft(Frame::EME2000);
        assert_abs_diff_eq!(sc.srp_cr, 1.3);
        assert_abs_diff_eq!(sc.drag_cd, 2.3);
    }

    #[test]
    fn opm_maneuver_block() {
        let opm = OpmRecord::parse(OPM_SAMPLE).unwrap();
        assert_eq!(opm.maneuvers.len(), 1);
        let man = &opm.maneuvers[0];
        assert_abs_diff_eq!(man.duration_s, 132.60);
        assert_abs_diff_eq!(man.dv_km_s[1], -0.576);
        assert_abs_diff_eq!(man.delta_mass_kg, -18.418);
    }

    #[test]
    fn opm_missing_mandatory_key() {
        let broken = "EPOCH = 2021-06-03T00:00:00\nX = 1.0\nY = 2.0\nZ = 3.0\n";
        assert!(matches!(
            OpmRecord::parse(broken),
            Err(InputOutputError::MissingKey { key: "X_DOT", .. })
        ));
    }

    const OMM_SAMPLE: &str = r#"CCSDS_OMM_VERS = 2.0
ORIGINATOR = ASTERIA
OBJECT_NAME = ASTERIA-SAT
OBJECT_ID = 2021-064A
CENTER_NAME = EARTH
REF_FRAME = TEME
TIME_SYSTEM = UTC
MEAN_ELEMENT_THEORY = SGP4
EPOCH = 2021-06-03T00:00:00
MEAN_MOTION = 15.50103472 [rev/day]
ECCENTRICITY = 0.0002296
INCLINATION = 51.6423 [deg]
RA_OF_ASC_NODE = 126.1183 [deg]
ARG_OF_PERICENTER = 32.0317 [deg]
MEAN_ANOMALY = 328.0871 [deg]
BSTAR = 0.0000346

"#;

    #[test]
    fn omm_mean_elements() {
        let omm = OmmRecord::parse(OMM_SAMPLE).unwrap();
        assert_eq!(omm.mean_element_theory, "SGP4");
        assert_abs_diff_eq!(omm.ecc, 0.0002296);
        // About 15.5 rev/day puts the semi major axis near 6800 km
        let sma = omm.semi_major_axis_km(Frame::EME2000).unwrap();
        assert!((6700.0..6900.0).contains(&sma), "sma = {sma}");
        let orbit = omm.to_orbit(Frame::EME2000).unwrap();
        assert_abs_diff_eq!(orbit.inc_deg(), 51.6423, epsilon = 1e-9);
    }
}
