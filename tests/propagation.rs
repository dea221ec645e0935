extern crate asteria;
extern crate nalgebra as na;
extern crate pretty_env_logger;

use asteria::cosmic::{Frame, Orbit, Spacecraft, STD_GRAVITY};
use asteria::dynamics::{AtmosphericDrag, ImpulseManeuver, SolarPressure, SpacecraftDynamics};
use asteria::propagators::{Action, DateEvent, PropOpts, Propagator, RadiusCrossing};
use asteria::time::{Epoch, Unit};
use na::Vector3;
use std::sync::Arc;

fn t0() -> Epoch {
    Epoch::from_gregorian_tai_at_midnight(2022, 8, 20)
}

fn leo() -> Spacecraft {
    let orbit = Orbit::keplerian(7000.0, 0.02, 51.6, 20.0, 35.0, 0.0, t0(), Frame::EME2000);
    Spacecraft::from_orbit(orbit)
}

#[test]
fn two_body_energy_conservation() {
    let _ = pretty_env_logger::try_init();

    let sc = leo();
    let initial_energy = sc.orbit.energy_km2_s2();
    let prop = Propagator::default_dp45(SpacecraftDynamics::two_body());
    let mut inst = prop.with(sc);
    let period = sc.orbit.period().unwrap();
    let final_state = inst.for_duration(period).unwrap();

    let final_energy = final_state.orbit.energy_km2_s2();
    let rel_err = ((final_energy - initial_energy) / initial_energy).abs();
    assert!(rel_err < 1e-9, "energy drift {rel_err:.3e}");

    // One full period brings the state back to the start
    let pos_err = (final_state.radius() - sc.radius()).norm();
    assert!(pos_err < 1e-3, "position error after one period {pos_err} km");
}

#[test]
fn numerical_matches_analytical_two_body() {
    let sc = leo();
    let prop = Propagator::default_dp45(SpacecraftDynamics::two_body());
    let mut inst = prop.with(sc);
    let numerical = inst.for_duration(45 * Unit::Minute).unwrap();
    let analytical = sc.shifted_by(45 * Unit::Minute).unwrap();
    let pos_err = (numerical.radius() - analytical.radius()).norm();
    assert!(pos_err < 1e-3, "numerical vs Kepler {pos_err} km");
}

#[test]
fn forward_then_backward_roundtrip() {
    let _ = pretty_env_logger::try_init();

    let sc = leo();
    let prop = Propagator::default_dp45(SpacecraftDynamics::two_body());
    let mut inst = prop.with(sc);
    inst.for_duration(30 * Unit::Minute).unwrap();
    let back = inst.for_duration(-30 * Unit::Minute).unwrap();
    let pos_err = (back.radius() - sc.radius()).norm();
    let vel_err = (back.velocity() - sc.velocity()).norm();
    assert!(pos_err < 1e-3, "backward roundtrip position error {pos_err} km");
    assert!(vel_err < 1e-6, "backward roundtrip velocity error {vel_err} km/s");
}

#[test]
fn drag_and_srp_decay_the_orbit() {
    let _ = pretty_env_logger::try_init();

    let sc = leo();
    let mut dynamics = SpacecraftDynamics::two_body();
    dynamics.add_model(Arc::new(AtmosphericDrag::earth_exponential()));
    dynamics.add_model(Arc::new(SolarPressure::default()));
    let prop = Propagator::default_dp45(dynamics);
    let mut inst = prop.with(sc);
    let final_state = inst.for_duration(sc.orbit.period().unwrap()).unwrap();
    // Perturbed two-body no longer conserves the Keplerian energy exactly,
    // but the trajectory remains a sane orbit
    let sma = final_state.orbit.sma_km();
    assert!((sma - 7000.0).abs() < 5.0, "sma after one period {sma} km");
}

#[test]
fn stops_on_date_event() {
    let _ = pretty_env_logger::try_init();

    let sc = leo();
    let prop = Propagator::default_dp45(SpacecraftDynamics::two_body());
    let mut inst = prop.with(sc);
    let stop_epoch = t0() + 500 * Unit::Second;
    inst.add_event_detector(Arc::new(DateEvent::stop_at(stop_epoch)));
    let final_state = inst.for_duration(2000 * Unit::Second).unwrap();

    assert!(inst.stopped_on_event.is_some(), "event must stop propagation");
    let miss_s = (final_state.orbit.epoch - stop_epoch).to_seconds().abs();
    assert!(miss_s < 2e-3, "stopped {miss_s} s away from the event");
}

#[test]
fn radius_crossing_localization() {
    let _ = pretty_env_logger::try_init();

    // Start at periapsis of an eccentric orbit and stop when r = sma
    let orbit = Orbit::keplerian(8000.0, 0.1, 30.0, 0.0, 0.0, 0.0, t0(), Frame::EME2000);
    let sc = Spacecraft::from_orbit(orbit);
    let prop = Propagator::default_dp45(SpacecraftDynamics::two_body());
    let mut inst = prop.with(sc);
    inst.add_event_detector(Arc::new(RadiusCrossing {
        radius_km: 8000.0,
        action: Action::Stop,
    }));
    let final_state = inst.for_duration(orbit.period().unwrap()).unwrap();

    assert!(inst.stopped_on_event.is_some());
    let rmag = final_state.orbit.rmag_km();
    assert!(
        (rmag - 8000.0).abs() < 1e-2,
        "radius at event {rmag} km, expected 8000 km"
    );
}

#[test]
fn impulse_maneuver_applies_dv_and_mass_ratio() {
    let _ = pretty_env_logger::try_init();

    let sc = leo();
    let dv = Vector3::new(0.0, 0.05, 0.0);
    let isp_s = 300.0;
    let maneuver = ImpulseManeuver::new(
        Arc::new(DateEvent::new(t0() + 300 * Unit::Second)),
        dv,
        isp_s,
    );

    let prop = Propagator::default_dp45(SpacecraftDynamics::two_body());
    let mut inst = prop.with(sc);
    inst.add_event_detector(Arc::new(maneuver));
    let final_state = inst.for_duration(600 * Unit::Second).unwrap();

    // Tsiolkovsky mass ratio for 50 m/s at 300 s Isp
    let expected_mass = sc.mass_kg * (-50.0 / (isp_s * STD_GRAVITY)).exp();
    assert!(
        (final_state.mass_kg - expected_mass).abs() < 1e-6,
        "mass {} kg, expected {} kg",
        final_state.mass_kg,
        expected_mass
    );

    // The maneuvered trajectory diverges from the unmaneuvered one
    let coasting = {
        let mut coast = prop.with(sc);
        coast.for_duration(600 * Unit::Second).unwrap()
    };
    let separation = (final_state.radius() - coasting.radius()).norm();
    assert!(
        separation > 1.0,
        "the maneuver must alter the trajectory, separation {separation} km"
    );
}
