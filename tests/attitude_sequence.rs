extern crate asteria;
extern crate nalgebra as na;
extern crate pretty_env_logger;

use asteria::attitude::{
    AngularDerivativesFilter, AttitudeSequence, InertialLaw, LawArc, SpinStabilized, SunPointing,
    SwitchHandler,
};
use asteria::cosmic::{Frame, Orbit, Spacecraft};
use asteria::dynamics::SpacecraftDynamics;
use asteria::propagators::{DateEvent, Propagator};
use asteria::time::{Epoch, Unit};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn t0() -> Epoch {
    Epoch::from_gregorian_tai_at_midnight(2022, 3, 1)
}

fn leo_spacecraft() -> Spacecraft {
    let orbit = Orbit::keplerian(7000.0, 0.001, 51.6, 30.0, 40.0, 0.0, t0(), Frame::EME2000);
    Spacecraft::from_orbit(orbit)
}

struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl SwitchHandler for CountingHandler {
    fn switch_occurred(&self, _preceding: &LawArc, _following: &LawArc, _state: &Spacecraft) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Builds a sequence switching from inertial to sun pointing at t0 + 1000 s
/// with a 60 s transition.
fn eclipse_like_sequence(
    count: Option<Arc<AtomicUsize>>,
) -> (AttitudeSequence, LawArc, LawArc) {
    let past: LawArc = Arc::new(InertialLaw::identity());
    let future: LawArc = Arc::new(SunPointing);
    let mut sequence = AttitudeSequence::new();
    let handler = count.map(|count| {
        Arc::new(CountingHandler { count }) as Arc<dyn SwitchHandler>
    });
    sequence
        .add_switching_condition(
            past.clone(),
            future.clone(),
            Arc::new(DateEvent::new(t0() + 1000 * Unit::Second)),
            true,
            true,
            60 * Unit::Second,
            AngularDerivativesFilter::UseRR,
            handler,
        )
        .unwrap();
    (sequence, past, future)
}

#[test]
fn transition_time_shorter_than_threshold_rejected() {
    let past: LawArc = Arc::new(InertialLaw::identity());
    let future: LawArc = Arc::new(SunPointing);
    let mut sequence = AttitudeSequence::new();
    // The date event threshold is 1 ms: a 0.5 ms transition must be rejected
    let result = sequence.add_switching_condition(
        past,
        future,
        Arc::new(DateEvent::new(t0() + 1000 * Unit::Second)),
        true,
        false,
        500 * Unit::Microsecond,
        AngularDerivativesFilter::UseR,
        None,
    );
    assert!(result.is_err(), "too short transition must fail at setup");
}

#[test]
fn switch_scenario_forward() {
    let _ = pretty_env_logger::try_init();

    let count = Arc::new(AtomicUsize::new(0));
    let (sequence, past, future) = eclipse_like_sequence(Some(count.clone()));

    let sc = leo_spacecraft();
    let prop = Propagator::default_dp45(SpacecraftDynamics::two_body());
    let mut inst = prop.with(sc);
    sequence.register_switch_events(&mut inst);
    inst.for_duration(2000 * Unit::Second).unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 1, "exactly one switch");

    // Three spans: past, transition, future
    assert_eq!(sequence.nb_spans(), 3);
    let dates = sequence.switch_dates();
    assert_eq!(dates.len(), 2);
    let switch_s = (dates[0] - t0()).to_seconds();
    let end_s = (dates[1] - t0()).to_seconds();
    assert!((switch_s - 1000.0).abs() < 1e-2, "switch @ {switch_s} s");
    assert!((end_s - 1060.0).abs() < 1e-2, "transition end @ {end_s} s");

    let orbit = sc.orbit;
    // Before the switch: the past law is active
    for offset_s in [0, 500, 999] {
        let epoch = t0() + offset_s * Unit::Second;
        let att = sequence.attitude(&orbit, epoch, Frame::EME2000).unwrap();
        let reference = past.attitude(&orbit, epoch, Frame::EME2000).unwrap();
        assert!(
            att.orientation.angle_to(&reference.orientation) < 1e-10,
            "expected past law active at {offset_s} s"
        );
    }
    // After the transition: the future law is active
    for offset_s in [1061, 1500, 2000] {
        let epoch = t0() + offset_s * Unit::Second;
        let att = sequence.attitude(&orbit, epoch, Frame::EME2000).unwrap();
        let reference = future.attitude(&orbit, epoch, Frame::EME2000).unwrap();
        assert!(
            att.orientation.angle_to(&reference.orientation) < 1e-10,
            "expected future law active at {offset_s} s"
        );
    }
    // During the transition: neither law matches exactly, and the attitude
    // stays continuous across both boundaries
    let mid = t0() + 1030 * Unit::Second;
    let att_mid = sequence.attitude(&orbit, mid, Frame::EME2000).unwrap();
    let past_mid = past.attitude(&orbit, mid, Frame::EME2000).unwrap();
    let future_mid = future.attitude(&orbit, mid, Frame::EME2000).unwrap();
    assert!(att_mid.orientation.angle_to(&past_mid.orientation) > 1e-6);
    assert!(att_mid.orientation.angle_to(&future_mid.orientation) > 1e-6);

    for boundary_s in [1000.0, 1060.0] {
        let before = sequence
            .attitude(
                &orbit,
                t0() + (boundary_s - 1e-3) * Unit::Second,
                Frame::EME2000,
            )
            .unwrap();
        let after = sequence
            .attitude(
                &orbit,
                t0() + (boundary_s + 1e-3) * Unit::Second,
                Frame::EME2000,
            )
            .unwrap();
        assert!(
            before.orientation.angle_to(&after.orientation) < 1e-4,
            "attitude jump across the {boundary_s} s boundary"
        );
    }
}

#[test]
fn switching_is_idempotent() {
    let _ = pretty_env_logger::try_init();

    // Reference: a single propagation over the full span
    let (sequence_ref, _, _) = eclipse_like_sequence(None);
    let sc = leo_spacecraft();
    let prop = Propagator::default_dp45(SpacecraftDynamics::two_body());
    {
        let mut inst = prop.with(sc);
        sequence_ref.register_switch_events(&mut inst);
        inst.for_duration(2000 * Unit::Second).unwrap();
    }
    let reference_dates = sequence_ref.switch_dates();
    assert_eq!(reference_dates.len(), 2);

    // Same configuration, propagated in two legs: t0 -> t1 then t1 -> t2
    let (sequence, _, _) = eclipse_like_sequence(None);
    let mut inst = prop.with(sc);
    sequence.register_switch_events(&mut inst);
    inst.for_duration(800 * Unit::Second).unwrap();
    inst.for_duration(1200 * Unit::Second).unwrap();
    let two_leg_dates = sequence.switch_dates();
    assert_eq!(two_leg_dates.len(), reference_dates.len());
    for (split, reference) in two_leg_dates.iter().zip(reference_dates.iter()) {
        assert!(
            (*split - *reference).abs() < 2 * Unit::Millisecond,
            "t0->t1->t2 must reproduce the t0->t2 switch dates"
        );
    }

    // Re-running over an already covered span must reproduce the same switch
    // dates: the recorded history beyond the start date is erased and recomputed
    let mut inst2 = prop.with(sc);
    sequence.register_switch_events(&mut inst2);
    inst2.for_duration(2000 * Unit::Second).unwrap();
    let dates = sequence.switch_dates();
    assert_eq!(dates.len(), 2, "re-propagation must not duplicate switches");
    for (recomputed, reference) in dates.iter().zip(reference_dates.iter()) {
        assert!(
            (*recomputed - *reference).abs() < 2 * Unit::Millisecond,
            "switch dates must be reproducible"
        );
    }
}

#[test]
fn backward_propagation_mirrors_forward() {
    let _ = pretty_env_logger::try_init();

    let (mut sequence, past, future) = eclipse_like_sequence(None);
    // For a backward propagation the currently active law is the future one
    sequence.reset_active_law(future.clone());

    let sc = leo_spacecraft();
    // Start from the (two-body) state at t0 + 2000 s and propagate backward
    let start = sc.shifted_by(2000 * Unit::Second).unwrap();
    let prop = Propagator::default_dp45(SpacecraftDynamics::two_body());
    let mut inst = prop.with(start);
    sequence.register_switch_events(&mut inst);
    inst.for_duration(-2000 * Unit::Second).unwrap();

    let dates = sequence.switch_dates();
    assert_eq!(dates.len(), 2, "backward switch must record both boundaries");
    let start_s = (dates[0] - t0()).to_seconds();
    let end_s = (dates[1] - t0()).to_seconds();
    assert!(
        (start_s - 1000.0).abs() < 1e-1,
        "transition start @ {start_s} s"
    );
    assert!((end_s - 1060.0).abs() < 1e-1, "transition end @ {end_s} s");

    // Far side of the switch: the past law is active before the transition
    let orbit = sc.orbit;
    let epoch = t0() + 500 * Unit::Second;
    let att = sequence.attitude(&orbit, epoch, Frame::EME2000).unwrap();
    let reference = past.attitude(&orbit, epoch, Frame::EME2000).unwrap();
    assert!(att.orientation.angle_to(&reference.orientation) < 1e-10);
}

#[test]
fn exactly_one_law_resolves_at_any_epoch() {
    let (sequence, _, _) = eclipse_like_sequence(None);
    let sc = leo_spacecraft();
    let prop = Propagator::default_dp45(SpacecraftDynamics::two_body());
    let mut inst = prop.with(sc);
    sequence.register_switch_events(&mut inst);
    inst.for_duration(2000 * Unit::Second).unwrap();

    // Any query, inside or far outside the propagated span, resolves to
    // exactly one law and never fails
    for offset_s in [-5_000, -1, 0, 999, 1000, 1030, 1059, 1060, 2000, 50_000] {
        let epoch = t0() + offset_s * Unit::Second;
        assert!(
            sequence.attitude(&sc.orbit, epoch, Frame::EME2000).is_ok(),
            "no active law at {offset_s} s"
        );
    }
}

#[test]
fn event_without_switch_keeps_map() {
    let _ = pretty_env_logger::try_init();

    // Direction filter excludes the crossing: increasing only event crossed
    // while configured to switch on decrease only
    let past: LawArc = Arc::new(InertialLaw::identity());
    let future: LawArc = Arc::new(SpinStabilized::new(
        na::UnitQuaternion::identity(),
        t0(),
        na::Vector3::z(),
        1e-3,
    ));
    let mut sequence = AttitudeSequence::new();
    sequence
        .add_switching_condition(
            past.clone(),
            future,
            Arc::new(DateEvent::new(t0() + 1000 * Unit::Second)),
            false, // never on increase
            false, // never on decrease
            60 * Unit::Second,
            AngularDerivativesFilter::UseR,
            None,
        )
        .unwrap();

    let sc = leo_spacecraft();
    let prop = Propagator::default_dp45(SpacecraftDynamics::two_body());
    let mut inst = prop.with(sc);
    sequence.register_switch_events(&mut inst);
    inst.for_duration(2000 * Unit::Second).unwrap();

    // The event fired but the attitude map is untouched
    assert_eq!(sequence.nb_spans(), 1);
    assert!(sequence.switch_dates().is_empty());
}
