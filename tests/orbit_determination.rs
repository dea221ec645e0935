extern crate asteria;
extern crate pretty_env_logger;

use asteria::cosmic::{Frame, Orbit, Spacecraft};
use asteria::dynamics::SpacecraftDynamics;
use asteria::linalg::{DMatrix, DVector};
use asteria::od::noise::ConstantCovariance;
use asteria::od::prelude::*;
use asteria::propagators::{PropOpts, Propagator};
use asteria::time::{Epoch, Unit};
use std::sync::{Arc, Mutex};

fn t0() -> Epoch {
    Epoch::from_gregorian_tai_at_midnight(2023, 5, 10)
}

fn truth_spacecraft() -> Spacecraft {
    let orbit = Orbit::keplerian(7200.0, 0.01, 45.0, 25.0, 30.0, 10.0, t0(), Frame::EME2000);
    Spacecraft::from_orbit(orbit)
}

fn stations() -> Vec<GroundStation> {
    vec![
        GroundStation::builder()
            .name("DSS-13".to_string())
            .x_km(-2351.112)
            .y_km(-4655.530)
            .z_km(3660.912)
            .build(),
        GroundStation::builder()
            .name("DSS-65".to_string())
            .x_km(4846.097)
            .y_km(-370.196)
            .z_km(4116.888)
            .build(),
    ]
}

/// Noise-free range/doppler measurements of the truth trajectory.
fn perfect_measurements(count: usize, step_s: i64) -> Vec<Measurement> {
    let truth = truth_spacecraft();
    let devices = stations();
    let prop = Propagator::default_dp45(SpacecraftDynamics::two_body());
    let mut inst = prop.with(truth);
    let mut measurements = Vec::with_capacity(count);
    for i in 0..count {
        let epoch = t0() + ((i as i64 + 1) * step_s) * Unit::Second;
        let state = inst.until_epoch(epoch).unwrap();
        let station = &devices[i % devices.len()];
        measurements.push(station.measure_exact(&state, MeasurementKind::RangeDoppler));
    }
    measurements
}

fn estimator(initial: Spacecraft) -> SequentialKalman {
    let builder = SpacecraftPropagatorBuilder::new(
        initial,
        SpacecraftDynamics::two_body(),
        PropOpts::default(),
    )
    .unwrap();
    let covar = ConstantCovariance::from_diagonals(
        vec![4.0, 4.0, 4.0, 1e-4, 1e-4, 1e-4],
        vec![0.0; 6],
    );
    SequentialKalman::new(builder, stations(), Box::new(covar), None).unwrap()
}

struct CapturingObserver {
    calls: Arc<Mutex<Vec<(usize, Epoch, usize)>>>,
}

impl KalmanObserver for CapturingObserver {
    fn estimate_updated(
        &mut self,
        msr_index: usize,
        epoch: Epoch,
        physical_state: &DVector<f64>,
        physical_covar: &DMatrix<f64>,
    ) {
        assert_eq!(physical_state.len(), physical_covar.nrows());
        self.calls
            .lock()
            .unwrap()
            .push((msr_index, epoch, physical_state.len()));
    }
}

#[test]
fn out_of_order_measurement_is_fatal() {
    let _ = pretty_env_logger::try_init();

    let mut process = estimator(truth_spacecraft());
    let mut measurements = perfect_measurements(3, 60);
    // Swap the last two so the third goes back in time
    measurements.swap(1, 2);
    let result = process.process_measurements(&measurements);
    assert!(
        matches!(result, Err(ODError::OutOfOrderMeasurement { .. })),
        "out of order measurements must abort processing"
    );
}

#[test]
fn empty_measurement_set_rejected() {
    let mut process = estimator(truth_spacecraft());
    assert!(process.process_measurements(&[]).is_err());
}

#[test]
fn perfect_measurements_converge_to_truth() {
    let _ = pretty_env_logger::try_init();

    let truth = truth_spacecraft();
    // Perturb the initial guess by about 1.2 km and 1.3 m/s
    let mut initial = truth;
    initial.orbit.x_km += 1.0;
    initial.orbit.y_km -= 0.5;
    initial.orbit.z_km += 0.4;
    initial.orbit.vy_km_s += 1.3e-3;

    let initial_pos_err = (initial.radius() - truth.radius()).norm();

    let mut process = estimator(initial);
    let measurements = perfect_measurements(20, 120);
    let final_state = process.process_measurements(&measurements).unwrap();

    // Compare against the truth propagated to the final measurement epoch
    let prop = Propagator::default_dp45(SpacecraftDynamics::two_body());
    let truth_final = {
        let mut inst = prop.with(truth);
        inst.until_epoch(process.current_epoch()).unwrap()
    };
    let final_pos_err = (final_state.radius() - truth_final.radius()).norm();

    assert!(
        final_pos_err < initial_pos_err / 5.0,
        "filter must reduce the position error: {initial_pos_err:.4} km -> {final_pos_err:.4} km"
    );
    assert_eq!(process.measurement_count(), 20);

    // The postfit residuals must shrink as the filter converges
    let first_prefit = process.residuals[0].prefit.norm();
    let last_postfit = process.residuals.last().unwrap().postfit.norm();
    assert!(
        last_postfit < first_prefit,
        "postfit {last_postfit:.3e} must be below the initial prefit {first_prefit:.3e}"
    );
}

#[test]
fn monotonic_dates_and_queries_after_processing() {
    let _ = pretty_env_logger::try_init();

    let mut process = estimator(truth_spacecraft());
    let measurements = perfect_measurements(5, 60);
    process.process_measurements(&measurements).unwrap();
    assert_eq!(process.current_epoch(), measurements[4].epoch);

    // Physical state and covariance stay queryable after the run
    let state = process.physical_estimated_state();
    let covar = process.physical_estimated_covariance();
    assert_eq!(state.len(), 6);
    assert_eq!(covar.nrows(), 6);
    for i in 0..6 {
        assert!(covar[(i, i)] > 0.0, "covariance diagonal must stay positive");
    }

    // Driver accessors expose the estimated parameters
    assert_eq!(process.orbital_parameters_drivers(true).len(), 6);
    assert_eq!(process.propagation_parameters_drivers(true).len(), 0);
    assert_eq!(process.propagation_parameters_drivers(false).len(), 2);
}

#[test]
fn observer_is_notified_in_order() {
    let _ = pretty_env_logger::try_init();

    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut process = estimator(truth_spacecraft());
    process.set_observer(Box::new(CapturingObserver {
        calls: calls.clone(),
    }));
    let measurements = perfect_measurements(4, 60);
    process.process_measurements(&measurements).unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 4);
    for (i, (msr_index, epoch, dim)) in calls.iter().enumerate() {
        assert_eq!(*msr_index, i);
        assert_eq!(*epoch, measurements[i].epoch);
        assert_eq!(*dim, 6);
    }
}

#[test]
fn noisy_measurements_stay_bounded() {
    let _ = pretty_env_logger::try_init();

    let mut rng = rand_pcg::Pcg64Mcg::new(42);

    // Simulate noisy observations of the truth
    let truth = truth_spacecraft();
    let devices = stations();
    let prop = Propagator::default_dp45(SpacecraftDynamics::two_body());
    let mut inst = prop.with(truth);
    let mut measurements = Vec::new();
    for i in 0..12usize {
        let epoch = t0() + ((i as i64 + 1) * 120) * Unit::Second;
        let state = inst.until_epoch(epoch).unwrap();
        let station = &devices[i % devices.len()];
        measurements.push(station.measure(&state, MeasurementKind::RangeDoppler, &mut rng));
    }

    let mut initial = truth;
    initial.orbit.x_km += 0.8;
    let mut process = estimator(initial);
    let final_state = process.process_measurements(&measurements).unwrap();

    // With 1 m range noise the converged state stays within a few hundred
    // meters of the truth
    let truth_final = {
        let mut check = prop.with(truth);
        check.until_epoch(process.current_epoch()).unwrap()
    };
    let pos_err = (final_state.radius() - truth_final.radius()).norm();
    assert!(pos_err < 0.5, "position error with noisy tracking {pos_err} km");
}

#[test]
fn estimating_a_station_bias() {
    let _ = pretty_env_logger::try_init();

    // The truth has a 200 m range bias on DSS-13 which the filter estimates
    let mut biased_stations = stations();
    let truth_bias_km = 0.2;
    let mut bias = ParameterDriver::new("DSS-13-range-bias", 0.0, 1e-3)
        .unwrap()
        .select();
    bias.set_value(0.0);
    biased_stations[0].range_bias = Some(bias);

    // Generate measurements with the bias applied on DSS-13 only
    let truth = truth_spacecraft();
    let unbiased = stations();
    let prop = Propagator::default_dp45(SpacecraftDynamics::two_body());
    let mut inst = prop.with(truth);
    let mut measurements = Vec::new();
    for i in 0..16usize {
        let epoch = t0() + ((i as i64 + 1) * 120) * Unit::Second;
        let state = inst.until_epoch(epoch).unwrap();
        let station = &unbiased[i % 2];
        let mut msr = station.measure_exact(&state, MeasurementKind::RangeDoppler);
        if station.name == "DSS-13" {
            msr.observation[0] += truth_bias_km;
        }
        measurements.push(msr);
    }

    let builder = SpacecraftPropagatorBuilder::new(
        truth,
        SpacecraftDynamics::two_body(),
        PropOpts::default(),
    )
    .unwrap();
    let covar = ConstantCovariance::from_diagonals(
        vec![1e-2, 1e-2, 1e-2, 1e-6, 1e-6, 1e-6],
        vec![0.0; 6],
    );
    let bias_covar = ConstantCovariance::from_diagonals(vec![1.0], vec![0.0]);
    let mut process = SequentialKalman::new(
        builder,
        biased_stations,
        Box::new(covar),
        Some(Box::new(bias_covar)),
    )
    .unwrap();
    assert_eq!(process.dimension(), 7);

    process.process_measurements(&measurements).unwrap();
    let estimated_bias = process
        .estimated_measurement_parameters()
        .get("DSS-13-range-bias")
        .unwrap()
        .value();
    assert!(
        (estimated_bias - truth_bias_km).abs() < 0.05,
        "estimated bias {estimated_bias:.4} km vs truth {truth_bias_km} km"
    );
}
