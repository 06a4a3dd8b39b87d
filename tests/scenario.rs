//! End-to-end checks of the reference SIRS scenario and the I0 sweep.
//!
//! Scenario: N = 1, β = 0.5, γ = 0.1, ζ = 0.01, (S, I, R) = (0.8, 0.1, 0.1),
//! 160 report times on [0, 160].

use approx::assert_abs_diff_eq;
use sirs_sweep::{
    baseline, find_infection_peak, run_sweep, simulate, sweep, Parameters, SimulationError, State,
    SweepConfig, TimeGrid,
};

fn reference_params() -> Parameters {
    Parameters::new(1.0, 0.5, 0.1, 0.01)
}

fn reference_grid() -> TimeGrid {
    TimeGrid::linspace(0.0, 160.0, 160).unwrap()
}

const INITIAL: State = State {
    s: 0.8,
    i: 0.1,
    r: 0.1,
};

#[test]
fn test_population_is_conserved() {
    let params = reference_params();
    let traj = simulate(&params, INITIAL, &reference_grid()).unwrap();
    assert_eq!(traj.len(), 160);
    // Runge-Kutta stages preserve linear invariants up to rounding
    assert!(traj.max_total_deviation(1.0) < 1e-12);

    let large = Parameters::new(10_000.0, 0.3, 0.05, 0.002);
    let initial = State::new(9_990.0, 10.0, 0.0);
    let traj = simulate(&large, initial, &reference_grid()).unwrap();
    assert!(traj.max_total_deviation(10_000.0) < 1e-8);
}

#[test]
fn test_first_entry_is_initial_state() {
    let traj = simulate(&reference_params(), INITIAL, &reference_grid()).unwrap();
    assert_eq!(traj.first(), Some(&INITIAL));
    assert_eq!(traj.times()[0], 0.0);
    assert_eq!(traj.times()[159], 160.0);
}

#[test]
fn test_runs_are_deterministic() {
    let a = simulate(&reference_params(), INITIAL, &reference_grid()).unwrap();
    let b = simulate(&reference_params(), INITIAL, &reference_grid()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_no_infected_stays_uninfected() {
    let initial = State::new(0.9, 0.0, 0.1);
    let traj = simulate(&reference_params(), initial, &reference_grid()).unwrap();
    assert!(traj.infected().iter().all(|&i| i == 0.0));
    // Waning still moves recovered back to susceptible
    let last = traj.last().unwrap();
    assert!(last.s > 0.9 && last.r < 0.1);
}

#[test]
fn test_wave_rises_then_settles_toward_endemic_level() {
    let traj = simulate(&reference_params(), INITIAL, &reference_grid()).unwrap();
    let infected = traj.infected();

    let (t_peak, i_peak) = traj.peak_infected().unwrap();
    assert!(t_peak > 5.0 && t_peak < 15.0, "peak at t = {t_peak}");
    assert!(i_peak > 0.4 && i_peak < 0.45, "peak I = {i_peak}");
    assert!(infected[1] > infected[0]);

    let i_end = infected[infected.len() - 1];
    assert!(i_end < i_peak);
    assert!(i_end > 0.01, "waning keeps the infection endemic, I(160) = {i_end}");
}

#[test]
fn test_waning_immunity_sustains_infection() {
    let params = reference_params();
    let grid = reference_grid();
    let sirs = baseline(&params, 0.1, 0.1, &grid).unwrap();
    let sir = baseline(&params.with_zeta(0.0), 0.1, 0.1, &grid).unwrap();

    let sirs_end = sirs.last().unwrap().i;
    let sir_end = sir.last().unwrap().i;
    assert!(sir_end < 1e-5, "plain SIR dies out, I(160) = {sir_end}");
    assert!(sirs_end > 100.0 * sir_end);
}

#[test]
fn test_long_run_reaches_endemic_equilibrium() {
    let params = reference_params();
    let grid = TimeGrid::linspace(0.0, 3000.0, 301).unwrap();
    let traj = simulate(&params, INITIAL, &grid).unwrap();
    let eq = params.endemic_equilibrium().unwrap();
    let last = traj.last().unwrap();

    assert_abs_diff_eq!(last.s, eq.s, epsilon = 1e-4);
    assert_abs_diff_eq!(last.i, eq.i, epsilon = 1e-4);
    assert_abs_diff_eq!(last.r, eq.r, epsilon = 1e-4);
}

#[test]
fn test_peak_event_matches_fine_grid_maximum() {
    let params = reference_params();
    let peak = find_infection_peak(&params, INITIAL, 160.0)
        .unwrap()
        .expect("reference scenario has a peak");

    let fine = TimeGrid::linspace(0.0, 20.0, 2001).unwrap();
    let (t_max, i_max) = simulate(&params, INITIAL, &fine)
        .unwrap()
        .peak_infected()
        .unwrap();

    assert_abs_diff_eq!(peak.t, t_max, epsilon = 0.01);
    assert_abs_diff_eq!(peak.y[1], i_max, epsilon = 1e-5);
    // dI/dt = 0 exactly where S = γN/β
    assert_abs_diff_eq!(peak.y[0], 0.2, epsilon = 1e-6);
}

#[test]
fn test_sweep_produces_one_distinct_run_per_point() {
    let params = reference_params();
    let config = SweepConfig::default();
    let runs = sweep(&params, &config, &reference_grid()).unwrap();

    assert_eq!(runs.len(), 20);
    assert_abs_diff_eq!(runs[0].i0, 0.02, epsilon = 1e-15);
    assert_abs_diff_eq!(runs[19].i0, 0.3, epsilon = 1e-15);

    for (run, i0) in runs.iter().zip(config.initial_values()) {
        assert_eq!(run.i0, i0);
        assert_eq!(run.trajectory.len(), 160);
        let first = run.trajectory.first().unwrap();
        assert_abs_diff_eq!(first.s, 1.0 - i0 - 0.1, epsilon = 1e-15);
        assert_eq!(first.r, 0.1);
    }
    for pair in runs.windows(2) {
        assert_ne!(
            pair[0].trajectory.susceptible(),
            pair[1].trajectory.susceptible()
        );
    }
}

#[test]
fn test_sweep_runs_match_independent_simulations() {
    let params = reference_params();
    let config = SweepConfig {
        count: 4,
        ..Default::default()
    };
    let grid = reference_grid();
    let runs = sweep(&params, &config, &grid).unwrap();

    for run in &runs {
        let alone = simulate(&params, config.initial_state(1.0, run.i0), &grid).unwrap();
        assert_eq!(run.trajectory, alone);
    }
}

#[test]
fn test_sweep_reports_progress_in_order() {
    let mut seen = Vec::new();
    let runs = run_sweep(
        &reference_params(),
        &SweepConfig::default(),
        &TimeGrid::linspace(0.0, 10.0, 11).unwrap(),
        |index, run| seen.push((index, run.i0)),
    )
    .unwrap();

    assert_eq!(seen.len(), 20);
    for (k, (index, i0)) in seen.iter().enumerate() {
        assert_eq!(*index, k);
        assert_eq!(*i0, runs[k].i0);
    }
}

#[test]
fn test_invalid_inputs_are_rejected() {
    let grid = reference_grid();
    assert!(matches!(
        simulate(&Parameters::new(0.0, 0.5, 0.1, 0.01), INITIAL, &grid),
        Err(SimulationError::Parameters(_))
    ));
    assert!(matches!(
        simulate(&reference_params(), State::new(f64::NAN, 0.1, 0.1), &grid),
        Err(SimulationError::Parameters(_))
    ));
    let empty = SweepConfig {
        count: 0,
        ..Default::default()
    };
    assert!(matches!(
        sweep(&reference_params(), &empty, &grid),
        Err(SimulationError::InvalidSweep(_))
    ));
}
