//! Baseline runs and initial-condition sweeps
//!
//! Every run gets its own solver and an explicit, immutable parameter set;
//! runs share nothing else, so a sweep is a plain sequence of independent
//! integrations over the same time grid.

use std::io::Write;

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{EventConfig, EventDirection, EventResult};
use crate::grid::{linspace, GridError, TimeGrid};
use crate::model::{InfectionPeak, ParameterError, Parameters, SirsModel, State};
use crate::solver::{Dopri5, IntegrationError, IntegrationResult};
use crate::trajectory::{Row, Trajectory};

/// Errors from running a simulation
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Parameters or initial state rejected before integrating
    #[error(transparent)]
    Parameters(#[from] ParameterError),
    /// Invalid report grid
    #[error(transparent)]
    Grid(#[from] GridError),
    /// The solver failed
    #[error("integration failed")]
    Integration(#[from] IntegrationError),
    /// Invalid sweep definition
    #[error("invalid sweep: {0}")]
    InvalidSweep(String),
    /// One point of a sweep failed; the sweep stops there
    #[error("sweep point I0 = {i0} failed")]
    SweepPoint {
        /// Initial infected value of the failed run
        i0: f64,
        /// Why it failed
        #[source]
        source: Box<SimulationError>,
    },
}

/// Range of initial infected values to sweep, with R0 held fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// First I0 value
    pub i0_start: f64,
    /// Last I0 value (included)
    pub i0_end: f64,
    /// Number of evenly spaced I0 values
    pub count: usize,
    /// Initial recovered, shared by every run
    pub r0: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            i0_start: 0.02,
            i0_end: 0.3,
            count: 20,
            r0: 0.1,
        }
    }
}

impl SweepConfig {
    /// Check bounds and count
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.count == 0 {
            return Err(SimulationError::InvalidSweep(
                "count must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("i0_start", self.i0_start),
            ("i0_end", self.i0_end),
            ("r0", self.r0),
        ] {
            if !value.is_finite() {
                return Err(SimulationError::InvalidSweep(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// The I0 values, in sweep order
    pub fn initial_values(&self) -> Vec<f64> {
        linspace(self.i0_start, self.i0_end, self.count)
    }

    /// Initial state for one sweep point: (N - I0 - R0, I0, R0)
    pub fn initial_state(&self, population: f64, i0: f64) -> State {
        State::from_infected_recovered(population, i0, self.r0)
    }
}

/// One sweep point and its trajectory
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRun {
    /// Initial infected value
    pub i0: f64,
    /// Solution on the shared grid
    pub trajectory: Trajectory,
}

/// Integrate the SIRS model from `initial` and report it on `grid`.
///
/// Parameters are validated first. Solver failures are returned, never
/// retried.
pub fn simulate(
    params: &Parameters,
    initial: State,
    grid: &TimeGrid,
) -> Result<Trajectory, SimulationError> {
    params.validate()?;
    if !initial.is_finite() {
        return Err(ParameterError::InitialState(initial).into());
    }

    let model = SirsModel::new(*params);
    let mut solver = Dopri5::<3>::default();
    let states = solver.integrate_grid(&model, &initial.into(), grid.as_slice())?;
    trace!(
        "run from {:?}: {} steps ({} rejected)",
        initial,
        solver.stats.accepted_steps,
        solver.stats.rejected_steps
    );

    Ok(Trajectory::new(
        grid.as_slice().to_vec(),
        states.into_iter().map(State::from).collect(),
    ))
}

/// Baseline run from S0 = N - I0 - R0.
pub fn baseline(
    params: &Parameters,
    i0: f64,
    r0: f64,
    grid: &TimeGrid,
) -> Result<Trajectory, SimulationError> {
    let initial = State::from_infected_recovered(params.population, i0, r0);
    info!(
        "baseline run: S0 = {}, I0 = {}, R0 = {}, beta = {}, gamma = {}, zeta = {}",
        initial.s, initial.i, initial.r, params.beta, params.gamma, params.zeta
    );
    simulate(params, initial, grid)
}

/// Run every sweep point in order, calling `on_run` after each one.
///
/// Returns exactly `sweep.count` runs. The first failing point aborts the
/// sweep.
pub fn run_sweep<F>(
    params: &Parameters,
    sweep: &SweepConfig,
    grid: &TimeGrid,
    mut on_run: F,
) -> Result<Vec<SweepRun>, SimulationError>
where
    F: FnMut(usize, &SweepRun),
{
    sweep.validate()?;
    params.validate()?;

    let values = sweep.initial_values();
    info!(
        "sweeping {} values of I0 in [{}, {}] with R0 = {}",
        values.len(),
        sweep.i0_start,
        sweep.i0_end,
        sweep.r0
    );

    let mut runs = Vec::with_capacity(values.len());
    for (index, i0) in values.into_iter().enumerate() {
        let initial = sweep.initial_state(params.population, i0);
        let trajectory =
            simulate(params, initial, grid).map_err(|source| SimulationError::SweepPoint {
                i0,
                source: Box::new(source),
            })?;
        debug!("sweep point {index}: I0 = {i0} done");
        let run = SweepRun { i0, trajectory };
        on_run(index, &run);
        runs.push(run);
    }
    Ok(runs)
}

/// [`run_sweep`] without a progress callback.
pub fn sweep(
    params: &Parameters,
    sweep: &SweepConfig,
    grid: &TimeGrid,
) -> Result<Vec<SweepRun>, SimulationError> {
    run_sweep(params, sweep, grid, |_, _| {})
}

/// First infection peak (dI/dt falling through zero) before `t_end`.
///
/// `None` when prevalence only declines, never starts, or peaks after the
/// horizon.
pub fn find_infection_peak(
    params: &Parameters,
    initial: State,
    t_end: f64,
) -> Result<Option<EventResult<3>>, SimulationError> {
    params.validate()?;
    if !initial.is_finite() {
        return Err(ParameterError::InitialState(initial).into());
    }
    if initial.i <= 0.0 {
        return Ok(None);
    }

    let model = SirsModel::new(*params);
    let event = InfectionPeak::new(*params);
    let config = EventConfig {
        direction: EventDirection::Falling,
        ..Default::default()
    };
    let y0: [f64; 3] = initial.into();

    let mut solver = Dopri5::<3>::default();
    let h0 = solver.initial_step(&model, 0.0, &y0, t_end);
    match solver.integrate_to_event(&model, &event, &config, 0.0, &y0, t_end, h0)? {
        IntegrationResult::Event(peak) => {
            debug!("infection peak at t = {}, I = {}", peak.t, peak.y[1]);
            Ok(Some(peak))
        }
        IntegrationResult::Completed { .. } => Ok(None),
    }
}

/// Write all sweep runs as long-format `i0,t,S,I,R` rows with a header.
pub fn write_sweep_csv<W: Write>(writer: W, runs: &[SweepRun]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for run in runs {
        for (t, state) in run.trajectory.iter() {
            wtr.serialize(Row::new(Some(run.i0), t, state))?;
        }
    }
    wtr.flush()?;
    Ok(())
}
