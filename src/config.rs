//! Run configuration
//!
//! Every field has a default, so a JSON file only needs the values it
//! changes:
//!
//! ```json
//! { "baseline_zeta": 0.0, "sweep": { "count": 10 } }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::driver::{SimulationError, SweepConfig};
use crate::grid::{GridError, TimeGrid};
use crate::model::{ParameterError, Parameters, State};

/// Failure to load a run configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("could not read config file {path}")]
    Read {
        /// Config file
        path: PathBuf,
        /// I/O failure
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid configuration
    #[error("could not parse config file {path}")]
    Parse {
        /// Config file
        path: PathBuf,
        /// JSON failure
        #[source]
        source: serde_json::Error,
    },
    /// Parameters out of range
    #[error(transparent)]
    Parameters(#[from] ParameterError),
    /// Output grid is invalid
    #[error(transparent)]
    Grid(#[from] GridError),
    /// Sweep bounds or count are invalid
    #[error(transparent)]
    Sweep(#[from] SimulationError),
}

/// Everything one invocation needs: model rates, baseline and sweep inputs,
/// the report grid and output locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Total population N
    pub population: f64,
    /// Contact rate β
    pub beta: f64,
    /// Recovery rate γ
    pub gamma: f64,
    /// Waning rate ζ used by the sweep
    pub zeta: f64,
    /// Waning rate ζ used by the baseline run
    pub baseline_zeta: f64,
    /// Baseline initial infected
    pub baseline_i0: f64,
    /// Baseline initial recovered
    pub baseline_r0: f64,
    /// First report time
    pub t_start: f64,
    /// Last report time
    pub t_end: f64,
    /// Number of report times, endpoints included
    pub points: usize,
    /// Initial-condition sweep
    pub sweep: SweepConfig,
    /// Directory for figures and CSV files
    pub output_dir: PathBuf,
    /// Time-series figure name
    pub time_series_file: String,
    /// Phase-portrait figure name
    pub phase_portrait_file: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        let params = Parameters::default();
        Self {
            population: params.population,
            beta: params.beta,
            gamma: params.gamma,
            zeta: params.zeta,
            baseline_zeta: params.zeta,
            baseline_i0: 0.1,
            baseline_r0: 0.1,
            t_start: 0.0,
            t_end: 160.0,
            points: 160,
            sweep: SweepConfig::default(),
            output_dir: PathBuf::from("."),
            time_series_file: "sir_time_series.svg".to_string(),
            phase_portrait_file: "phaseportrait_S_I.svg".to_string(),
        }
    }
}

impl RunConfig {
    /// Read a JSON configuration; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check rates and the report grid without running anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.baseline_params().validate()?;
        self.sweep_params().validate()?;
        let initial = self.baseline_initial_state();
        if !initial.is_finite() {
            return Err(ParameterError::InitialState(initial).into());
        }
        self.sweep.validate()?;
        self.grid()?;
        Ok(())
    }

    /// Parameters of the baseline run
    pub fn baseline_params(&self) -> Parameters {
        self.sweep_params().with_zeta(self.baseline_zeta)
    }

    /// Parameters of every sweep run
    pub fn sweep_params(&self) -> Parameters {
        Parameters::new(self.population, self.beta, self.gamma, self.zeta)
    }

    /// Baseline (S0, I0, R0)
    pub fn baseline_initial_state(&self) -> State {
        State::from_infected_recovered(self.population, self.baseline_i0, self.baseline_r0)
    }

    /// Report grid shared by all runs
    pub fn grid(&self) -> Result<TimeGrid, GridError> {
        TimeGrid::linspace(self.t_start, self.t_end, self.points)
    }

    /// Where the time-series figure goes
    pub fn time_series_path(&self) -> PathBuf {
        self.output_dir.join(&self.time_series_file)
    }

    /// Where the phase-portrait figure goes
    pub fn phase_portrait_path(&self) -> PathBuf {
        self.output_dir.join(&self.phase_portrait_file)
    }
}
