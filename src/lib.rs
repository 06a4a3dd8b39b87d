//! # sirs-sweep: SIRS epidemic trajectories and initial-condition sweeps
//!
//! Integrates the SIRS compartmental model (susceptible, infected,
//! recovered with waning immunity) with an adaptive Dormand–Prince 5(4)
//! solver, reports the solution on a fixed time grid, sweeps the initial
//! number of infected, and renders a time series and an S-I phase portrait.
//!
//! ## Features
//!
//! - 7-stage embedded RK5(4) pair with adaptive step control and
//!   automatic initial step selection
//! - Dense reporting on arbitrary time grids without interpolation: steps
//!   are truncated to land on every report time
//! - **Event finding** with Brent's method, used to locate the infection peak
//! - Typed errors for invalid parameters, grids and solver failures
//!
//! ## Basic Usage
//!
//! ```rust
//! use sirs_sweep::{simulate, Parameters, State, TimeGrid};
//!
//! let params = Parameters::new(1.0, 0.5, 0.1, 0.01);
//! let grid = TimeGrid::linspace(0.0, 160.0, 160).unwrap();
//! let trajectory = simulate(&params, State::new(0.8, 0.1, 0.1), &grid).unwrap();
//!
//! assert_eq!(trajectory.len(), 160);
//! let (t_peak, i_peak) = trajectory.peak_infected().unwrap();
//! assert!(t_peak > 0.0 && i_peak > 0.1);
//! ```
//!
//! ## Sweeps
//!
//! ```rust
//! use sirs_sweep::{sweep, Parameters, SweepConfig, TimeGrid};
//!
//! let grid = TimeGrid::linspace(0.0, 50.0, 51).unwrap();
//! let runs = sweep(&Parameters::default(), &SweepConfig::default(), &grid).unwrap();
//! assert_eq!(runs.len(), 20);
//! ```
//!
//! ## Using the solver directly
//!
//! Any system implementing [`OdeSystem`] can be integrated:
//!
//! ```rust
//! use sirs_sweep::{Dopri5, OdeSystem, Tolerances};
//!
//! struct Decay { k: f64 }
//!
//! impl OdeSystem<1> for Decay {
//!     fn rhs(&self, _t: f64, y: &[f64; 1], dydt: &mut [f64; 1]) {
//!         dydt[0] = -self.k * y[0];
//!     }
//! }
//!
//! let mut solver = Dopri5::new(Tolerances::new(1e-10, 1e-10));
//! let (t, y) = solver.integrate(&Decay { k: 0.5 }, 0.0, &[1.0], 2.0, 0.1).unwrap();
//! assert_eq!(t, 2.0);
//! assert!((y[0] - (-1.0f64).exp()).abs() < 1e-8);
//! ```
//!
//! ## References
//!
//! 1. Dormand, J.R., & Prince, P.J. (1980). "A family of embedded
//!    Runge-Kutta formulae". J. Comp. Appl. Math. 6(1), 19–26.
//!
//! 2. Hairer, E., Nørsett, S.P., & Wanner, G. (1993). "Solving
//!    Ordinary Differential Equations I: Nonstiff Problems".
//!    Springer.
//!
//! 3. Brent, R.P. (1973). "Algorithms for Minimization without
//!    Derivatives". Prentice-Hall.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod coefficients;
pub mod config;
pub mod driver;
pub mod events;
pub mod grid;
pub mod logging;
pub mod model;
pub mod plot;
pub mod solver;
pub mod trajectory;

pub use config::{ConfigError, RunConfig};
pub use driver::{
    baseline, find_infection_peak, run_sweep, simulate, sweep, write_sweep_csv, SimulationError,
    SweepConfig, SweepRun,
};
pub use events::{
    BrentError, BrentSolver, EventAction, EventConfig, EventDirection, EventFunction, EventResult,
};
pub use grid::{GridError, TimeGrid};
pub use model::{derivative, InfectionPeak, ParameterError, Parameters, SirsModel, State};
pub use plot::PlotError;
pub use solver::{
    Dopri5, IntegrationError, IntegrationResult, OdeSystem, Stats, StepController, StepResult,
    Tolerances, DEFAULT_TOLERANCE,
};
pub use trajectory::Trajectory;
