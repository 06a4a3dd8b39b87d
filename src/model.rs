//! SIRS compartmental model
//!
//! Susceptible → Infected → Recovered → Susceptible, with mass-action
//! transmission normalised by the total population:
//!
//! ```text
//! dS/dt = -β S I / N + ζ R
//! dI/dt =  β S I / N - γ I
//! dR/dt =  γ I - ζ R
//! ```
//!
//! The three rates sum to zero, so S + I + R is conserved. The system is
//! autonomous; the time argument of the right-hand side is ignored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::EventFunction;
use crate::solver::OdeSystem;

/// Epidemiological parameters of one integration.
///
/// Rates are per unit time (days in the default scenario).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Total population N
    pub population: f64,
    /// Contact rate β
    pub beta: f64,
    /// Recovery rate γ
    pub gamma: f64,
    /// Immunity-waning rate ζ (0 gives a plain SIR model)
    pub zeta: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            population: 1.0,
            beta: 0.5,
            gamma: 0.1,
            zeta: 0.01,
        }
    }
}

impl Parameters {
    /// Create a parameter set
    pub fn new(population: f64, beta: f64, gamma: f64, zeta: f64) -> Self {
        Self {
            population,
            beta,
            gamma,
            zeta,
        }
    }

    /// Same parameters with a different waning rate
    pub fn with_zeta(self, zeta: f64) -> Self {
        Self { zeta, ..self }
    }

    /// Reject parameter sets the model is not meant for.
    ///
    /// The derivative itself never validates; this is called by the driver
    /// before integrating.
    pub fn validate(&self) -> Result<(), ParameterError> {
        if !self.population.is_finite() || self.population <= 0.0 {
            return Err(ParameterError::Population(self.population));
        }
        for (name, value) in [("beta", self.beta), ("gamma", self.gamma), ("zeta", self.zeta)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ParameterError::Rate { name, value });
            }
        }
        Ok(())
    }

    /// Basic reproduction number β/γ
    pub fn basic_reproduction_number(&self) -> f64 {
        self.beta / self.gamma
    }

    /// Endemic equilibrium of the SIRS system, if one exists.
    ///
    /// Requires β > γ (otherwise the infection dies out) and γ + ζ > 0.
    /// With ζ = 0 the equilibrium degenerates to I* = 0.
    pub fn endemic_equilibrium(&self) -> Option<State> {
        if self.beta <= self.gamma || self.gamma + self.zeta <= 0.0 {
            return None;
        }
        let n = self.population;
        let s = self.gamma * n / self.beta;
        let removed = n - s;
        Some(State {
            s,
            i: self.zeta * removed / (self.gamma + self.zeta),
            r: self.gamma * removed / (self.gamma + self.zeta),
        })
    }
}

/// Invalid model input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    /// Population must be positive and finite
    #[error("population must be positive and finite, got {0}")]
    Population(f64),
    /// Rates must be non-negative and finite
    #[error("{name} must be non-negative and finite, got {value}")]
    Rate {
        /// Parameter name
        name: &'static str,
        /// Offending value
        value: f64,
    },
    /// Initial compartment sizes must be finite
    #[error("initial state must be finite, got {0:?}")]
    InitialState(State),
}

/// Compartment sizes (S, I, R)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct State {
    /// Susceptible
    pub s: f64,
    /// Infected
    pub i: f64,
    /// Recovered
    pub r: f64,
}

impl State {
    /// Create a state
    pub fn new(s: f64, i: f64, r: f64) -> Self {
        Self { s, i, r }
    }

    /// Initial state with everyone not infected or recovered susceptible:
    /// S0 = N - I0 - R0
    pub fn from_infected_recovered(population: f64, i0: f64, r0: f64) -> Self {
        Self {
            s: population - i0 - r0,
            i: i0,
            r: r0,
        }
    }

    /// S + I + R
    pub fn total(&self) -> f64 {
        self.s + self.i + self.r
    }

    /// Whether all three components are finite
    pub fn is_finite(&self) -> bool {
        self.s.is_finite() && self.i.is_finite() && self.r.is_finite()
    }
}

impl From<[f64; 3]> for State {
    fn from(y: [f64; 3]) -> Self {
        Self {
            s: y[0],
            i: y[1],
            r: y[2],
        }
    }
}

impl From<State> for [f64; 3] {
    fn from(state: State) -> Self {
        [state.s, state.i, state.r]
    }
}

/// Rates of change of the three compartments.
///
/// A non-positive population is not checked here and propagates as
/// ordinary floating-point inf/NaN.
pub fn derivative(state: &State, params: &Parameters) -> State {
    let infection = params.beta * state.s * state.i / params.population;
    let recovery = params.gamma * state.i;
    let waning = params.zeta * state.r;
    State {
        s: -infection + waning,
        i: infection - recovery,
        r: recovery - waning,
    }
}

/// The SIRS model as an ODE system over `[S, I, R]`.
#[derive(Debug, Clone, Copy)]
pub struct SirsModel {
    params: Parameters,
}

impl SirsModel {
    /// Wrap a parameter set
    pub fn new(params: Parameters) -> Self {
        Self { params }
    }

    /// Parameters of this model
    pub fn params(&self) -> &Parameters {
        &self.params
    }
}

impl OdeSystem<3> for SirsModel {
    fn rhs(&self, _t: f64, y: &[f64; 3], dydt: &mut [f64; 3]) {
        *dydt = derivative(&State::from(*y), &self.params).into();
    }
}

/// Zero when prevalence stops growing.
///
/// dI/dt = I (β S / N - γ), so for I > 0 the sign of dI/dt is the sign of
/// β S / N - γ. Its falling crossing is the infection peak; a rising
/// crossing marks the start of a new wave.
#[derive(Debug, Clone, Copy)]
pub struct InfectionPeak {
    params: Parameters,
}

impl InfectionPeak {
    /// Peak detector for a parameter set
    pub fn new(params: Parameters) -> Self {
        Self { params }
    }
}

impl EventFunction<3> for InfectionPeak {
    fn eval(&self, _t: f64, y: &[f64; 3]) -> f64 {
        self.params.beta * y[0] / self.params.population - self.params.gamma
    }
}
