//! Dormand-Prince 5(4) Integrator
//!
//! A 7-stage embedded RK5(4) pair with adaptive step-size control. The
//! 5th-order solution is propagated and the embedded 4th-order solution
//! drives the error estimate.
//!
//! Besides integrating to a single endpoint, the solver can report the
//! solution on a caller-supplied time grid: steps are truncated to land on
//! every grid point and the adapted step size is carried across intervals,
//! so the grid only decides where the solution is sampled, not how finely it
//! is computed.

use log::{debug, trace};
use thiserror::Error;

use crate::coefficients::{A, B, B_ERR, C, EMBEDDED_ORDER, STAGES};
use crate::events::{
    sign_change_detected, BrentError, BrentSolver, EventAction, EventConfig, EventFunction,
    EventResult,
};

/// Default relative and absolute tolerance.
///
/// Matches the defaults of LSODA-style `odeint` drivers.
pub const DEFAULT_TOLERANCE: f64 = 1.49012e-8;

/// System of ordinary differential equations: dy/dt = f(t, y)
pub trait OdeSystem<const N: usize> {
    /// Evaluate the right-hand side of the ODE system
    ///
    /// # Arguments
    /// * `t` - Current time
    /// * `y` - Current state vector
    /// * `dydt` - Output: derivative dy/dt
    fn rhs(&self, t: f64, y: &[f64; N], dydt: &mut [f64; N]);
}

/// Integration result from a single step
#[derive(Debug, Clone)]
pub struct StepResult<const N: usize> {
    /// New state after the step (5th order solution)
    pub y: [f64; N],
    /// New time value
    pub t: f64,
    /// Normalized error estimate (should be ≤ 1.0 for acceptance)
    pub error: f64,
    /// Suggested magnitude of the next step
    pub h_next: f64,
    /// Whether the step was accepted
    pub accepted: bool,
}

/// Integration statistics for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Total number of function evaluations
    pub fn_evals: u64,
    /// Number of accepted steps
    pub accepted_steps: u64,
    /// Number of rejected steps
    pub rejected_steps: u64,
}

/// Step-size controller using an I-controller
///
/// h_new = safety * h * error^(-1/(q+1)), q = 4 for the embedded solution
#[derive(Debug, Clone)]
pub struct StepController {
    /// Safety factor (0.8-0.9 typical)
    pub safety: f64,
    /// Maximum growth factor per step
    pub max_factor: f64,
    /// Minimum reduction factor per step
    pub min_factor: f64,
    exponent: f64,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            max_factor: 10.0,
            min_factor: 0.2,
            exponent: 1.0 / (f64::from(EMBEDDED_ORDER) + 1.0),
        }
    }
}

impl StepController {
    /// Compute the step size adjustment factor
    pub fn compute_factor(&self, error: f64) -> f64 {
        if error == 0.0 {
            return self.max_factor;
        }

        let factor = self.safety * error.powf(-self.exponent);
        factor.clamp(self.min_factor, self.max_factor)
    }
}

/// Tolerance specification for error control
///
/// Error is computed as: |y5 - y4| / (atol + rtol * |y5|)
#[derive(Debug, Clone)]
pub struct Tolerances<const N: usize> {
    /// Absolute tolerance per component
    pub atol: [f64; N],
    /// Relative tolerance per component
    pub rtol: [f64; N],
}

impl<const N: usize> Tolerances<N> {
    /// Create tolerances with uniform values
    pub fn new(atol: f64, rtol: f64) -> Self {
        Self {
            atol: [atol; N],
            rtol: [rtol; N],
        }
    }

    /// Create tolerances with per-component values
    pub fn with_components(atol: [f64; N], rtol: [f64; N]) -> Self {
        Self { atol, rtol }
    }
}

impl<const N: usize> Default for Tolerances<N> {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE, DEFAULT_TOLERANCE)
    }
}

/// Dormand-Prince 5(4) integrator
///
/// # Type Parameters
/// * `N` - Dimension of the state vector
///
/// # Example
/// ```ignore
/// use sirs_sweep::{Dopri5, OdeSystem, Tolerances};
///
/// struct Logistic { r: f64 }
///
/// impl OdeSystem<1> for Logistic {
///     fn rhs(&self, _t: f64, y: &[f64; 1], dydt: &mut [f64; 1]) {
///         dydt[0] = self.r * y[0] * (1.0 - y[0]);
///     }
/// }
///
/// let mut solver = Dopri5::new(Tolerances::new(1e-10, 1e-10));
/// let states = solver.integrate_grid(&Logistic { r: 0.5 }, &[0.01], &[0.0, 5.0, 10.0])?;
/// ```
#[derive(Debug, Clone)]
pub struct Dopri5<const N: usize> {
    tol: Tolerances<N>,
    controller: StepController,
    /// Minimum step size
    pub h_min: f64,
    /// Maximum step size
    pub h_max: f64,
    /// Maximum number of attempted steps per call before error
    pub max_steps: u64,
    k: [[f64; N]; STAGES],
    /// Integration statistics
    pub stats: Stats,
    /// Events collected during `integrate_to_event` with `EventAction::Continue`.
    /// Cleared at the start of each `integrate_to_event` call.
    pub collected_events: Vec<EventResult<N>>,
}

impl<const N: usize> Default for Dopri5<N> {
    fn default() -> Self {
        Self::new(Tolerances::default())
    }
}

impl<const N: usize> Dopri5<N> {
    /// Create a new solver with specified tolerances
    pub fn new(tol: Tolerances<N>) -> Self {
        Self {
            tol,
            controller: StepController::default(),
            h_min: 1e-12,
            h_max: f64::INFINITY,
            max_steps: 1_000_000,
            k: [[0.0; N]; STAGES],
            stats: Stats::default(),
            collected_events: Vec::new(),
        }
    }

    /// Tolerances used for error control
    pub fn tolerances(&self) -> &Tolerances<N> {
        &self.tol
    }

    /// Set minimum and maximum step sizes
    pub fn set_step_limits(&mut self, h_min: f64, h_max: f64) {
        self.h_min = h_min;
        self.h_max = h_max;
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.stats = Stats::default();
    }

    /// Perform a single integration step
    ///
    /// Computes the 7 stages, forms the 5th order solution, estimates the
    /// error against the embedded 4th order solution and decides acceptance.
    pub fn step<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t: f64,
        y: &[f64; N],
        h: f64,
    ) -> StepResult<N> {
        let h = h.signum() * h.abs().clamp(self.h_min, self.h_max);

        self.compute_stages(sys, t, y, h);
        let y5 = self.compute_solution(y, h);
        let error = self.compute_error(y, &y5, h);
        // NaN stages (overflow inside the step) count as an unbounded error
        let error = if error.is_nan() { f64::INFINITY } else { error };
        let accepted = error <= 1.0;

        let factor = self.controller.compute_factor(error);
        let h_next = (h.abs() * factor).clamp(self.h_min, self.h_max);

        self.stats.fn_evals += STAGES as u64;
        if accepted {
            self.stats.accepted_steps += 1;
        } else {
            self.stats.rejected_steps += 1;
            trace!("rejected step at t = {t}, h = {h}, error = {error:.3e}");
        }

        StepResult {
            y: y5,
            t: t + h,
            error,
            h_next,
            accepted,
        }
    }

    /// Integrate from t0 to tf
    ///
    /// # Returns
    /// * `Ok((t_final, y_final))` on success
    /// * `Err(IntegrationError)` on failure
    pub fn integrate<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
    ) -> Result<(f64, [f64; N]), IntegrationError> {
        if t0 == tf {
            return Ok((t0, *y0));
        }
        self.validate_inputs(t0, y0, tf, h0)?;

        let mut steps = 0u64;
        let (t, y, _) = self.advance(sys, t0, y0, tf, h0, &mut steps)?;
        Ok((t, y))
    }

    /// Integrate over a time grid, reporting the state at every grid point.
    ///
    /// `times` must hold at least two finite, strictly increasing values.
    /// The first returned state is `y0` itself; entry `i` is the state at
    /// `times[i]`. The initial step is chosen automatically.
    pub fn integrate_grid<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        y0: &[f64; N],
        times: &[f64],
    ) -> Result<Vec<[f64; N]>, IntegrationError> {
        validate_grid(times)?;
        let t0 = times[0];
        let t_end = times[times.len() - 1];
        self.validate_inputs(t0, y0, t_end, t_end - t0)?;
        let h0 = self.initial_step(sys, t0, y0, t_end);

        let mut out = Vec::with_capacity(times.len());
        out.push(*y0);

        let mut t = t0;
        let mut y = *y0;
        let mut h = h0;
        let mut steps = 0u64;
        for &t_next in &times[1..] {
            let (t_reached, y_reached, h_carry) =
                self.advance(sys, t, &y, t_next, h, &mut steps)?;
            t = t_reached;
            y = y_reached;
            h = h_carry;
            out.push(y);
        }

        debug!(
            "integrated {} grid points over [{t0}, {t_end}]: \
             {} accepted, {} rejected, {} evaluations",
            times.len(),
            self.stats.accepted_steps,
            self.stats.rejected_steps,
            self.stats.fn_evals
        );
        Ok(out)
    }

    /// Starting step size for an integration from `t0` towards `tf`.
    ///
    /// Hairer, Nørsett & Wanner, "Solving ODEs I", section II.4: balances
    /// the size of the state against its first and second derivative.
    pub fn initial_step<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
    ) -> f64 {
        let direction = if tf >= t0 { 1.0 } else { -1.0 };
        let span = (tf - t0).abs();

        let mut f0 = [0.0; N];
        sys.rhs(t0, y0, &mut f0);
        self.stats.fn_evals += 1;

        let scale: [f64; N] =
            std::array::from_fn(|i| self.tol.atol[i] + self.tol.rtol[i] * y0[i].abs());
        let d0 = rms_norm(y0, &scale);
        let d1 = rms_norm(&f0, &scale);

        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        };
        let h0 = h0.min(span);

        let y1: [f64; N] = std::array::from_fn(|i| y0[i] + direction * h0 * f0[i]);
        let mut f1 = [0.0; N];
        sys.rhs(t0 + direction * h0, &y1, &mut f1);
        self.stats.fn_evals += 1;

        let df: [f64; N] = std::array::from_fn(|i| f1[i] - f0[i]);
        let d2 = rms_norm(&df, &scale) / h0;

        let d_max = d1.max(d2);
        let h1 = if d_max <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d_max).powf(1.0 / (f64::from(EMBEDDED_ORDER) + 2.0))
        };

        let h = (100.0 * h0).min(h1).min(span).clamp(self.h_min, self.h_max);
        direction * h
    }

    /// Step from `(t0, y0)` to exactly `tf`, returning the final time, the
    /// final state and the signed step size to continue with.
    fn advance<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
        steps: &mut u64,
    ) -> Result<(f64, [f64; N], f64), IntegrationError> {
        let mut t = t0;
        let mut y = *y0;
        let mut h = h0;
        let direction = (tf - t0).signum();

        while (tf - t) * direction > self.h_min {
            h = direction * h.abs().min(self.h_max);
            // Don't overshoot the endpoint
            let truncated = (t + h - tf) * direction >= 0.0;
            let h_try = if truncated { tf - t } else { h };

            let result = self.step(sys, t, &y, h_try);

            if result.accepted {
                t = if truncated { tf } else { result.t };
                y = result.y;
                if !y.iter().all(|v| v.is_finite()) {
                    return Err(IntegrationError::NonFiniteState { t });
                }
                // Truncated steps keep the larger of the old and proposed sizes
                h = if truncated {
                    direction * result.h_next.max(h.abs())
                } else {
                    direction * result.h_next
                };
            } else {
                h = direction * result.h_next;
            }

            *steps += 1;
            if *steps > self.max_steps {
                return Err(IntegrationError::MaxStepsExceeded);
            }

            if !result.accepted && result.h_next <= self.h_min && (tf - t) * direction > self.h_min
            {
                return Err(IntegrationError::StepSizeTooSmall {
                    t,
                    h: result.h_next,
                });
            }
        }

        Ok((t, y, h))
    }

    #[allow(clippy::needless_range_loop)]
    fn compute_stages<S: OdeSystem<N>>(&mut self, sys: &S, t: f64, y: &[f64; N], h: f64) {
        let mut y_temp = [0.0; N];

        sys.rhs(t, y, &mut self.k[0]);

        for i in 1..STAGES {
            for n in 0..N {
                let mut sum = 0.0;
                for j in 0..i {
                    sum += A[i][j] * self.k[j][n];
                }
                y_temp[n] = y[n] + h * sum;
            }
            sys.rhs(t + C[i] * h, &y_temp, &mut self.k[i]);
        }
    }

    #[allow(clippy::needless_range_loop)]
    fn compute_solution(&self, y: &[f64; N], h: f64) -> [f64; N] {
        let mut y_new = [0.0; N];
        for n in 0..N {
            let mut sum = 0.0;
            for i in 0..STAGES {
                sum += B[i] * self.k[i][n];
            }
            y_new[n] = y[n] + h * sum;
        }
        y_new
    }

    /// Infinity norm of the scaled error estimate.
    ///
    /// The scale uses the larger of |y_n| and |y_{n+1}| so a component
    /// passing through zero does not force needlessly small steps.
    #[allow(clippy::needless_range_loop)]
    fn compute_error(&self, y: &[f64; N], y5: &[f64; N], h: f64) -> f64 {
        let mut max_err: f64 = 0.0;
        for n in 0..N {
            let mut err_n = 0.0;
            for i in 0..STAGES {
                err_n += B_ERR[i] * self.k[i][n];
            }
            err_n *= h;

            let scale = self.tol.atol[n] + self.tol.rtol[n] * y[n].abs().max(y5[n].abs());
            max_err = max_err.max(err_n.abs() / scale);
        }
        max_err
    }

    fn validate_inputs(
        &self,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
    ) -> Result<(), IntegrationError> {
        let invalid = |message: String| Err(IntegrationError::InvalidInput { message });

        for (name, value) in [("start time", t0), ("end time", tf), ("initial step", h0)] {
            if !value.is_finite() {
                return invalid(format!("{name} is {value}"));
            }
        }
        if h0 == 0.0 {
            return invalid("initial step is zero".to_string());
        }
        if tf != t0 && h0.signum() != (tf - t0).signum() {
            return invalid(format!("initial step {h0} points away from {tf}"));
        }
        if let Some(i) = y0.iter().position(|v| !v.is_finite()) {
            return invalid(format!("initial state component {i} is {}", y0[i]));
        }
        let tolerances = self.tol.atol.iter().zip(&self.tol.rtol).enumerate();
        for (i, (&atol, &rtol)) in tolerances {
            if !(atol.is_finite() && atol > 0.0) {
                return invalid(format!("absolute tolerance {i} is {atol}, needs > 0"));
            }
            if !(rtol.is_finite() && rtol >= 0.0) {
                return invalid(format!("relative tolerance {i} is {rtol}, needs >= 0"));
            }
        }
        Ok(())
    }

    /// Integrate until an event occurs or the final time is reached.
    ///
    /// The event function is evaluated after every accepted step. On a sign
    /// change matching `config.direction` the crossing time is refined with
    /// Brent's method on a Hermite cubic interpolant of the step, giving an
    /// O(h⁴) accurate event state.
    ///
    /// # Returns
    /// * `Ok(IntegrationResult::Event(event_result))` - Event was detected
    /// * `Ok(IntegrationResult::Completed { t, y })` - Reached tf without a stopping event
    /// * `Err(IntegrationError)` - Integration failed
    #[allow(clippy::too_many_arguments)]
    pub fn integrate_to_event<S, E>(
        &mut self,
        sys: &S,
        event: &E,
        config: &EventConfig,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
    ) -> Result<IntegrationResult<N>, IntegrationError>
    where
        S: OdeSystem<N>,
        E: EventFunction<N>,
    {
        if t0 == tf {
            return Ok(IntegrationResult::Completed { t: t0, y: *y0 });
        }
        self.validate_inputs(t0, y0, tf, h0)?;
        self.collected_events.clear();

        let mut t = t0;
        let mut y = *y0;
        let mut h = h0;
        let direction = (tf - t0).signum();
        let mut g_prev = event.eval(t, &y);
        let mut step_count = 0u64;

        while (tf - t) * direction > self.h_min {
            if (t + h - tf) * direction > 0.0 {
                h = tf - t;
            }

            let result = self.step(sys, t, &y, h);

            if result.accepted {
                if !result.y.iter().all(|v| v.is_finite()) {
                    return Err(IntegrationError::NonFiniteState { t: result.t });
                }
                let g_new = event.eval(result.t, &result.y);

                if sign_change_detected(g_prev, g_new, config.direction) {
                    let event_result = self.find_event_root(
                        sys, event, t, &y, result.t, &result.y, g_prev, g_new, config,
                    )?;
                    debug!("event detected at t = {}", event_result.t);

                    if config.action == EventAction::Stop {
                        return Ok(IntegrationResult::Event(event_result));
                    }
                    self.collected_events.push(event_result);
                }

                t = result.t;
                y = result.y;
                g_prev = g_new;
            }

            h = result.h_next * direction;

            step_count += 1;
            if step_count > self.max_steps {
                return Err(IntegrationError::MaxStepsExceeded);
            }

            if !result.accepted && result.h_next <= self.h_min && (tf - t) * direction > self.h_min
            {
                return Err(IntegrationError::StepSizeTooSmall {
                    t,
                    h: result.h_next,
                });
            }
        }

        Ok(IntegrationResult::Completed { t, y })
    }

    /// Locate the root of `g` inside one accepted step.
    #[allow(clippy::too_many_arguments)]
    fn find_event_root<S, E>(
        &mut self,
        sys: &S,
        event: &E,
        t_a: f64,
        y_a: &[f64; N],
        t_b: f64,
        y_b: &[f64; N],
        g_a: f64,
        g_b: f64,
        config: &EventConfig,
    ) -> Result<EventResult<N>, IntegrationError>
    where
        S: OdeSystem<N>,
        E: EventFunction<N>,
    {
        let solver = BrentSolver::new(config.root_tol, config.max_iter);

        let mut f_a = [0.0; N];
        let mut f_b = [0.0; N];
        sys.rhs(t_a, y_a, &mut f_a);
        sys.rhs(t_b, y_b, &mut f_b);
        self.stats.fn_evals += 2;

        let dt = t_b - t_a;
        let interpolate = |t: f64| -> [f64; N] {
            let s = (t - t_a) / dt;
            let s2 = s * s;
            let s3 = s2 * s;
            let h00 = 1.0 - 3.0 * s2 + 2.0 * s3;
            let h10 = s - 2.0 * s2 + s3;
            let h01 = 3.0 * s2 - 2.0 * s3;
            let h11 = s3 - s2;
            std::array::from_fn(|i| {
                h00 * y_a[i] + h10 * dt * f_a[i] + h01 * y_b[i] + h11 * dt * f_b[i]
            })
        };

        match solver.find_root(
            |t| event.eval(t, &interpolate(t)),
            t_a,
            t_b,
            Some(g_a),
            Some(g_b),
        ) {
            Ok((t_event, g_value, iterations)) => Ok(EventResult {
                t: t_event,
                y: interpolate(t_event),
                g_value,
                iterations,
            }),
            Err(BrentError::MaxIterations {
                current_best,
                f_value,
                iterations,
            }) => Ok(EventResult {
                t: current_best,
                y: interpolate(current_best),
                g_value: f_value,
                iterations,
            }),
            Err(e @ BrentError::NotBracketed { .. }) => Err(IntegrationError::EventFindingFailed {
                message: e.to_string(),
            }),
        }
    }
}

fn rms_norm<const N: usize>(v: &[f64; N], scale: &[f64; N]) -> f64 {
    if N == 0 {
        return 0.0;
    }
    let sum: f64 = v.iter().zip(scale).map(|(x, s)| (x / s).powi(2)).sum();
    (sum / N as f64).sqrt()
}

fn validate_grid(times: &[f64]) -> Result<(), IntegrationError> {
    if times.len() < 2 {
        return Err(IntegrationError::InvalidInput {
            message: format!("time grid needs at least 2 points, got {}", times.len()),
        });
    }
    if let Some(i) = times.iter().position(|t| !t.is_finite()) {
        return Err(IntegrationError::InvalidInput {
            message: format!("time grid point {} is not finite", i),
        });
    }
    if let Some(i) = times.windows(2).position(|w| w[1] <= w[0]) {
        return Err(IntegrationError::InvalidInput {
            message: format!(
                "time grid must be strictly increasing (t[{}] = {}, t[{}] = {})",
                i,
                times[i],
                i + 1,
                times[i + 1]
            ),
        });
    }
    Ok(())
}

/// Integration result from [`Dopri5::integrate_to_event`]
#[derive(Debug, Clone)]
pub enum IntegrationResult<const N: usize> {
    /// Integration completed normally (reached final time)
    Completed {
        /// Final time
        t: f64,
        /// Final state vector
        y: [f64; N],
    },
    /// Integration stopped at an event
    Event(EventResult<N>),
}

/// Solver failures
#[derive(Debug, Clone, Error)]
pub enum IntegrationError {
    /// The error estimate could not be met with the smallest allowed step
    #[error("step size {h} too small at t = {t}")]
    StepSizeTooSmall {
        /// Where the solver gave up
        t: f64,
        /// Rejected step size
        h: f64,
    },
    /// `max_steps` attempts were used up before the end time
    #[error("maximum number of integration steps exceeded")]
    MaxStepsExceeded,
    /// A bracketed event could not be refined
    #[error("event finding failed: {message}")]
    EventFindingFailed {
        /// Root finder message
        message: String,
    },
    /// Times, step, state, tolerances or grid rejected before integrating
    #[error("invalid input: {message}")]
    InvalidInput {
        /// What was rejected
        message: String,
    },
    /// An accepted step produced inf or NaN
    #[error("non-finite state at t = {t}")]
    NonFiniteState {
        /// Time of the offending step
        t: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventConfig, EventDirection};
    use approx::assert_abs_diff_eq;

    /// Harmonic oscillator: y'' + ω²y = 0
    struct HarmonicOscillator {
        omega: f64,
    }

    impl OdeSystem<2> for HarmonicOscillator {
        fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) {
            dydt[0] = y[1];
            dydt[1] = -self.omega * self.omega * y[0];
        }
    }

    /// Logistic growth: y' = r y (1 - y)
    struct Logistic {
        r: f64,
    }

    impl OdeSystem<1> for Logistic {
        fn rhs(&self, _t: f64, y: &[f64; 1], dydt: &mut [f64; 1]) {
            dydt[0] = self.r * y[0] * (1.0 - y[0]);
        }
    }

    fn logistic_exact(r: f64, y0: f64, t: f64) -> f64 {
        y0 / (y0 + (1.0 - y0) * (-r * t).exp())
    }

    struct Dummy;
    impl OdeSystem<1> for Dummy {
        fn rhs(&self, _t: f64, _y: &[f64; 1], dydt: &mut [f64; 1]) {
            dydt[0] = 0.0;
        }
    }

    #[test]
    fn test_harmonic_oscillator() {
        let sys = HarmonicOscillator { omega: 1.0 };
        let tf = 2.0 * std::f64::consts::PI;
        let mut solver = Dopri5::new(Tolerances::new(1e-12, 1e-12));

        let (t_final, y_final) = solver.integrate(&sys, 0.0, &[1.0, 0.0], tf, 0.1).unwrap();

        assert_abs_diff_eq!(t_final, tf, epsilon = 1e-12);
        assert_abs_diff_eq!(y_final[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(y_final[1], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_exponential_decay() {
        struct ExpDecay {
            lambda: f64,
        }
        impl OdeSystem<1> for ExpDecay {
            fn rhs(&self, _t: f64, y: &[f64; 1], dydt: &mut [f64; 1]) {
                dydt[0] = -self.lambda * y[0];
            }
        }

        let sys = ExpDecay { lambda: 0.1 };
        let mut solver = Dopri5::new(Tolerances::new(1e-14, 1e-12));
        let (tf, yf) = solver.integrate(&sys, 0.0, &[1.0], 10.0, 0.5).unwrap();

        let exact = (-0.1 * tf).exp();
        let rel_error = ((yf[0] - exact) / exact).abs();
        assert!(rel_error < 1e-10, "Relative error {} too large", rel_error);
    }

    #[test]
    fn test_order_of_convergence() {
        // y' = cos(t), y(0) = 0 => y = sin(t). Local error of a 5th order
        // method scales like h^6, so halving h should shrink it ~64x.
        struct CosOde;
        impl OdeSystem<1> for CosOde {
            fn rhs(&self, t: f64, _y: &[f64; 1], dydt: &mut [f64; 1]) {
                dydt[0] = t.cos();
            }
        }

        let mut solver = Dopri5::new(Tolerances::new(1.0, 1.0));
        let mut errors = Vec::new();
        for h in [0.8, 0.4, 0.2] {
            let result = solver.step(&CosOde, 0.3, &[0.3_f64.sin()], h);
            assert!(result.accepted, "Step with h={} should be accepted", h);
            errors.push((result.y[0] - (0.3 + h).sin()).abs());
        }
        for pair in errors.windows(2) {
            let ratio = pair[0] / pair[1];
            assert!(ratio > 30.0, "error ratio {} too small for 5th order", ratio);
        }
    }

    #[test]
    fn test_nan_tolerance_rejected() {
        let mut solver = Dopri5::new(Tolerances::new(f64::NAN, 1e-12));
        let result = solver.integrate(&Dummy, 0.0, &[1.0], 1.0, 0.1);
        assert!(matches!(result, Err(IntegrationError::InvalidInput { .. })));
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let mut solver = Dopri5::new(Tolerances::new(1e-12, -1e-12));
        let result = solver.integrate(&Dummy, 0.0, &[1.0], 1.0, 0.1);
        assert!(matches!(result, Err(IntegrationError::InvalidInput { .. })));
    }

    #[test]
    fn test_h0_wrong_sign_rejected() {
        let mut solver = Dopri5::default();
        let result = solver.integrate(&Dummy, 0.0, &[1.0], 1.0, -0.1);
        assert!(matches!(result, Err(IntegrationError::InvalidInput { .. })));
    }

    #[test]
    fn test_nan_initial_state_rejected() {
        let mut solver = Dopri5::default();
        let result = solver.integrate(&Dummy, 0.0, &[f64::NAN], 1.0, 0.1);
        assert!(matches!(result, Err(IntegrationError::InvalidInput { .. })));
    }

    #[test]
    fn test_zero_length_integration() {
        let mut solver = Dopri5::default();
        let (t, y) = solver.integrate(&Dummy, 5.0, &[42.0], 5.0, 0.1).unwrap();
        assert_eq!(t, 5.0);
        assert_eq!(y[0], 42.0);
        assert_eq!(solver.stats, Stats::default());
    }

    #[test]
    fn test_backward_integration() {
        let sys = HarmonicOscillator { omega: 1.0 };
        let tf = 2.0 * std::f64::consts::PI;
        let mut solver = Dopri5::new(Tolerances::new(1e-12, 1e-12));

        let (t_final, y_final) = solver.integrate(&sys, tf, &[1.0, 0.0], 0.0, -0.1).unwrap();

        assert_abs_diff_eq!(t_final, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(y_final[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(y_final[1], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_h_max_caps_oversized_h0() {
        let sys = HarmonicOscillator { omega: 1.0 };
        let mut solver = Dopri5::new(Tolerances::new(1e-10, 1e-10));
        solver.set_step_limits(1e-12, 0.5);

        let (t_final, y_final) = solver.integrate(&sys, 0.0, &[1.0, 0.0], 10.0, 100.0).unwrap();

        assert_eq!(t_final, 10.0);
        assert_abs_diff_eq!(y_final[0], 10.0_f64.cos(), epsilon = 1e-7);
        assert_abs_diff_eq!(y_final[1], -(10.0_f64.sin()), epsilon = 1e-7);
        assert!(solver.stats.accepted_steps >= 20);

        // Same cap going backwards
        let mut solver = Dopri5::new(Tolerances::new(1e-10, 1e-10));
        solver.set_step_limits(1e-12, 0.5);
        let (t_final, y_final) = solver
            .integrate(&sys, 10.0, &[10.0_f64.cos(), -(10.0_f64.sin())], 0.0, -100.0)
            .unwrap();

        assert_eq!(t_final, 0.0);
        assert_abs_diff_eq!(y_final[0], 1.0, epsilon = 1e-7);
        assert_abs_diff_eq!(y_final[1], 0.0, epsilon = 1e-7);
    }

    #[test]
    fn test_step_size_too_small_error() {
        // y' = -1/y^2 reaches the singularity at y = 0 almost immediately
        struct SingularOde;
        impl OdeSystem<1> for SingularOde {
            fn rhs(&self, _t: f64, y: &[f64; 1], dydt: &mut [f64; 1]) {
                dydt[0] = -1.0 / (y[0] * y[0] + 1e-30);
            }
        }

        let mut solver = Dopri5::new(Tolerances::new(1e-12, 1e-12));
        solver.h_min = 1e-4;

        let result = solver.integrate(&SingularOde, 0.0, &[0.001], 1.0, 0.0001);
        assert!(
            matches!(result, Err(IntegrationError::StepSizeTooSmall { .. })),
            "Expected StepSizeTooSmall, got {:?}",
            result
        );
    }

    #[test]
    fn test_max_steps_exceeded() {
        let mut solver = Dopri5::new(Tolerances::new(1e-12, 1e-12));
        solver.max_steps = 5;

        let sys = HarmonicOscillator { omega: 1.0 };
        let result = solver.integrate(&sys, 0.0, &[1.0, 0.0], 100.0, 0.01);
        assert!(
            matches!(result, Err(IntegrationError::MaxStepsExceeded)),
            "Expected MaxStepsExceeded, got {:?}",
            result
        );
    }

    #[test]
    fn test_nan_derivative_shrinks_to_failure() {
        struct NanOde;
        impl OdeSystem<1> for NanOde {
            fn rhs(&self, _t: f64, _y: &[f64; 1], dydt: &mut [f64; 1]) {
                dydt[0] = f64::NAN;
            }
        }
        let mut solver = Dopri5::default();
        let result = solver.integrate(&NanOde, 0.0, &[1.0], 1.0, 0.5);
        assert!(
            matches!(result, Err(IntegrationError::StepSizeTooSmall { .. })),
            "Expected StepSizeTooSmall, got {:?}",
            result
        );
    }

    #[test]
    fn test_step_rejection_with_large_h0() {
        let sys = HarmonicOscillator { omega: 1.0 };
        let tf = 2.0 * std::f64::consts::PI;
        let mut solver = Dopri5::new(Tolerances::new(1e-12, 1e-12));

        let (t_final, y_final) = solver.integrate(&sys, 0.0, &[1.0, 0.0], tf, 100.0).unwrap();

        assert_abs_diff_eq!(t_final, tf, epsilon = 1e-12);
        assert_abs_diff_eq!(y_final[0], 1.0, epsilon = 1e-8);
        assert!(solver.stats.rejected_steps > 0);
    }

    #[test]
    fn test_grid_first_entry_is_initial_state() {
        let mut solver = Dopri5::default();
        let y0 = [0.01];
        let states = solver
            .integrate_grid(&Logistic { r: 0.5 }, &y0, &[0.0, 1.0, 2.0])
            .unwrap();
        assert_eq!(states.len(), 3);
        assert_eq!(states[0], y0);
    }

    #[test]
    fn test_grid_matches_exact_solution() {
        let r = 0.5;
        let y0 = 0.01;
        let times: Vec<f64> = (0..=40).map(|i| i as f64 * 0.75).collect();
        let mut solver = Dopri5::default();

        let states = solver
            .integrate_grid(&Logistic { r }, &[y0], &times)
            .unwrap();

        for (t, y) in times.iter().zip(&states) {
            assert_abs_diff_eq!(y[0], logistic_exact(r, y0, *t), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_grid_resolution_does_not_change_accuracy() {
        // A coarse grid must not force coarse steps: both samplings agree at
        // the shared endpoint.
        let sys = HarmonicOscillator { omega: 1.0 };
        let mut coarse = Dopri5::new(Tolerances::new(1e-10, 1e-10));
        let mut fine = Dopri5::new(Tolerances::new(1e-10, 1e-10));
        let fine_grid: Vec<f64> = (0..=100).map(|i| i as f64 * 0.1).collect();

        let a = coarse.integrate_grid(&sys, &[1.0, 0.0], &[0.0, 10.0]).unwrap();
        let b = fine.integrate_grid(&sys, &[1.0, 0.0], &fine_grid).unwrap();

        assert_abs_diff_eq!(a[1][0], 10.0_f64.cos(), epsilon = 1e-7);
        assert_abs_diff_eq!(b[100][0], 10.0_f64.cos(), epsilon = 1e-7);
    }

    #[test]
    fn test_grid_is_deterministic() {
        let times: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let run = || {
            Dopri5::default()
                .integrate_grid(&Logistic { r: 0.3 }, &[0.05], &times)
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_grid_validation() {
        let mut solver = Dopri5::default();
        let sys = Logistic { r: 0.5 };
        for times in [
            vec![0.0],
            vec![],
            vec![0.0, 1.0, 1.0],
            vec![0.0, 2.0, 1.0],
            vec![0.0, f64::NAN],
        ] {
            let result = solver.integrate_grid(&sys, &[0.1], &times);
            assert!(
                matches!(result, Err(IntegrationError::InvalidInput { .. })),
                "grid {:?} should be rejected, got {:?}",
                times,
                result
            );
        }
    }

    #[test]
    fn test_initial_step_is_positive_and_bounded() {
        let mut solver = Dopri5::default();
        let h = solver.initial_step(&Logistic { r: 0.5 }, 0.0, &[0.1], 3.0);
        assert!(h > 0.0 && h <= 3.0, "h = {}", h);

        let h_back = solver.initial_step(&Logistic { r: 0.5 }, 3.0, &[0.1], 0.0);
        assert!(h_back < 0.0 && h_back >= -3.0, "h = {}", h_back);
    }

    /// y crosses a threshold
    struct ThresholdEvent {
        threshold: f64,
    }

    impl EventFunction<1> for ThresholdEvent {
        fn eval(&self, _t: f64, y: &[f64; 1]) -> f64 {
            y[0] - self.threshold
        }
    }

    #[test]
    fn test_event_logistic_half_point() {
        let r = 0.5;
        let y0 = 0.01;
        let event = ThresholdEvent { threshold: 0.5 };
        let config = EventConfig {
            direction: EventDirection::Rising,
            ..Default::default()
        };
        let mut solver = Dopri5::new(Tolerances::new(1e-12, 1e-12));

        let result = solver
            .integrate_to_event(&Logistic { r }, &event, &config, 0.0, &[y0], 50.0, 0.1)
            .unwrap();

        // y = 1/2 when e^{-rt} = y0 / (1 - y0)
        let t_exact = ((1.0 - y0) / y0).ln() / r;
        match result {
            IntegrationResult::Event(ev) => {
                assert_abs_diff_eq!(ev.t, t_exact, epsilon = 1e-7);
                assert_abs_diff_eq!(ev.y[0], 0.5, epsilon = 1e-7);
            }
            IntegrationResult::Completed { t, .. } => {
                panic!("expected event, completed at t = {}", t)
            }
        }
    }

    #[test]
    fn test_no_event_reaches_tf() {
        struct LinearOde;
        impl OdeSystem<1> for LinearOde {
            fn rhs(&self, _t: f64, _y: &[f64; 1], dydt: &mut [f64; 1]) {
                dydt[0] = 1.0;
            }
        }

        let event = ThresholdEvent { threshold: 100.0 };
        let mut solver = Dopri5::new(Tolerances::new(1e-12, 1e-12));
        let result = solver
            .integrate_to_event(&LinearOde, &event, &EventConfig::default(), 0.0, &[0.0], 5.0, 0.1)
            .unwrap();

        match result {
            IntegrationResult::Completed { t, y } => {
                assert_abs_diff_eq!(t, 5.0, epsilon = 1e-10);
                assert_abs_diff_eq!(y[0], 5.0, epsilon = 1e-10);
            }
            IntegrationResult::Event(_) => panic!("Should not have found an event"),
        }
    }

    #[test]
    fn test_event_direction_filters_crossings() {
        // Falling direction never fires on logistic growth
        let event = ThresholdEvent { threshold: 0.5 };
        let config = EventConfig {
            direction: EventDirection::Falling,
            ..Default::default()
        };
        let mut solver = Dopri5::default();
        let result = solver
            .integrate_to_event(&Logistic { r: 0.5 }, &event, &config, 0.0, &[0.01], 50.0, 0.1)
            .unwrap();
        assert!(matches!(result, IntegrationResult::Completed { .. }));
    }

    #[test]
    fn test_event_action_continue_collects_all() {
        // cos(t) crosses zero at π/2, 3π/2, 5π/2 in [0, 9]
        struct PositionZero;
        impl EventFunction<2> for PositionZero {
            fn eval(&self, _t: f64, y: &[f64; 2]) -> f64 {
                y[0]
            }
        }

        let config = EventConfig {
            action: EventAction::Continue,
            ..Default::default()
        };
        let mut solver = Dopri5::new(Tolerances::new(1e-12, 1e-12));
        let sys = HarmonicOscillator { omega: 1.0 };

        let result = solver
            .integrate_to_event(&sys, &PositionZero, &config, 0.0, &[1.0, 0.0], 9.0, 0.1)
            .unwrap();

        assert!(matches!(result, IntegrationResult::Completed { .. }));
        assert_eq!(solver.collected_events.len(), 3);
        for (k, ev) in solver.collected_events.iter().enumerate() {
            let expected = (2 * k + 1) as f64 * std::f64::consts::FRAC_PI_2;
            assert_abs_diff_eq!(ev.t, expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_step_controller_bounds() {
        let ctrl = StepController::default();
        assert_eq!(ctrl.compute_factor(0.0), ctrl.max_factor);
        assert_eq!(ctrl.compute_factor(1e-30), ctrl.max_factor);
        assert_eq!(ctrl.compute_factor(1e30), ctrl.min_factor);
        assert_abs_diff_eq!(ctrl.compute_factor(1.0), ctrl.safety, epsilon = 1e-15);
    }

    #[test]
    fn test_default_tolerances() {
        let tol = Tolerances::<3>::default();
        assert_eq!(tol.atol, [DEFAULT_TOLERANCE; 3]);
        assert_eq!(tol.rtol, [DEFAULT_TOLERANCE; 3]);
    }
}
