//! Event Finding for ODE Integration
//!
//! An event function `g(t, y)` is monitored between accepted steps. When `g`
//! changes sign, the crossing is located with Brent's method on a Hermite
//! cubic interpolant of the step.
//!
//! In epidemic models the typical events are the infection peak
//! (dI/dt = 0), the susceptible fraction falling below the herd-immunity
//! threshold, or prevalence crossing a reporting level.

use thiserror::Error;

/// Scalar function whose zero crossings mark an event.
///
/// # Example
///
/// ```ignore
/// // Prevalence crosses 5 %
/// struct PrevalenceLevel {
///     level: f64,
/// }
///
/// impl EventFunction<3> for PrevalenceLevel {
///     fn eval(&self, _t: f64, y: &[f64; 3]) -> f64 {
///         y[1] - self.level
///     }
/// }
/// ```
pub trait EventFunction<const N: usize> {
    /// Evaluate the event function. Zero indicates the event has occurred.
    fn eval(&self, t: f64, y: &[f64; N]) -> f64;
}

/// Direction of zero-crossing to detect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventDirection {
    /// g goes from negative to positive
    Rising,
    /// g goes from positive to negative
    Falling,
    /// Any zero crossing
    #[default]
    Any,
}

/// Action to take when an event is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventAction {
    /// Stop integration at this event
    #[default]
    Stop,
    /// Record the event but continue integration
    Continue,
}

/// Configuration for an event
#[derive(Debug, Clone)]
pub struct EventConfig {
    /// Which direction of zero-crossing to detect
    pub direction: EventDirection,
    /// What to do when the event is detected
    pub action: EventAction,
    /// Tolerance on the event time (default: 1e-10)
    pub root_tol: f64,
    /// Maximum iterations for root finding (default: 50)
    pub max_iter: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            direction: EventDirection::Any,
            action: EventAction::Stop,
            root_tol: 1e-10,
            max_iter: 50,
        }
    }
}

/// A located event
#[derive(Debug, Clone)]
pub struct EventResult<const N: usize> {
    /// Time at which the event occurred
    pub t: f64,
    /// Interpolated state at the event
    pub y: [f64; N],
    /// Value of the event function at `t` (should be ~0)
    pub g_value: f64,
    /// Number of root-finding iterations used
    pub iterations: usize,
}

/// Brent's method for bracketed root finding
///
/// Combines bisection, secant steps and inverse quadratic interpolation.
///
/// Reference: Brent, R.P. (1973). "Algorithms for Minimization without
/// Derivatives". Prentice-Hall.
#[derive(Debug, Clone)]
pub struct BrentSolver {
    /// Width of the bracket at which the search stops
    pub tol: f64,
    /// Maximum iterations
    pub max_iter: usize,
}

impl Default for BrentSolver {
    fn default() -> Self {
        Self {
            tol: 1e-12,
            max_iter: 50,
        }
    }
}

impl BrentSolver {
    /// Create a new Brent solver
    pub fn new(tol: f64, max_iter: usize) -> Self {
        Self { tol, max_iter }
    }

    /// Find a root of `f` in `[a, b]`.
    ///
    /// `fa` and `fb` may be passed when already known to save evaluations.
    /// Returns `(root, f(root), iterations)`.
    pub fn find_root<F>(
        &self,
        mut f: F,
        a: f64,
        b: f64,
        fa: Option<f64>,
        fb: Option<f64>,
    ) -> Result<(f64, f64, usize), BrentError>
    where
        F: FnMut(f64) -> f64,
    {
        let fa = fa.unwrap_or_else(|| f(a));
        let fb = fb.unwrap_or_else(|| f(b));

        if fa * fb > 0.0 {
            return Err(BrentError::NotBracketed { a, b, fa, fb });
        }

        // `best` always holds the point with the smallest |f|; `contra` keeps
        // the sign opposite to `best` so the root stays bracketed.
        let (mut contra, mut f_contra, mut best, mut f_best) = if fa.abs() < fb.abs() {
            (b, fb, a, fa)
        } else {
            (a, fa, b, fb)
        };
        let mut prev = contra;
        let mut f_prev = f_contra;
        let mut prev_prev = contra;
        let mut bisected = true;

        for iter in 0..self.max_iter {
            if f_best == 0.0 || (best - contra).abs() <= self.tol {
                return Ok((best, f_best, iter + 1));
            }

            let candidate = if f_contra != f_prev && f_best != f_prev && f_contra != f_best {
                contra * f_best * f_prev / ((f_contra - f_best) * (f_contra - f_prev))
                    + best * f_contra * f_prev / ((f_best - f_contra) * (f_best - f_prev))
                    + prev * f_contra * f_best / ((f_prev - f_contra) * (f_prev - f_best))
            } else if f_best != f_contra {
                best - f_best * (best - contra) / (f_best - f_contra)
            } else {
                0.5 * (contra + best)
            };

            let quarter = (3.0 * contra + best) / 4.0;
            let reject = (candidate - quarter) * (candidate - best) > 0.0
                || (bisected && (candidate - best).abs() >= 0.5 * (best - prev).abs())
                || (!bisected && (candidate - best).abs() >= 0.5 * (prev - prev_prev).abs())
                || (bisected && (best - prev).abs() < self.tol)
                || (!bisected && (prev - prev_prev).abs() < self.tol);

            let s = if reject {
                0.5 * (contra + best)
            } else {
                candidate
            };
            bisected = reject;

            let fs = f(s);
            prev_prev = prev;
            prev = best;
            f_prev = f_best;

            if f_contra * fs < 0.0 {
                best = s;
                f_best = fs;
            } else {
                contra = s;
                f_contra = fs;
            }

            if f_contra.abs() < f_best.abs() {
                std::mem::swap(&mut contra, &mut best);
                std::mem::swap(&mut f_contra, &mut f_best);
            }
        }

        Err(BrentError::MaxIterations {
            current_best: best,
            f_value: f_best,
            iterations: self.max_iter,
        })
    }
}

/// Errors from Brent's method
#[derive(Debug, Clone, Error)]
pub enum BrentError {
    /// The root is not bracketed by the given interval
    #[error("root not bracketed: f({a}) = {fa}, f({b}) = {fb} (same sign)")]
    NotBracketed {
        /// Left endpoint
        a: f64,
        /// Right endpoint
        b: f64,
        /// Function value at left endpoint
        fa: f64,
        /// Function value at right endpoint
        fb: f64,
    },
    /// Maximum iterations reached without convergence
    #[error("max iterations ({iterations}) reached, best estimate: {current_best}, f = {f_value}")]
    MaxIterations {
        /// Best root estimate so far
        current_best: f64,
        /// Function value at best estimate
        f_value: f64,
        /// Number of iterations performed
        iterations: usize,
    },
}

/// Check if a sign change occurred in the specified direction.
///
/// A new value of exactly zero counts as a crossing when the old value lies
/// on the side `direction` starts from; an old value of exactly zero never
/// does, so the same root is not reported twice.
pub fn sign_change_detected(g_old: f64, g_new: f64, direction: EventDirection) -> bool {
    if g_old * g_new > 0.0 || g_old == 0.0 {
        return false;
    }
    match direction {
        EventDirection::Rising => g_old < 0.0,
        EventDirection::Falling => g_old > 0.0,
        EventDirection::Any => true,
    }
}
