//! Dormand-Prince 5(4) Coefficients
//!
//! Butcher tableau of the 7-stage embedded RK5(4) pair from:
//! Dormand, J.R. & Prince, P.J. (1980). "A family of embedded Runge-Kutta
//! formulae". Journal of Computational and Applied Mathematics 6(1), 19-26.
//!
//! The 5th-order solution advances the state (local extrapolation); the
//! embedded 4th-order solution only feeds the error estimate.

/// Number of stages in the Dormand-Prince method
pub const STAGES: usize = 7;

/// Order of the propagated solution
pub const ORDER: u8 = 5;

/// Order of the embedded solution used for error estimation
pub const EMBEDDED_ORDER: u8 = 4;

/// Nodes: stage i is evaluated at t_n + C[i]*h
pub const C: [f64; STAGES] = [
    0.0,
    1.0 / 5.0,
    3.0 / 10.0,
    4.0 / 5.0,
    8.0 / 9.0,
    1.0,
    1.0,
];

/// Runge-Kutta matrix, lower triangular.
///
/// k_i = f(t_n + c_i*h, y_n + h * sum_{j<i} A[i][j] * k_j)
///
/// Row 6 equals `B`: the last stage is evaluated at the 5th-order solution.
pub const A: [[f64; STAGES - 1]; STAGES] = [
    [0.0; 6],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
        0.0,
    ],
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
        0.0,
    ],
    [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
];

/// Weights of the 5th-order solution
pub const B: [f64; STAGES] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
    0.0,
];

/// Weights of the embedded 4th-order solution
pub const B_HAT: [f64; STAGES] = [
    5179.0 / 57600.0,
    0.0,
    7571.0 / 16695.0,
    393.0 / 640.0,
    -92097.0 / 339200.0,
    187.0 / 2100.0,
    1.0 / 40.0,
];

/// Error weights: B[i] - B_HAT[i]
///
/// err ≈ h * sum_i B_ERR[i] * k_i
pub const B_ERR: [f64; STAGES] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];
