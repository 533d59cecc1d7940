//! Embedded Runge-Kutta method strategies.
//!
//! Each method is a zero-size type implementing [`RungeKuttaPair`] with its
//! Butcher tableau as associated constants. The adaptive-control loop in
//! [`crate::solver`] is written once and parameterized by the strategy, so
//! adding a method means adding a tableau, nothing else.
//!
//! Provided strategies:
//!
//! | Method              | Stages | Order | FSAL |
//! |---------------------|--------|-------|------|
//! | [`DormandPrince54`] |      7 | 5(4)  | yes  |
//! | [`Fehlberg78`]      |     13 | 7(8)  | no   |
//!
//! References: Dormand & Prince (1980), "A family of embedded Runge-Kutta
//! formulae"; Fehlberg (1968), NASA TR R-287, Table X.

/// Embedded Runge-Kutta pair described by its Butcher tableau.
///
/// `S` is the number of stages. The `k` stages satisfy
/// `k_i = f(t + C[i]*h, y + h * sum_{j<i} A[i][j] * k_j)`; the advanced
/// solution is `y + h * sum_i B[i] * k_i` and the local error estimate is
/// `h * sum_i B_ERR[i] * k_i` (weights of the high-order solution minus the
/// embedded lower-order one).
pub trait RungeKuttaPair<const S: usize> {
    /// Runge-Kutta matrix `a_ij` (strictly lower triangular).
    const A: [[f64; S]; S];
    /// Weights of the high-order solution.
    const B: [f64; S];
    /// Error weights `b_i - b_hat_i`.
    const B_ERR: [f64; S];
    /// Nodes `c_i`: stage `i` is evaluated at `t + c_i * h`.
    const C: [f64; S];
    /// Order of the high-order solution, used by the step-size controller.
    const ORDER: usize;
    /// First Same As Last: the final stage equals `f(t + h, y_new)` and can
    /// seed both the next step and the dense-output interpolator for free.
    const FSAL: bool;
    /// Human-readable method name for diagnostics.
    const NAME: &'static str;
}

/// Dormand-Prince 5(4): 7 stages, 5th-order solution with embedded
/// 4th-order error estimate, FSAL.
///
/// The workhorse method for non-stiff problems at moderate tolerances, and
/// the default choice when event detection or dense output is in play: its
/// last stage is the derivative at the step end, so the interpolator costs
/// no extra evaluations.
#[derive(Debug, Clone, Copy, Default)]
pub struct DormandPrince54;

impl RungeKuttaPair<7> for DormandPrince54 {
    const A: [[f64; 7]; 7] = [
        [0.0; 7],
        [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0, 0.0],
        [
            19372.0 / 6561.0,
            -25360.0 / 2187.0,
            64448.0 / 6561.0,
            -212.0 / 729.0,
            0.0,
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
            0.0,
        ],
        [
            35.0 / 384.0,
            0.0,
            500.0 / 1113.0,
            125.0 / 192.0,
            -2187.0 / 6784.0,
            11.0 / 84.0,
            0.0,
        ],
    ];

    const B: [f64; 7] = [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
        0.0,
    ];

    // B minus the embedded 4th-order weights
    // [5179/57600, 0, 7571/16695, 393/640, -92097/339200, 187/2100, 1/40].
    const B_ERR: [f64; 7] = [
        71.0 / 57600.0,
        0.0,
        -71.0 / 16695.0,
        71.0 / 1920.0,
        -17253.0 / 339200.0,
        22.0 / 525.0,
        -1.0 / 40.0,
    ];

    const C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];

    const ORDER: usize = 5;
    const FSAL: bool = true;
    const NAME: &'static str = "Dormand-Prince 5(4)";
}

/// Fehlberg 7(8): 13 stages, 8th-order solution with embedded 7th-order
/// error estimate.
///
/// From NASA TR R-287, Table X. High-precision method for tight tolerances
/// over long spans (trajectory propagation); not FSAL, so dense output
/// costs one end-derivative evaluation per committed step.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fehlberg78;

impl RungeKuttaPair<13> for Fehlberg78 {
    #[rustfmt::skip]
    const A: [[f64; 13]; 13] = [
        [0.0; 13],
        [2.0/27.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [1.0/36.0, 1.0/12.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [1.0/24.0, 0.0, 1.0/8.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [5.0/12.0, 0.0, -25.0/16.0, 25.0/16.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [1.0/20.0, 0.0, 0.0, 1.0/4.0, 1.0/5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [-25.0/108.0, 0.0, 0.0, 125.0/108.0, -65.0/27.0, 125.0/54.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [31.0/300.0, 0.0, 0.0, 0.0, 61.0/225.0, -2.0/9.0, 13.0/900.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [2.0, 0.0, 0.0, -53.0/6.0, 704.0/45.0, -107.0/9.0, 67.0/90.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [-91.0/108.0, 0.0, 0.0, 23.0/108.0, -976.0/135.0, 311.0/54.0, -19.0/60.0, 17.0/6.0, -1.0/12.0, 0.0, 0.0, 0.0, 0.0],
        [2383.0/4100.0, 0.0, 0.0, -341.0/164.0, 4496.0/1025.0, -301.0/82.0, 2133.0/4100.0, 45.0/82.0, 45.0/164.0, 18.0/41.0, 0.0, 0.0, 0.0],
        [3.0/205.0, 0.0, 0.0, 0.0, 0.0, -6.0/41.0, -3.0/205.0, -3.0/41.0, 3.0/41.0, 6.0/41.0, 0.0, 0.0, 0.0],
        [-1777.0/4100.0, 0.0, 0.0, -341.0/164.0, 4496.0/1025.0, -289.0/82.0, 2193.0/4100.0, 51.0/82.0, 33.0/164.0, 12.0/41.0, 0.0, 1.0, 0.0],
    ];

    #[rustfmt::skip]
    const B: [f64; 13] = [
        41.0/840.0, 0.0, 0.0, 0.0, 0.0,
        34.0/105.0, 9.0/35.0, 9.0/35.0, 9.0/280.0, 9.0/280.0,
        41.0/840.0, 0.0, 0.0,
    ];

    // Truncation error term from NASA TR R-287:
    // TE = (41/840) * (k_0 + k_10 - k_11 - k_12) * h
    #[rustfmt::skip]
    const B_ERR: [f64; 13] = [
        41.0/840.0, 0.0, 0.0, 0.0, 0.0,
        0.0, 0.0, 0.0, 0.0, 0.0,
        41.0/840.0, -41.0/840.0, -41.0/840.0,
    ];

    #[rustfmt::skip]
    const C: [f64; 13] = [
        0.0, 2.0/27.0, 1.0/9.0, 1.0/6.0, 5.0/12.0,
        0.5, 5.0/6.0, 1.0/6.0, 2.0/3.0, 1.0/3.0,
        1.0, 0.0, 1.0,
    ];

    const ORDER: usize = 8;
    const FSAL: bool = false;
    const NAME: &'static str = "Fehlberg 7(8)";
}
