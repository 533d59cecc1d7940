//! Bracketing root solver for event localization.
//!
//! [`BracketingSolver`] refines a sign change of a scalar function inside a
//! bracketing interval. It accelerates convergence with inverse Newton
//! polynomial interpolation of configurable order, and falls back to
//! bisection whenever an interpolated guess would leave the bracket, so the
//! bracket is never lost even on pathological functions.
//!
//! The caller can constrain which side of the exact root the returned
//! abscissa lies on ([`AllowedSolution`]). The event scheduler relies on
//! this to avoid double-counting a crossing at a step boundary: forward
//! integration asks for [`AllowedSolution::RightSide`] so the returned time
//! is never before the true crossing.

use thiserror::Error;

use crate::error::Error;

/// Side of the exact root on which the returned solution must lie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllowedSolution {
    /// Either side; the endpoint with the smaller residual is returned.
    #[default]
    AnySide,
    /// The solution must not be greater than the exact root.
    LeftSide,
    /// The solution must not be smaller than the exact root.
    RightSide,
    /// The function value at the solution must not be positive.
    BelowSide,
    /// The function value at the solution must not be negative.
    AboveSide,
}

/// Recoverable root-solver failures.
///
/// Neither variant aborts an integration: the event schedule treats
/// [`RootError::NotBracketed`] as "no event this step", and
/// [`RootError::MaxEvaluations`] makes the integrator shrink the trial step
/// and retry.
#[derive(Debug, Clone, Error)]
pub enum RootError {
    /// No sign change inside the interval.
    #[error("root not bracketed: f({a}) = {fa}, f({b}) = {fb} (same sign)")]
    NotBracketed {
        /// Left endpoint
        a: f64,
        /// Right endpoint
        b: f64,
        /// Function value at the left endpoint
        fa: f64,
        /// Function value at the right endpoint
        fb: f64,
    },
    /// The evaluation budget was exhausted before convergence.
    #[error("root solver exhausted {max} evaluations, best estimate {best}")]
    MaxEvaluations {
        /// Configured evaluation budget
        max: usize,
        /// Best root estimate when the budget ran out
        best: f64,
    },
}

/// Converged root with diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct RootResult {
    /// Root abscissa, on the side mandated by the [`AllowedSolution`] policy.
    pub x: f64,
    /// Function value at `x`.
    pub fx: f64,
    /// Number of function evaluations used.
    pub evaluations: usize,
}

// Bracket endpoints older than this many iterations force an off-center
// target value so the stale endpoint gets refreshed.
const MAXIMAL_AGING: usize = 2;
const REDUCTION_FACTOR: f64 = 1.0 / 16.0;

/// Interpolation-accelerated bracketing solver.
///
/// Maintains up to `maximal_order + 1` evaluated points and guesses the next
/// abscissa by inverting the Newton interpolation polynomial through them;
/// any guess escaping the current bracket is discarded for a plain bisection
/// step. Convergence is declared when the bracket width falls below
/// `absolute_accuracy + relative_accuracy * max(|a|, |b|)` or the residual
/// falls below `function_value_accuracy`.
#[derive(Debug, Clone)]
pub struct BracketingSolver {
    maximal_order: usize,
    absolute_accuracy: f64,
    relative_accuracy: f64,
    function_value_accuracy: f64,
    /// Maximum number of function evaluations per solve
    pub max_evaluations: usize,
}

impl Default for BracketingSolver {
    fn default() -> Self {
        Self {
            maximal_order: 5,
            absolute_accuracy: 1e-12,
            relative_accuracy: 4.0 * f64::EPSILON,
            function_value_accuracy: 1e-15,
            max_evaluations: 100,
        }
    }
}

impl BracketingSolver {
    /// Create a solver with the given interpolation order and absolute
    /// accuracy.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if `maximal_order < 2` (at least a
    /// secant through the bracket endpoints is required).
    pub fn new(maximal_order: usize, absolute_accuracy: f64) -> Result<Self, Error> {
        if maximal_order < 2 {
            return Err(Error::InvalidConfig {
                message: format!("maximal order {} is below the minimum of 2", maximal_order),
            });
        }
        if !absolute_accuracy.is_finite() || absolute_accuracy <= 0.0 {
            return Err(Error::InvalidConfig {
                message: "absolute accuracy must be positive and finite".to_string(),
            });
        }
        Ok(Self {
            maximal_order,
            absolute_accuracy,
            ..Self::default()
        })
    }

    /// Absolute accuracy on the root abscissa.
    pub fn absolute_accuracy(&self) -> f64 {
        self.absolute_accuracy
    }

    /// Set the accuracy on the function value below which the residual alone
    /// declares convergence.
    pub fn set_function_value_accuracy(&mut self, accuracy: f64) {
        self.function_value_accuracy = accuracy;
    }

    /// Find a root of `f` in `[a, b]`, with `a < b`.
    ///
    /// The interval must bracket a sign change. The returned abscissa lies
    /// on the side of the exact root mandated by `allowed`, even when
    /// honoring the policy costs extra evaluations.
    ///
    /// # Errors
    /// * [`RootError::NotBracketed`] if `f` has the same sign at `a`, the
    ///   midpoint, and `b`.
    /// * [`RootError::MaxEvaluations`] if the budget runs out first.
    pub fn solve<F>(
        &self,
        mut f: F,
        a: f64,
        b: f64,
        allowed: AllowedSolution,
    ) -> Result<RootResult, RootError>
    where
        F: FnMut(f64) -> f64,
    {
        // Evaluated abscissas/ordinates, kept sorted by abscissa with the
        // sign change between indices sign_change_index-1 and
        // sign_change_index.
        let capacity = self.maximal_order + 1;
        let mut x = vec![0.0_f64; capacity];
        let mut y = vec![0.0_f64; capacity];
        let mut tmp_x = vec![0.0_f64; capacity];

        let mut evals: usize = 0;
        let budget = self.max_evaluations;
        let mut evaluate = |t: f64, evals: &mut usize| -> Result<f64, RootError> {
            if *evals >= budget {
                return Err(RootError::MaxEvaluations {
                    max: budget,
                    best: t,
                });
            }
            *evals += 1;
            Ok(f(t))
        };

        x[0] = a;
        x[1] = 0.5 * (a + b);
        x[2] = b;

        y[1] = evaluate(x[1], &mut evals)?;
        if y[1] == 0.0 {
            return Ok(RootResult {
                x: x[1],
                fx: 0.0,
                evaluations: evals,
            });
        }

        y[0] = evaluate(x[0], &mut evals)?;
        if y[0] == 0.0 {
            return Ok(RootResult {
                x: x[0],
                fx: 0.0,
                evaluations: evals,
            });
        }

        let mut nb_points;
        let mut sign_change_index;
        if y[0] * y[1] < 0.0 {
            nb_points = 2;
            sign_change_index = 1;
        } else {
            y[2] = evaluate(x[2], &mut evals)?;
            if y[2] == 0.0 {
                return Ok(RootResult {
                    x: x[2],
                    fx: 0.0,
                    evaluations: evals,
                });
            }
            if y[1] * y[2] < 0.0 {
                nb_points = 3;
                sign_change_index = 2;
            } else {
                return Err(RootError::NotBracketed {
                    a,
                    b,
                    fa: y[0],
                    fb: y[2],
                });
            }
        }

        let mut x_a = x[sign_change_index - 1];
        let mut y_a = y[sign_change_index - 1];
        let mut abs_ya = y_a.abs();
        let mut aging_a: usize = 0;
        let mut x_b = x[sign_change_index];
        let mut y_b = y[sign_change_index];
        let mut abs_yb = y_b.abs();
        let mut aging_b: usize = 0;

        loop {
            // Convergence on bracket width or residual
            let x_tol =
                self.absolute_accuracy + self.relative_accuracy * x_a.abs().max(x_b.abs());
            if x_b - x_a <= x_tol || abs_ya.max(abs_yb) < self.function_value_accuracy {
                let (root, f_root) = match allowed {
                    AllowedSolution::AnySide => {
                        if abs_ya < abs_yb {
                            (x_a, y_a)
                        } else {
                            (x_b, y_b)
                        }
                    }
                    AllowedSolution::LeftSide => (x_a, y_a),
                    AllowedSolution::RightSide => (x_b, y_b),
                    AllowedSolution::BelowSide => {
                        if y_a <= 0.0 {
                            (x_a, y_a)
                        } else {
                            (x_b, y_b)
                        }
                    }
                    AllowedSolution::AboveSide => {
                        if y_a < 0.0 {
                            (x_b, y_b)
                        } else {
                            (x_a, y_a)
                        }
                    }
                };
                return Ok(RootResult {
                    x: root,
                    fx: f_root,
                    evaluations: evals,
                });
            }

            // Target the interpolation slightly off zero when one endpoint
            // has gone stale, forcing the bracket to shrink on that side.
            let target_y = if aging_a >= MAXIMAL_AGING {
                -REDUCTION_FACTOR * y_b
            } else if aging_b >= MAXIMAL_AGING {
                -REDUCTION_FACTOR * y_a
            } else {
                0.0
            };

            // Inverse polynomial interpolation, dropping points farthest
            // from the sign change until the guess stays inside the bracket.
            let mut start = 0;
            let mut end = nb_points;
            let mut next_x;
            loop {
                tmp_x[start..end].copy_from_slice(&x[start..end]);
                next_x = guess_x(target_y, &mut tmp_x, &y, start, end);
                if !(next_x > x_a && next_x < x_b) {
                    if sign_change_index - start >= end - sign_change_index {
                        start += 1;
                    } else {
                        end -= 1;
                    }
                    next_x = f64::NAN;
                }
                if !next_x.is_nan() || end - start <= 1 {
                    break;
                }
            }

            if next_x.is_nan() {
                // Bisection fallback never loses the bracket
                next_x = x_a + 0.5 * (x_b - x_a);
                start = sign_change_index - 1;
                end = sign_change_index;
            }

            let next_y = evaluate(next_x, &mut evals)?;
            if next_y == 0.0 {
                return Ok(RootResult {
                    x: next_x,
                    fx: 0.0,
                    evaluations: evals,
                });
            }

            if nb_points > 2 && end - start != nb_points {
                // Interpolation rejected some points: forget them
                nb_points = end - start;
                x.copy_within(start..start + nb_points, 0);
                y.copy_within(start..start + nb_points, 0);
                sign_change_index -= start;
            } else if nb_points == x.len() {
                // Point arrays full: drop the endpoint farthest from the
                // sign change
                nb_points -= 1;
                if sign_change_index >= (x.len() + 1) / 2 {
                    x.copy_within(1..1 + nb_points, 0);
                    y.copy_within(1..1 + nb_points, 0);
                    sign_change_index -= 1;
                }
            }

            // Insert the new point, keeping abscissas sorted
            x.copy_within(sign_change_index..nb_points, sign_change_index + 1);
            x[sign_change_index] = next_x;
            y.copy_within(sign_change_index..nb_points, sign_change_index + 1);
            y[sign_change_index] = next_y;
            nb_points += 1;

            // Update the bracket
            if next_y * y_a <= 0.0 {
                x_b = next_x;
                y_b = next_y;
                abs_yb = y_b.abs();
                aging_a += 1;
                aging_b = 0;
            } else {
                x_a = next_x;
                y_a = next_y;
                abs_ya = y_a.abs();
                aging_a = 0;
                aging_b += 1;
                sign_change_index += 1;
            }
        }
    }
}

/// Guess an abscissa where the interpolated function reaches `target_y`.
///
/// Computes the divided differences of the inverse function x(y) through the
/// points in `[start, end)` in place, then evaluates the Newton polynomial
/// at `target_y`. `x` is scratch space and is destroyed.
fn guess_x(target_y: f64, x: &mut [f64], y: &[f64], start: usize, end: usize) -> f64 {
    for i in start..end - 1 {
        let delta = i + 1 - start;
        for j in ((i + 1)..end).rev() {
            x[j] = (x[j] - x[j - 1]) / (y[j] - y[j - delta]);
        }
    }

    let mut x0 = 0.0;
    for j in (start..end).rev() {
        x0 = x[j] + x0 * (target_y - y[j]);
    }
    x0
}
