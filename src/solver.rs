//! Adaptive-step integration driver.
//!
//! [`Adaptive`] runs any embedded Runge-Kutta pair from [`crate::tableau`]
//! with proportional step-size control: each trial step produces a
//! normalized error estimate, steps with error above one are rejected and
//! retried smaller, accepted steps grow the next attempt. Committed steps
//! are offered to the event schedule (which may truncate them at a guard
//! crossing) and to an optional [`StepHandler`] for dense output.

use std::marker::PhantomData;

use crate::error::Error;
use crate::events::{EventAction, EventSchedule};
use crate::interp::StepInterpolator;
use crate::roots::RootError;
use crate::tableau::{DormandPrince54, Fehlberg78, RungeKuttaPair};

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

/// Observer of committed steps.
///
/// Called once per committed step, in integration order, with an
/// interpolator valid over exactly that step. Steps are contiguous: each
/// interpolator starts where the previous one ended, including steps
/// truncated at an event. `is_last` is true exactly once, on the step that
/// reaches the target time or the stopping event.
pub trait StepHandler<const N: usize> {
    /// Process one committed step.
    fn handle_step(&mut self, interp: &StepInterpolator<N>, is_last: bool);
}

/// Integration result from a single trial step
#[derive(Debug, Clone)]
pub struct StepResult<const N: usize> {
    /// New state after the step (high-order solution)
    pub y: [f64; N],
    /// New time value
    pub t: f64,
    /// Normalized error estimate (should be ≤ 1.0 for acceptance)
    pub error: f64,
    /// Suggested step size for next step
    pub h_next: f64,
    /// Whether the step was accepted
    pub accepted: bool,
}

/// Integration statistics for diagnostics
#[derive(Debug, Clone, Default)]
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
/// h_new = safety * h * error^(-1/(p+1))
/// where p is the order of the method's high-order solution.
#[derive(Debug, Clone)]
pub struct StepController {
    /// Safety factor (0.8-0.9 typical)
    pub safety: f64,
    /// Maximum growth factor per step
    pub max_factor: f64,
    /// Minimum reduction factor per step
    pub min_factor: f64,
    /// Exponent = 1/(order + 1)
    exponent: f64,
}

impl StepController {
    /// Controller tuned for a method of the given order.
    pub fn for_order(order: usize) -> Self {
        Self {
            safety: 0.9,
            max_factor: 5.0,
            min_factor: 0.2,
            exponent: 1.0 / (order as f64 + 1.0),
        }
    }

    /// Compute the step size adjustment factor
    pub fn compute_factor(&self, error: f64) -> f64 {
        if error == 0.0 {
            return self.max_factor;
        }

        let factor = self.safety * error.powf(-self.exponent);
        factor.clamp(self.min_factor, self.max_factor)
    }
}

impl Default for StepController {
    fn default() -> Self {
        Self::for_order(5)
    }
}

/// Tolerance specification for error control
///
/// Error is computed per component as: |err| / (atol + rtol * |y|)
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

/// How an integration run ended.
#[derive(Debug, Clone)]
pub enum Outcome<const N: usize> {
    /// The target time was reached.
    Completed {
        /// Final time
        t: f64,
        /// Final state vector
        y: [f64; N],
    },
    /// An event detector returned [`EventAction::Stop`].
    Stopped {
        /// Event time
        t: f64,
        /// State at the event time
        y: [f64; N],
    },
}

impl<const N: usize> Outcome<N> {
    /// Final time, whether the run completed or stopped at an event.
    pub fn t(&self) -> f64 {
        match self {
            Outcome::Completed { t, .. } | Outcome::Stopped { t, .. } => *t,
        }
    }

    /// Final state.
    pub fn y(&self) -> &[f64; N] {
        match self {
            Outcome::Completed { y, .. } | Outcome::Stopped { y, .. } => y,
        }
    }

    /// Whether the run was stopped by an event.
    pub fn stopped(&self) -> bool {
        matches!(self, Outcome::Stopped { .. })
    }
}

/// What the event schedule decided about one accepted trial step
enum StepEvent<const N: usize> {
    /// Root localization ran out of budget; shrink the step and retry
    Retry,
    /// The step was truncated at a guard crossing and the events fired
    Fired {
        t_after: f64,
        y_after: [f64; N],
        sub: StepInterpolator<N>,
        stop: bool,
        reset: bool,
    },
}

/// Adaptive-step integrator for an embedded Runge-Kutta pair `M`.
///
/// # Type Parameters
/// * `M` - The method strategy (its Butcher tableau)
/// * `S` - Number of stages of `M`
/// * `N` - Dimension of the state vector
///
/// Use the [`Dp54`] and [`Rkf78`] aliases rather than spelling out the
/// stage count by hand.
///
/// # Example
/// ```ignore
/// use ode_events::{Dp54, OdeSystem, Tolerances};
///
/// struct HarmonicOscillator { omega: f64 }
///
/// impl OdeSystem<2> for HarmonicOscillator {
///     fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) {
///         dydt[0] = y[1];
///         dydt[1] = -self.omega * self.omega * y[0];
///     }
/// }
///
/// let tol = Tolerances::new(1e-10, 1e-10);
/// let mut solver = Dp54::new(tol);
///
/// let sys = HarmonicOscillator { omega: 1.0 };
/// let y0 = [1.0, 0.0];
///
/// let (tf, yf) = solver.integrate(&sys, 0.0, &y0, 10.0, 0.1).unwrap();
/// ```
#[derive(Clone)]
pub struct Adaptive<M: RungeKuttaPair<S>, const S: usize, const N: usize> {
    /// Tolerance specification
    tol: Tolerances<N>,
    /// Step-size controller
    controller: StepController,
    /// Minimum step size
    pub h_min: f64,
    /// Maximum step size
    pub h_max: f64,
    /// Maximum number of integration steps before error
    pub max_steps: u64,
    /// Derivative-evaluation budget, counted across calls until
    /// [`reset_stats`](Adaptive::reset_stats)
    pub max_evals: u64,
    /// Stage evaluations (pre-allocated workspace)
    k: [[f64; N]; S],
    /// Integration statistics
    pub stats: Stats,
    _method: PhantomData<M>,
}

/// Dormand-Prince 5(4) integrator.
pub type Dp54<const N: usize> = Adaptive<DormandPrince54, 7, N>;

/// Fehlberg 7(8) integrator.
pub type Rkf78<const N: usize> = Adaptive<Fehlberg78, 13, N>;

impl<M: RungeKuttaPair<S>, const S: usize, const N: usize> Adaptive<M, S, N> {
    /// Create a new solver with specified tolerances
    pub fn new(tol: Tolerances<N>) -> Self {
        Self {
            tol,
            controller: StepController::for_order(M::ORDER),
            h_min: 1e-14,
            h_max: f64::INFINITY,
            max_steps: 10_000_000,
            max_evals: 100_000_000,
            k: [[0.0; N]; S],
            stats: Stats::default(),
            _method: PhantomData,
        }
    }

    /// Set minimum and maximum step sizes
    pub fn set_step_limits(&mut self, h_min: f64, h_max: f64) {
        self.h_min = h_min;
        self.h_max = h_max;
    }

    /// Reset statistics (and with them the evaluation budget)
    pub fn reset_stats(&mut self) {
        self.stats = Stats::default();
    }

    /// Perform a single trial step
    ///
    /// This computes the stages, forms the high-order solution, estimates
    /// the error, and determines if the step should be accepted.
    pub fn step<Sy: OdeSystem<N>>(
        &mut self,
        sys: &Sy,
        t: f64,
        y: &[f64; N],
        h: f64,
    ) -> Result<StepResult<N>, Error> {
        self.try_step(sys, t, y, h, None)
    }

    /// Trial step, reusing `f_start` as the first stage when available
    fn try_step<Sy: OdeSystem<N>>(
        &mut self,
        sys: &Sy,
        t: f64,
        y: &[f64; N],
        h: f64,
        f_start: Option<&[f64; N]>,
    ) -> Result<StepResult<N>, Error> {
        let h = h.signum() * h.abs().clamp(self.h_min, self.h_max);

        let evals = self.compute_stages(sys, t, y, h, f_start);
        self.stats.fn_evals += evals;
        if self.stats.fn_evals > self.max_evals {
            return Err(Error::EvaluationBudget {
                max: self.max_evals,
                t,
            });
        }

        let y_new = self.compute_solution(y, h);
        let error = self.compute_error(&y_new, h);
        let accepted = error <= 1.0;

        // Next step size (always positive magnitude)
        let factor = self.controller.compute_factor(error);
        let h_next = (h.abs() * factor).clamp(self.h_min, self.h_max);

        if accepted {
            self.stats.accepted_steps += 1;
        } else {
            self.stats.rejected_steps += 1;
        }

        Ok(StepResult {
            y: y_new,
            t: t + h,
            error,
            h_next,
            accepted,
        })
    }

    /// Compute all stages, returning the number of evaluations spent
    #[allow(clippy::needless_range_loop)]
    fn compute_stages<Sy: OdeSystem<N>>(
        &mut self,
        sys: &Sy,
        t: f64,
        y: &[f64; N],
        h: f64,
        f_start: Option<&[f64; N]>,
    ) -> u64 {
        let mut y_temp = [0.0; N];
        let mut evals = 0u64;

        // Stage 0: k[0] = f(t, y), unless carried over from the last step
        match f_start {
            Some(f) => self.k[0] = *f,
            None => {
                sys.rhs(t, y, &mut self.k[0]);
                evals += 1;
            }
        }

        for i in 1..S {
            // y_temp = y + h * sum_{j=0}^{i-1} a[i][j] * k[j]
            for n in 0..N {
                let mut sum = 0.0;
                for j in 0..i {
                    sum += M::A[i][j] * self.k[j][n];
                }
                y_temp[n] = y[n] + h * sum;
            }

            // k[i] = f(t + c[i]*h, y_temp)
            sys.rhs(t + M::C[i] * h, &y_temp, &mut self.k[i]);
            evals += 1;
        }

        evals
    }

    /// Compute the high-order solution from the stages
    #[allow(clippy::needless_range_loop)]
    fn compute_solution(&self, y: &[f64; N], h: f64) -> [f64; N] {
        let mut y_new = [0.0; N];

        for n in 0..N {
            let mut sum = 0.0;
            for i in 0..S {
                sum += M::B[i] * self.k[i][n];
            }
            y_new[n] = y[n] + h * sum;
        }

        y_new
    }

    /// Compute the normalized error estimate
    ///
    /// Root-mean-square of the scaled component errors:
    /// error = sqrt( (1/N) * sum_n (e_n / scale_n)^2 )
    /// where e_n = h * sum_i (b[i] - b_hat[i]) * k[i][n]
    /// and scale_n = atol[n] + rtol[n] * |y_new[n]|
    #[allow(clippy::needless_range_loop)]
    fn compute_error(&self, y_new: &[f64; N], h: f64) -> f64 {
        let mut sum_sq = 0.0;

        for n in 0..N {
            let mut err_n = 0.0;
            for i in 0..S {
                err_n += M::B_ERR[i] * self.k[i][n];
            }
            err_n *= h;

            let scale = self.tol.atol[n] + self.tol.rtol[n] * y_new[n].abs();
            let ratio = err_n / scale;
            sum_sq += ratio * ratio;
        }

        (sum_sq / N as f64).sqrt()
    }

    /// Validate solver configuration and integration inputs
    fn validate_inputs(&self, t0: f64, y0: &[f64; N], tf: f64, h0: f64) -> Result<(), Error> {
        if !(self.h_min >= 0.0) || !(self.h_max > self.h_min) {
            return Err(Error::InvalidConfig {
                message: "step limits must satisfy 0 <= h_min < h_max".to_string(),
            });
        }
        if !t0.is_finite() || !tf.is_finite() || !h0.is_finite() {
            return Err(Error::InvalidInput {
                message: "t0, tf, and h0 must be finite".to_string(),
            });
        }
        if h0 == 0.0 {
            return Err(Error::InvalidInput {
                message: "h0 must be non-zero".to_string(),
            });
        }
        let direction = tf - t0;
        if direction != 0.0 && h0.signum() != direction.signum() {
            return Err(Error::InvalidInput {
                message: "h0 sign must match integration direction (tf - t0)".to_string(),
            });
        }
        for (i, &val) in y0.iter().enumerate() {
            if !val.is_finite() {
                return Err(Error::InvalidInput {
                    message: format!("y0[{}] is not finite", i),
                });
            }
        }
        for (i, (&a, &r)) in self.tol.atol.iter().zip(self.tol.rtol.iter()).enumerate() {
            if !a.is_finite() || a <= 0.0 {
                return Err(Error::InvalidInput {
                    message: format!("atol[{}] must be positive and finite", i),
                });
            }
            if !r.is_finite() || r < 0.0 {
                return Err(Error::InvalidInput {
                    message: format!("rtol[{}] must be non-negative and finite", i),
                });
            }
        }
        Ok(())
    }

    /// Integrate from t0 to tf
    ///
    /// # Arguments
    /// * `sys` - The ODE system to integrate
    /// * `t0` - Initial time
    /// * `y0` - Initial state
    /// * `tf` - Final time
    /// * `h0` - Initial step size guess
    ///
    /// # Returns
    /// * `Ok((t_final, y_final))` on success
    /// * `Err(Error)` on failure
    pub fn integrate<Sy: OdeSystem<N>>(
        &mut self,
        sys: &Sy,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
    ) -> Result<(f64, [f64; N]), Error> {
        match self.drive(sys, t0, y0, tf, h0, None, None)? {
            Outcome::Completed { t, y } | Outcome::Stopped { t, y } => Ok((t, y)),
        }
    }

    /// Integrate from t0 to tf, delivering every committed step to `handler`
    pub fn integrate_with_handler<Sy: OdeSystem<N>>(
        &mut self,
        sys: &Sy,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
        handler: &mut dyn StepHandler<N>,
    ) -> Result<(f64, [f64; N]), Error> {
        match self.drive(sys, t0, y0, tf, h0, None, Some(handler))? {
            Outcome::Completed { t, y } | Outcome::Stopped { t, y } => Ok((t, y)),
        }
    }

    /// Integrate from t0 to tf with event detection.
    ///
    /// Every accepted step is checked against the schedule; a guard
    /// crossing truncates the step at the localized event time and the
    /// detector's [`EventAction`] decides whether integration continues,
    /// resets the state, or stops.
    pub fn propagate<Sy: OdeSystem<N>>(
        &mut self,
        sys: &Sy,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
        events: &mut EventSchedule<N>,
    ) -> Result<Outcome<N>, Error> {
        self.drive(sys, t0, y0, tf, h0, Some(events), None)
    }

    /// Integrate with event detection and a step handler.
    ///
    /// The handler sees the truncated sub-steps around events, so its view
    /// of the trajectory stays contiguous and includes any state resets.
    #[allow(clippy::too_many_arguments)]
    pub fn propagate_with_handler<Sy: OdeSystem<N>>(
        &mut self,
        sys: &Sy,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
        events: &mut EventSchedule<N>,
        handler: &mut dyn StepHandler<N>,
    ) -> Result<Outcome<N>, Error> {
        self.drive(sys, t0, y0, tf, h0, Some(events), Some(handler))
    }

    /// Main stepping loop shared by all entry points
    #[allow(clippy::too_many_arguments)]
    fn drive<Sy: OdeSystem<N>>(
        &mut self,
        sys: &Sy,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
        mut events: Option<&mut EventSchedule<N>>,
        mut handler: Option<&mut dyn StepHandler<N>>,
    ) -> Result<Outcome<N>, Error> {
        if t0 == tf {
            return Ok(Outcome::Completed { t: t0, y: *y0 });
        }
        self.validate_inputs(t0, y0, tf, h0)?;

        if let Some(schedule) = events.as_deref_mut() {
            schedule.initialize(t0, y0, tf);
        }

        let mut t = t0;
        let mut y = *y0;
        let mut h = h0;

        let direction = (tf - t0).signum();
        let needs_interp = events.is_some() || handler.is_some();

        // Derivative at (t, y) when still valid from the previous step
        let mut f_start: Option<[f64; N]> = None;
        let mut step_count = 0u64;

        while (tf - t) * direction > self.h_min {
            // Don't overshoot the endpoint
            if (t + h - tf) * direction > 0.0 {
                h = tf - t;
            }

            let result = self.try_step(sys, t, &y, h, f_start.as_ref())?;

            if result.accepted {
                if !result.y.iter().all(|v| v.is_finite()) {
                    return Err(Error::NonFiniteState { t: result.t });
                }

                if needs_interp {
                    let f0 = self.k[0];
                    let f1 = if M::FSAL {
                        self.k[S - 1]
                    } else {
                        // One extra evaluation buys the end derivative for
                        // dense output on non-FSAL methods
                        let mut f = [0.0; N];
                        sys.rhs(result.t, &result.y, &mut f);
                        self.stats.fn_evals += 1;
                        if self.stats.fn_evals > self.max_evals {
                            return Err(Error::EvaluationBudget {
                                max: self.max_evals,
                                t,
                            });
                        }
                        f
                    };
                    let interp = StepInterpolator::new(t, y, f0, result.t, result.y, f1);

                    let mut decision: Option<StepEvent<N>> = None;
                    if let Some(schedule) = events.as_deref_mut() {
                        match schedule.first_event(&interp) {
                            Err(RootError::MaxEvaluations { .. }) => {
                                decision = Some(StepEvent::Retry);
                            }
                            Err(RootError::NotBracketed { .. }) | Ok(None) => {}
                            Ok(Some(first)) => {
                                let t_event = first.t;
                                let y_event = interp.value(t_event);
                                let f_event = interp.derivative(t_event);
                                let sub =
                                    StepInterpolator::new(t, y, f0, t_event, y_event, f_event);

                                // Distinct guards can cross at (nearly) the
                                // same instant; fire all of them before
                                // resuming, earliest first. A Stop or a
                                // state reset invalidates the interpolated
                                // trajectory, so it ends the round.
                                let mut t_after = t_event;
                                let mut y_after = y_event;
                                let mut stop = false;
                                let mut reset = false;
                                let mut candidate = first;
                                for _ in 0..schedule.len() {
                                    let y_c = sub.value(candidate.t);
                                    match schedule.fire(&candidate, &y_c) {
                                        EventAction::Stop => {
                                            t_after = candidate.t;
                                            y_after = y_c;
                                            stop = true;
                                            break;
                                        }
                                        EventAction::ResetState => {
                                            t_after = candidate.t;
                                            y_after = schedule.reset_state(
                                                candidate.index,
                                                candidate.t,
                                                &y_c,
                                            );
                                            reset = true;
                                            break;
                                        }
                                        EventAction::Continue | EventAction::ResetDerivatives => {}
                                    }
                                    match schedule.first_event(&sub) {
                                        Ok(Some(next)) => candidate = next,
                                        Ok(None) | Err(RootError::NotBracketed { .. }) => break,
                                        // Actions already applied cannot be
                                        // replayed on a shrunken step, so a
                                        // budget exhausted while localizing a
                                        // follow-up crossing escalates instead
                                        // of retrying.
                                        Err(RootError::MaxEvaluations { max, .. }) => {
                                            return Err(Error::EvaluationBudget {
                                                max: max as u64,
                                                t: candidate.t,
                                            });
                                        }
                                    }
                                }

                                decision = Some(StepEvent::Fired {
                                    t_after,
                                    y_after,
                                    sub,
                                    stop,
                                    reset,
                                });
                            }
                        }
                    }

                    match decision {
                        Some(StepEvent::Retry) => {
                            // Count the discarded trial as a rejection
                            self.stats.accepted_steps -= 1;
                            self.stats.rejected_steps += 1;

                            // Halve what was actually attempted, not the
                            // caller-visible magnitude before clamping
                            let h_retry = h.abs().clamp(self.h_min, self.h_max) * 0.5;
                            if h_retry <= self.h_min {
                                return Err(Error::StepUnderflow { t, h: h_retry });
                            }
                            h = h_retry * direction;

                            step_count += 1;
                            if step_count > self.max_steps {
                                return Err(Error::MaxStepsExceeded { t });
                            }
                            continue;
                        }
                        Some(StepEvent::Fired {
                            t_after,
                            y_after,
                            sub,
                            stop,
                            reset,
                        }) => {
                            if stop {
                                if let Some(hd) = handler.as_deref_mut() {
                                    hd.handle_step(&sub, true);
                                }
                                return Ok(Outcome::Stopped {
                                    t: t_after,
                                    y: y_after,
                                });
                            }

                            let is_last = (tf - t_after) * direction <= self.h_min;
                            if let Some(hd) = handler.as_deref_mut() {
                                hd.handle_step(&sub, is_last);
                            }

                            t = t_after;
                            y = y_after;
                            // The cached derivative is stale past a
                            // truncation or a reset
                            f_start = None;
                            if let Some(schedule) = events.as_deref_mut() {
                                schedule.advance_all(t, &y);
                            }

                            // A state reset restarts step-size selection
                            // from the user's initial guess
                            h = if reset { h0 } else { result.h_next * direction };

                            step_count += 1;
                            if step_count > self.max_steps {
                                return Err(Error::MaxStepsExceeded { t });
                            }
                            continue;
                        }
                        None => {
                            if let Some(schedule) = events.as_deref_mut() {
                                schedule.advance_all(result.t, &result.y);
                            }
                            let is_last = (tf - result.t) * direction <= self.h_min;
                            if let Some(hd) = handler.as_deref_mut() {
                                hd.handle_step(&interp, is_last);
                            }
                            f_start = Some(f1);
                        }
                    }
                } else {
                    f_start = if M::FSAL { Some(self.k[S - 1]) } else { None };
                }

                t = result.t;
                y = result.y;
            }

            h = result.h_next * direction;

            step_count += 1;
            if step_count > self.max_steps {
                return Err(Error::MaxStepsExceeded { t });
            }

            // If the step was rejected and the next step size is already at
            // h_min, no progress can be made
            if !result.accepted && result.h_next <= self.h_min && (tf - t) * direction > self.h_min
            {
                return Err(Error::StepUnderflow {
                    t,
                    h: result.h_next,
                });
            }
        }

        Ok(Outcome::Completed { t, y })
    }
}
