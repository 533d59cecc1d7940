//! Event detection during integration.
//!
//! An event is a state-dependent discontinuity condition encoded by a guard
//! function `g(t, y)`: its sign tells which side of the event boundary the
//! state occupies, and a sign change inside a step means the boundary was
//! crossed. Typical guards in trajectory propagation: radial velocity
//! (periapsis/apoapsis), shadow function (eclipse entry/exit), altitude or
//! time thresholds (maneuver start/stop).
//!
//! Each registered [`EventDetector`] is tracked by its own [`EventState`];
//! the [`EventSchedule`] coordinates all of them for one integration run,
//! resolving near-simultaneous crossings in increasing time order
//! (registration order breaks ties). Crossing times are refined through the
//! step's [`StepInterpolator`] with the [`BracketingSolver`], so no extra
//! derivative evaluations are spent on localization.
//!
//! What happens at an event is an explicit [`EventAction`] value returned
//! from the detector and inspected by the stepping loop — expected
//! occurrences never travel as errors.

use crate::error::Error;
use crate::interp::StepInterpolator;
use crate::roots::{AllowedSolution, BracketingSolver, RootError};

/// Which sign changes of the guard function trigger the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventSlope {
    /// Only negative-to-positive crossings.
    Increasing,
    /// Only positive-to-negative crossings.
    Decreasing,
    /// Any crossing.
    #[default]
    Any,
}

/// Reaction applied when an event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventAction {
    /// Keep integrating from the event time, state unchanged.
    #[default]
    Continue,
    /// Terminate the integration, returning the state at the event time.
    Stop,
    /// Replace the state via [`EventDetector::reset_state`] and restart
    /// stepping from the event time with fresh step-size heuristics.
    ResetState,
    /// Force re-evaluation of the derivatives right after the event
    /// (discards any cached end-of-step derivative across a discontinuity
    /// of the right-hand side).
    ResetDerivatives,
}

/// A state-dependent discontinuity condition monitored during integration.
///
/// Only [`g`](EventDetector::g) and
/// [`event_occurred`](EventDetector::event_occurred) are mandatory; the
/// remaining methods have defaults matching the common case (any slope,
/// 1e-12 convergence, permanent detector).
pub trait EventDetector<const N: usize> {
    /// Guard function whose sign encodes the event boundary side.
    fn g(&self, t: f64, y: &[f64; N]) -> f64;

    /// Called once before stepping starts.
    fn init(&mut self, _t0: f64, _y0: &[f64; N], _t_target: f64) {}

    /// Called when a crossing has been localized to within
    /// [`convergence`](EventDetector::convergence); `increasing` is true
    /// for a negative-to-positive crossing. The returned action drives the
    /// integrator.
    fn event_occurred(&mut self, t: f64, y: &[f64; N], increasing: bool) -> EventAction;

    /// Replacement state applied when
    /// [`event_occurred`](EventDetector::event_occurred) returned
    /// [`EventAction::ResetState`].
    fn reset_state(&self, _t: f64, y: &[f64; N]) -> [f64; N] {
        *y
    }

    /// Which crossing directions to detect.
    fn slope(&self) -> EventSlope {
        EventSlope::Any
    }

    /// Convergence tolerance on the event time.
    fn convergence(&self) -> f64 {
        1e-12
    }

    /// Evaluation budget for localizing one crossing.
    fn max_iterations(&self) -> usize {
        100
    }

    /// Whether the detector should stop being checked after it fires.
    fn should_be_removed(&self) -> bool {
        false
    }
}

/// A crossing candidate found inside a trial step.
#[derive(Debug, Clone, Copy)]
pub struct EventCandidate {
    /// Index of the detector in registration order.
    pub index: usize,
    /// Localized crossing time.
    pub t: f64,
    /// True for a negative-to-positive crossing.
    pub increasing: bool,
}

/// Tracking of one guard function across an integration run.
pub struct EventState<const N: usize> {
    detector: Box<dyn EventDetector<N>>,
    solver: BracketingSolver,
    g0: f64,
    active: bool,
}

impl<const N: usize> EventState<N> {
    fn new(detector: Box<dyn EventDetector<N>>) -> Result<Self, Error> {
        // Detector tolerances drive the root solver accuracy; the detector
        // convergence is validated here so a bad value surfaces at
        // registration, not mid-run.
        let mut solver = BracketingSolver::new(5, detector.convergence())?;
        solver.max_evaluations = detector.max_iterations();
        Ok(Self {
            detector,
            solver,
            g0: 0.0,
            active: true,
        })
    }

    /// Convergence tolerance of the underlying detector.
    pub fn convergence(&self) -> f64 {
        self.detector.convergence()
    }

    fn initialize(&mut self, t0: f64, y0: &[f64; N], t_target: f64) {
        self.detector.init(t0, y0, t_target);
        self.g0 = self.detector.g(t0, y0);
        self.active = true;
    }

    /// Re-sample the guard at a new sub-step start after a commit or an
    /// event action mutated the state.
    fn advance(&mut self, t: f64, y: &[f64; N]) {
        if self.active {
            self.g0 = self.detector.g(t, y);
        }
    }

    /// Look for the earliest guard crossing inside the step covered by
    /// `interp`.
    ///
    /// Samples the guard at the step boundaries, filters by slope, and
    /// refines any sign change with the bracketing solver. A bracketing
    /// failure is absorbed as "no event this step"; an exhausted solver
    /// budget is returned so the integrator can shrink the step and retry.
    fn evaluate_step(
        &self,
        interp: &StepInterpolator<N>,
    ) -> Result<Option<(f64, bool)>, RootError> {
        if !self.active {
            return Ok(None);
        }

        let ta = interp.t_start();
        let tb = interp.t_end();
        let forward = interp.is_forward();
        let ga = self.g0;
        let gb = self.detector.g(tb, interp.y_end());

        if !crossing_detected(ga, gb, self.detector.slope()) {
            return Ok(None);
        }
        let increasing = gb >= ga;

        let g_at = |t: f64| self.detector.g(t, &interp.value(t));

        // The returned time must not precede the true crossing in the
        // integration direction, otherwise the crossing would be seen again
        // at the next sub-step start.
        let (mut lo, mut hi, side) = if forward {
            (ta, tb, AllowedSolution::RightSide)
        } else {
            (tb, ta, AllowedSolution::LeftSide)
        };

        let mut root = match self.solver.solve(g_at, lo, hi, side) {
            Ok(r) => r.x,
            Err(RootError::NotBracketed { .. }) => return Ok(None),
            Err(e @ RootError::MaxEvaluations { .. }) => return Err(e),
        };

        // An even number of crossings cancels at the boundaries, but an odd
        // count can hide earlier roots before the one found. Walk the
        // bracket back until the earliest crossing is isolated, so the
        // truncated step never straddles another root of this guard.
        let tol = self.detector.convergence();
        for _ in 0..4 {
            let (sub_lo, sub_hi) = if forward {
                (lo, root - tol)
            } else {
                (root + tol, hi)
            };
            if sub_hi - sub_lo <= tol {
                break;
            }
            let g_lo = if forward { ga } else { g_at(sub_lo) };
            let g_hi = if forward { g_at(sub_hi) } else { ga };
            if g_lo * g_hi > 0.0 {
                break;
            }
            match self.solver.solve(g_at, sub_lo, sub_hi, side) {
                Ok(r) => {
                    if forward {
                        hi = sub_hi;
                    } else {
                        lo = sub_lo;
                    }
                    root = r.x;
                }
                Err(RootError::NotBracketed { .. }) => break,
                Err(e @ RootError::MaxEvaluations { .. }) => return Err(e),
            }
        }

        // Reject a root collapsing onto the sub-step start
        let dir = if forward { 1.0 } else { -1.0 };
        if (root - ta) * dir <= 0.0 {
            return Ok(None);
        }

        Ok(Some((root, increasing)))
    }

    fn fire(&mut self, t: f64, y: &[f64; N], increasing: bool) -> EventAction {
        let action = self.detector.event_occurred(t, y, increasing);
        if self.detector.should_be_removed() {
            self.active = false;
        }
        action
    }
}

/// Slope-filtered sign-change test at the step boundaries.
///
/// A guard exactly at zero at the step start is not a new crossing (it was
/// either already handled or the integration starts on the boundary); a
/// guard reaching exactly zero at the step end is.
fn crossing_detected(g_old: f64, g_new: f64, slope: EventSlope) -> bool {
    if g_old * g_new > 0.0 {
        return false;
    }
    if g_old == 0.0 {
        return false;
    }
    match slope {
        EventSlope::Increasing => g_old < 0.0 && g_new >= 0.0,
        EventSlope::Decreasing => g_old > 0.0 && g_new <= 0.0,
        EventSlope::Any => true,
    }
}

/// All event detectors registered for one integration run.
///
/// Detectors are checked in registration order; when several guards cross
/// inside the same trial step the earliest crossing (in the integration
/// direction) wins, and the rest are re-detected from the truncated
/// sub-step start on the following trial.
#[derive(Default)]
pub struct EventSchedule<const N: usize> {
    states: Vec<EventState<N>>,
    last_event: Option<(f64, usize)>,
}

impl<const N: usize> EventSchedule<N> {
    /// Create an empty schedule.
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            last_event: None,
        }
    }

    /// Register a detector. Detectors fire in registration order when
    /// crossings are simultaneous.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] when the detector declares a
    /// non-positive or non-finite [`convergence`](EventDetector::convergence)
    /// tolerance.
    pub fn add<D: EventDetector<N> + 'static>(&mut self, detector: D) -> Result<(), Error> {
        self.states.push(EventState::new(Box::new(detector))?);
        Ok(())
    }

    /// Number of registered detectors.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no detectors are registered.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub(crate) fn initialize(&mut self, t0: f64, y0: &[f64; N], t_target: f64) {
        self.last_event = None;
        for state in &mut self.states {
            state.initialize(t0, y0, t_target);
        }
    }

    pub(crate) fn advance_all(&mut self, t: f64, y: &[f64; N]) {
        for state in &mut self.states {
            state.advance(t, y);
        }
    }

    /// Earliest crossing inside the step, if any.
    ///
    /// A candidate within its detector's convergence tolerance of the last
    /// accepted event *of the same detector* is discarded: a tangential
    /// zero cannot re-trigger itself, while a distinct guard crossing at
    /// the same instant still fires.
    pub(crate) fn first_event(
        &self,
        interp: &StepInterpolator<N>,
    ) -> Result<Option<EventCandidate>, RootError> {
        let dir = if interp.is_forward() { 1.0 } else { -1.0 };
        let mut best: Option<EventCandidate> = None;

        for (index, state) in self.states.iter().enumerate() {
            let Some((t, increasing)) = state.evaluate_step(interp)? else {
                continue;
            };

            if let Some((t_last, idx_last)) = self.last_event {
                if idx_last == index && (t - t_last).abs() <= state.convergence() {
                    continue;
                }
            }

            // Strict comparison keeps registration order on exact ties
            let earlier = match &best {
                Some(b) => (t - b.t) * dir < 0.0,
                None => true,
            };
            if earlier {
                best = Some(EventCandidate {
                    index,
                    t,
                    increasing,
                });
            }
        }

        Ok(best)
    }

    pub(crate) fn fire(&mut self, candidate: &EventCandidate, y: &[f64; N]) -> EventAction {
        let action = self.states[candidate.index].fire(candidate.t, y, candidate.increasing);
        self.last_event = Some((candidate.t, candidate.index));
        action
    }

    pub(crate) fn reset_state(&self, index: usize, t: f64, y: &[f64; N]) -> [f64; N] {
        self.states[index].detector.reset_state(t, y)
    }
}
