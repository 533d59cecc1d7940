//! # ode-events: adaptive ODE integration with event detection
//!
//! An embedded Runge-Kutta integration core with adaptive step-size
//! control, event detection, dense output, and fixed-grid resampling.
//!
//! ## Features
//!
//! - Embedded Runge-Kutta pairs as pluggable strategies: Dormand-Prince
//!   5(4) (FSAL) and Fehlberg 7(8) (NASA TR R-287)
//! - Adaptive step-size control from the embedded error estimate
//! - **Event detection**: guard functions localized with a bracketed
//!   root solver of configurable interpolation order, with per-detector
//!   slope filtering and explicit event actions (continue, stop, reset)
//! - Dense output via per-step Hermite interpolators, at no extra
//!   derivative evaluations for FSAL methods
//! - Fixed-grid resampling of adaptive steps through [`StepNormalizer`]
//!
//! ## Basic Usage
//!
//! ```rust
//! use ode_events::{Dp54, OdeSystem, Tolerances};
//!
//! // Define your ODE system
//! struct HarmonicOscillator { omega: f64 }
//!
//! impl OdeSystem<2> for HarmonicOscillator {
//!     fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) {
//!         dydt[0] = y[1];
//!         dydt[1] = -self.omega * self.omega * y[0];
//!     }
//! }
//!
//! // Set up and run the integrator
//! let sys = HarmonicOscillator { omega: 1.0 };
//! let tol = Tolerances::new(1e-12, 1e-12);
//! let mut solver = Dp54::new(tol);
//!
//! let y0 = [1.0, 0.0];  // Initial conditions
//! let (tf, yf) = solver.integrate(&sys, 0.0, &y0, 10.0, 0.1).unwrap();
//! ```
//!
//! ## Event Detection
//!
//! A guard function `g(t, y)` encodes a boundary by its sign; the
//! integrator localizes sign changes inside committed steps and reacts
//! with the detector's [`EventAction`]. Typical guards:
//!
//! - Periapsis/apoapsis (radial velocity = 0)
//! - Eclipse entry/exit
//! - Altitude or time threshold crossings
//! - Impacts with state resets (bouncing trajectories)
//!
//! ```rust
//! use ode_events::{
//!     Dp54, EventAction, EventDetector, EventSchedule, EventSlope, OdeSystem, Tolerances,
//! };
//!
//! struct Falling;
//! impl OdeSystem<1> for Falling {
//!     fn rhs(&self, _t: f64, _y: &[f64; 1], dydt: &mut [f64; 1]) {
//!         dydt[0] = -1.0;
//!     }
//! }
//!
//! // Stop when y[0] falls through 0.5
//! struct ThresholdCrossing { value: f64 }
//!
//! impl EventDetector<1> for ThresholdCrossing {
//!     fn g(&self, _t: f64, y: &[f64; 1]) -> f64 {
//!         y[0] - self.value
//!     }
//!     fn event_occurred(&mut self, _t: f64, _y: &[f64; 1], _increasing: bool) -> EventAction {
//!         EventAction::Stop
//!     }
//!     fn slope(&self) -> EventSlope {
//!         EventSlope::Decreasing
//!     }
//! }
//!
//! let mut schedule = EventSchedule::new();
//! schedule.add(ThresholdCrossing { value: 0.5 }).unwrap();
//!
//! let mut solver = Dp54::new(Tolerances::new(1e-12, 1e-12));
//! let outcome = solver.propagate(&Falling, 0.0, &[1.0], 10.0, 0.1, &mut schedule).unwrap();
//! assert!(outcome.stopped());
//! assert!((outcome.t() - 0.5).abs() < 1e-9);
//! ```
//!
//! ## Choosing a Method
//!
//! - [`Dp54`]: the default for moderate tolerances and event-heavy work;
//!   its FSAL structure makes dense output free.
//! - [`Rkf78`]: tight tolerances over long spans (trajectory
//!   propagation); dense output costs one extra evaluation per step.
//!
//! ## References
//!
//! 1. Dormand, J.R. & Prince, P.J. (1980). "A family of embedded
//!    Runge-Kutta formulae". J. Comp. Appl. Math., 6(1).
//!
//! 2. Fehlberg, E. (1968). "Classical Fifth-, Sixth-, Seventh-, and
//!    Eighth-Order Runge-Kutta Formulas with Stepsize Control".
//!    NASA TR R-287.
//!
//! 3. Hairer, E., Nørsett, S.P., & Wanner, G. (1993). "Solving
//!    Ordinary Differential Equations I: Nonstiff Problems". Springer.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod events;
pub mod interp;
pub mod roots;
pub mod sampler;
pub mod solver;
pub mod tableau;

pub use error::Error;
pub use events::{EventAction, EventCandidate, EventDetector, EventSchedule, EventSlope};
pub use interp::StepInterpolator;
pub use roots::{AllowedSolution, BracketingSolver, RootError, RootResult};
pub use sampler::{BoundsPolicy, SampleHandler, SamplingMode, StepNormalizer};
pub use solver::{
    Adaptive, Dp54, OdeSystem, Outcome, Rkf78, Stats, StepController, StepHandler, StepResult,
    Tolerances,
};
pub use tableau::{DormandPrince54, Fehlberg78, RungeKuttaPair};
