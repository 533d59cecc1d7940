//! Event detection — periapsis finding and a bouncing trajectory.
//!
//! Demonstrates the three event reactions: `Stop` (halt at the first
//! periapsis), `Continue` (log every periapsis over several orbits), and
//! `ResetState` (a bouncing ball with restitution).
//!
//! Run with:
//!   cargo run --example event_detection

use std::cell::RefCell;
use std::rc::Rc;

use ode_events::{
    Dp54, EventAction, EventDetector, EventSchedule, EventSlope, OdeSystem, Rkf78, Tolerances,
};

/// Keplerian two-body problem.
struct TwoBody {
    mu: f64,
}

impl OdeSystem<6> for TwoBody {
    fn rhs(&self, _t: f64, y: &[f64; 6], dydt: &mut [f64; 6]) {
        let r2 = y[0] * y[0] + y[1] * y[1] + y[2] * y[2];
        let r = r2.sqrt();
        let mu_r3 = self.mu / (r2 * r);

        dydt[0] = y[3];
        dydt[1] = y[4];
        dydt[2] = y[5];
        dydt[3] = -mu_r3 * y[0];
        dydt[4] = -mu_r3 * y[1];
        dydt[5] = -mu_r3 * y[2];
    }
}

/// Periapsis guard: r·v = 0, rising (radius at a minimum).
///
/// Logs each crossing as (time, radius) into a shared vector.
struct Periapsis {
    action: EventAction,
    log: Rc<RefCell<Vec<(f64, f64)>>>,
}

impl EventDetector<6> for Periapsis {
    fn g(&self, _t: f64, y: &[f64; 6]) -> f64 {
        // r_dot = (r · v) / |r|, but sign is all we need
        y[0] * y[3] + y[1] * y[4] + y[2] * y[5]
    }

    fn event_occurred(&mut self, t: f64, y: &[f64; 6], _increasing: bool) -> EventAction {
        let r = (y[0] * y[0] + y[1] * y[1] + y[2] * y[2]).sqrt();
        self.log.borrow_mut().push((t, r));
        self.action
    }

    fn slope(&self) -> EventSlope {
        EventSlope::Increasing
    }
}

fn periapsis_demo() {
    let mu = 398600.4418;
    let sys = TwoBody { mu };

    // Elliptical orbit: 400 km × 2000 km altitude
    let earth_radius = 6378.137;
    let r_peri = earth_radius + 400.0;
    let r_apo = earth_radius + 2000.0;
    let a = (r_peri + r_apo) / 2.0;
    let v_peri = (mu * (2.0 / r_peri - 1.0 / a)).sqrt();

    // Start at periapsis, moving prograde
    let y0 = [r_peri, 0.0, 0.0, 0.0, v_peri, 0.0];
    let period = 2.0 * std::f64::consts::PI * (a.powi(3) / mu).sqrt();

    println!("Periapsis Finding");
    println!("  Orbit: 400 × 2000 km altitude");
    println!("  Period: {:.1} s ({:.1} min)", period, period / 60.0);
    println!();

    // --- Part 1: Stop at the first periapsis after t = 0 ---
    // We start at periapsis, so the next one is after one full orbit.
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut schedule = EventSchedule::new();
    schedule
        .add(Periapsis {
            action: EventAction::Stop,
            log: Rc::clone(&log),
        })
        .unwrap();

    let mut solver = Rkf78::new(Tolerances::new(1e-12, 1e-12));
    let outcome = solver
        .propagate(&sys, 0.0, &y0, 1.5 * period, 10.0, &mut schedule)
        .unwrap();

    println!("Part 1: EventAction::Stop");
    if outcome.stopped() {
        let y = outcome.y();
        let r = (y[0] * y[0] + y[1] * y[1] + y[2] * y[2]).sqrt();
        println!("  Periapsis found at t = {:.6} s", outcome.t());
        println!("  Radius: {:.6} km  (expected: {:.3})", r, r_peri);
        println!("  Radius error: {:.2e} km", (r - r_peri).abs());
    } else {
        println!("  No periapsis found (reached t = {})", outcome.t());
    }
    println!();

    // --- Part 2: Log every periapsis over 5 orbits ---
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut schedule = EventSchedule::new();
    schedule
        .add(Periapsis {
            action: EventAction::Continue,
            log: Rc::clone(&log),
        })
        .unwrap();

    let mut solver = Rkf78::new(Tolerances::new(1e-12, 1e-12));
    solver
        .propagate(&sys, 0.0, &y0, 5.0 * period, 10.0, &mut schedule)
        .unwrap();

    let crossings = log.borrow();
    println!("Part 2: EventAction::Continue (5 orbits)");
    println!("  Found {} periapsis crossings:", crossings.len());
    for (i, (t, r)) in crossings.iter().enumerate() {
        println!(
            "    #{}: t = {:10.3} s  r = {:.6} km  err = {:.2e} km",
            i + 1,
            t,
            r,
            (r - r_peri).abs()
        );
    }
}

/// Free fall with a floor: [height, velocity].
struct FreeFall;

impl OdeSystem<2> for FreeFall {
    fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) {
        dydt[0] = y[1];
        dydt[1] = -9.81;
    }
}

/// Impact guard: height = 0, falling. Reverses the velocity with a
/// restitution factor.
struct Bounce {
    restitution: f64,
    impacts: Rc<RefCell<Vec<f64>>>,
}

impl EventDetector<2> for Bounce {
    fn g(&self, _t: f64, y: &[f64; 2]) -> f64 {
        y[0]
    }

    fn event_occurred(&mut self, t: f64, _y: &[f64; 2], _increasing: bool) -> EventAction {
        self.impacts.borrow_mut().push(t);
        EventAction::ResetState
    }

    fn reset_state(&self, _t: f64, y: &[f64; 2]) -> [f64; 2] {
        [y[0].max(0.0), -self.restitution * y[1]]
    }

    fn slope(&self) -> EventSlope {
        EventSlope::Decreasing
    }
}

fn bouncing_ball_demo() {
    println!("Bouncing Ball (EventAction::ResetState)");
    println!("  Drop from 1 m, restitution 0.8");

    let impacts = Rc::new(RefCell::new(Vec::new()));
    let mut schedule = EventSchedule::new();
    schedule
        .add(Bounce {
            restitution: 0.8,
            impacts: Rc::clone(&impacts),
        })
        .unwrap();

    let mut solver = Dp54::new(Tolerances::new(1e-10, 1e-10));
    solver
        .propagate(&FreeFall, 0.0, &[1.0, 0.0], 3.0, 0.05, &mut schedule)
        .unwrap();

    let t_first = (2.0 / 9.81_f64).sqrt();
    println!("  First impact expected at t = {:.6} s", t_first);
    for (i, t) in impacts.borrow().iter().enumerate() {
        println!("    bounce #{}: t = {:.6} s", i + 1, t);
    }
}

fn main() {
    periapsis_demo();
    println!();
    bouncing_ball_demo();
}
