//! Fixed-grid output — resampling adaptive steps onto a regular grid.
//!
//! The integrator picks whatever step sizes error control dictates;
//! `StepNormalizer` turns the committed steps into samples at a fixed
//! spacing, evaluated through each step's dense-output interpolator. This
//! demo tabulates a damped oscillator every 0.25 s and compares against
//! the exact solution.
//!
//! Run with:
//!   cargo run --example fixed_grid_output

use ode_events::{
    BoundsPolicy, Dp54, OdeSystem, SampleHandler, SamplingMode, StepNormalizer, Tolerances,
};

/// Damped harmonic oscillator: y'' + 2ζω y' + ω² y = 0
struct DampedOscillator {
    omega: f64,
    zeta: f64,
}

impl OdeSystem<2> for DampedOscillator {
    fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) {
        dydt[0] = y[1];
        dydt[1] = -2.0 * self.zeta * self.omega * y[1] - self.omega * self.omega * y[0];
    }
}

impl DampedOscillator {
    /// Exact solution for y(0) = 1, y'(0) = 0 (underdamped case).
    fn exact(&self, t: f64) -> f64 {
        let wd = self.omega * (1.0 - self.zeta * self.zeta).sqrt();
        let decay = (-self.zeta * self.omega * t).exp();
        decay * ((wd * t).cos() + self.zeta * self.omega / wd * (wd * t).sin())
    }
}

/// Prints one table row per sample.
struct TablePrinter {
    sys: DampedOscillator,
    rows: usize,
}

impl SampleHandler<2> for TablePrinter {
    fn sample(&mut self, t: f64, y: &[f64; 2], y_dot: &[f64; 2], is_last: bool) {
        let exact = self.sys.exact(t);
        println!(
            "  {:6.2}  {:>14.10}  {:>14.10}  {:>9.2e}  {:>14.10}{}",
            t,
            y[0],
            exact,
            (y[0] - exact).abs(),
            y_dot[0],
            if is_last { "  (last)" } else { "" }
        );
        self.rows += 1;
    }
}

fn main() {
    let sys = DampedOscillator {
        omega: 2.0,
        zeta: 0.1,
    };
    let y0 = [1.0, 0.0];
    let tf = 5.0;

    println!("Damped Oscillator (ω = 2, ζ = 0.1), resampled every 0.25 s");
    println!();
    println!(
        "  {:>6}  {:>14}  {:>14}  {:>9}  {:>14}",
        "t", "y", "exact", "error", "y'"
    );

    // Both span bounds plus every interior grid point
    let printer = TablePrinter {
        sys: DampedOscillator {
            omega: 2.0,
            zeta: 0.1,
        },
        rows: 0,
    };
    let mut norm = StepNormalizer::new(
        0.25,
        SamplingMode::Increment,
        BoundsPolicy::Both,
        printer,
    )
    .unwrap();

    let mut solver = Dp54::new(Tolerances::new(1e-10, 1e-10));
    solver
        .integrate_with_handler(&sys, 0.0, &y0, tf, 0.1, &mut norm)
        .unwrap();

    println!();
    println!(
        "  {} samples from {} accepted steps ({} evals)",
        norm.handler().rows,
        solver.stats.accepted_steps,
        solver.stats.fn_evals
    );
}
