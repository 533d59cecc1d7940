//! Basic usage — harmonic oscillator.
//!
//! Integrates y'' + ω²y = 0 for one period with both provided methods and
//! compares with the exact solution.
//!
//! Run with:
//!   cargo run --example harmonic_oscillator

use ode_events::{Dp54, OdeSystem, Rkf78, Tolerances};

/// Simple harmonic oscillator: y'' + ω²y = 0
///
/// State vector: [y, y']
struct HarmonicOscillator {
    omega: f64,
}

impl OdeSystem<2> for HarmonicOscillator {
    fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) {
        dydt[0] = y[1];
        dydt[1] = -self.omega * self.omega * y[0];
    }
}

fn main() {
    let omega = 2.0;
    let sys = HarmonicOscillator { omega };

    // Integrate for one full period: T = 2π/ω
    let period = 2.0 * std::f64::consts::PI / omega;
    let y0 = [1.0, 0.0]; // y(0) = 1, y'(0) = 0

    println!("Harmonic Oscillator (ω = {omega})");
    println!("  Period: {period:.6} s");
    println!();

    // Exact solution: y(t) = cos(ωt), y'(t) = -ω sin(ωt)
    let tol = Tolerances::new(1e-12, 1e-12);

    let mut dp54 = Dp54::new(tol.clone());
    let (tf, yf) = dp54.integrate(&sys, 0.0, &y0, period, 0.01).unwrap();
    let y_exact = (omega * tf).cos();
    println!("Dormand-Prince 5(4):");
    println!("  y(T) = {:.15}   (exact: {:.15})", yf[0], y_exact);
    println!("  Position error: {:.2e}", (yf[0] - y_exact).abs());
    println!(
        "  Steps: {} accepted, {} rejected, {} evals",
        dp54.stats.accepted_steps, dp54.stats.rejected_steps, dp54.stats.fn_evals
    );
    println!();

    let mut rkf78 = Rkf78::new(tol);
    let (tf, yf) = rkf78.integrate(&sys, 0.0, &y0, period, 0.01).unwrap();
    let y_exact = (omega * tf).cos();
    println!("Fehlberg 7(8):");
    println!("  y(T) = {:.15}   (exact: {:.15})", yf[0], y_exact);
    println!("  Position error: {:.2e}", (yf[0] - y_exact).abs());
    println!(
        "  Steps: {} accepted, {} rejected, {} evals",
        rkf78.stats.accepted_steps, rkf78.stats.rejected_steps, rkf78.stats.fn_evals
    );
}
