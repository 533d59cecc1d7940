//! Dense output for committed integration steps.
//!
//! A [`StepInterpolator`] is bound to exactly one committed step and
//! evaluates the solution (and its time derivative) anywhere inside that
//! step from data the step already produced — no extra derivative
//! evaluations. The events subsystem uses it to refine crossing times, and
//! the step normalizer uses it to resample accepted steps on a fixed grid.
//!
//! Interpolation is Hermite cubic on the step endpoints and their
//! derivatives, giving O(h⁴) state accuracy. The parameterization is the
//! normalized abscissa `theta = (t - t_start) / (t_end - t_start)`, so the
//! same formulas serve forward and backward integration. Evaluation is not
//! clamped to the step: root polishing is allowed a small, bounded
//! extrapolation past the endpoints.

/// Solution evaluated over one committed step.
#[derive(Debug, Clone)]
pub struct StepInterpolator<const N: usize> {
    t0: f64,
    t1: f64,
    y0: [f64; N],
    y1: [f64; N],
    f0: [f64; N],
    f1: [f64; N],
}

impl<const N: usize> StepInterpolator<N> {
    /// Bind an interpolator to a committed step.
    ///
    /// `f0` and `f1` are the derivatives at the step start and end; for
    /// FSAL methods both come from the step's own stages.
    pub fn new(
        t0: f64,
        y0: [f64; N],
        f0: [f64; N],
        t1: f64,
        y1: [f64; N],
        f1: [f64; N],
    ) -> Self {
        Self {
            t0,
            t1,
            y0,
            y1,
            f0,
            f1,
        }
    }

    /// Time at the step start.
    pub fn t_start(&self) -> f64 {
        self.t0
    }

    /// Time at the step end.
    pub fn t_end(&self) -> f64 {
        self.t1
    }

    /// State at the step start.
    pub fn y_start(&self) -> &[f64; N] {
        &self.y0
    }

    /// State at the step end.
    pub fn y_end(&self) -> &[f64; N] {
        &self.y1
    }

    /// Derivative at the step end.
    pub fn y_dot_end(&self) -> &[f64; N] {
        &self.f1
    }

    /// Whether the step advances in the direction of increasing time.
    pub fn is_forward(&self) -> bool {
        self.t1 >= self.t0
    }

    /// Whether `t` lies inside the step (inclusive of both endpoints).
    pub fn contains(&self, t: f64) -> bool {
        let dir = (self.t1 - self.t0).signum();
        (t - self.t0) * dir >= 0.0 && (self.t1 - t) * dir >= 0.0
    }

    /// Interpolated state at `t`.
    ///
    /// Hermite cubic basis: h00·y0 + h10·Δt·f0 + h01·y1 + h11·Δt·f1.
    /// `t` slightly outside the step extrapolates the cubic.
    pub fn value(&self, t: f64) -> [f64; N] {
        let dt = self.t1 - self.t0;
        let theta = (t - self.t0) / dt;
        let th2 = theta * theta;
        let th3 = th2 * theta;

        let h00 = 1.0 - 3.0 * th2 + 2.0 * th3;
        let h10 = theta - 2.0 * th2 + th3;
        let h01 = 3.0 * th2 - 2.0 * th3;
        let h11 = th3 - th2;

        let mut y = [0.0; N];
        for i in 0..N {
            y[i] = h00 * self.y0[i]
                + h10 * dt * self.f0[i]
                + h01 * self.y1[i]
                + h11 * dt * self.f1[i];
        }
        y
    }

    /// Interpolated time derivative at `t`.
    pub fn derivative(&self, t: f64) -> [f64; N] {
        let dt = self.t1 - self.t0;
        let theta = (t - self.t0) / dt;
        let th2 = theta * theta;

        // d/dtheta of the Hermite basis, divided by dt for d/dt
        let g00 = (-6.0 * theta + 6.0 * th2) / dt;
        let g10 = 1.0 - 4.0 * theta + 3.0 * th2;
        let g01 = (6.0 * theta - 6.0 * th2) / dt;
        let g11 = 3.0 * th2 - 2.0 * theta;

        let mut y_dot = [0.0; N];
        for i in 0..N {
            y_dot[i] = g00 * self.y0[i]
                + g10 * self.f0[i]
                + g01 * self.y1[i]
                + g11 * self.f1[i];
        }
        y_dot
    }
}
