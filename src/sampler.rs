//! Fixed-grid resampling of adaptive steps.
//!
//! The integrator commits steps of whatever size error control dictates;
//! [`StepNormalizer`] sits between the integrator and a [`SampleHandler`]
//! and converts that irregular sequence into samples at a fixed time
//! spacing, evaluated through each step's [`StepInterpolator`]. Useful for
//! ephemeris tables, plotting, and comparing runs on a common grid.
//!
//! Grid points are generated strictly inside the integration span; the
//! span bounds themselves are emitted only when [`BoundsPolicy`] asks for
//! them. A grid point falling exactly on the end bound counts as the
//! bound, not as an interior point.

use crate::error::Error;
use crate::interp::StepInterpolator;
use crate::solver::StepHandler;

/// Which integration span bounds are emitted in addition to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundsPolicy {
    /// Interior grid points only.
    #[default]
    Neither,
    /// Also emit the start of the span.
    First,
    /// Also emit the end of the span.
    Last,
    /// Emit both span bounds.
    Both,
}

/// How grid times are generated from the step size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingMode {
    /// Offsets from the start time: t0 + h, t0 + 2h, ...
    #[default]
    Increment,
    /// Integer multiples of the step size, regardless of t0.
    Multiples,
}

/// Receiver of fixed-grid samples.
pub trait SampleHandler<const N: usize> {
    /// Process one sample.
    ///
    /// `is_last` is true on the final sample of the run. With
    /// [`BoundsPolicy::Neither`] or [`BoundsPolicy::First`] that is the
    /// last interior grid point; with [`BoundsPolicy::Last`] or
    /// [`BoundsPolicy::Both`] it is the end bound itself.
    fn sample(&mut self, t: f64, y: &[f64; N], y_dot: &[f64; N], is_last: bool);
}

/// One buffered sample, held back until the next one proves it is not last
struct Sample<const N: usize> {
    t: f64,
    y: [f64; N],
    y_dot: [f64; N],
}

/// Grid state, fixed on the first committed step
struct Grid {
    origin: f64,
    step: f64,
    count: u64,
}

impl Grid {
    fn next_time(&self) -> f64 {
        // Counted rather than accumulated, so long runs don't drift
        self.origin + self.count as f64 * self.step
    }
}

/// Step handler that resamples committed steps on a fixed time grid.
///
/// One normalizer serves one integration run; build a fresh one per run.
pub struct StepNormalizer<const N: usize, H: SampleHandler<N>> {
    h: f64,
    mode: SamplingMode,
    bounds: BoundsPolicy,
    handler: H,
    grid: Option<Grid>,
    pending: Option<Sample<N>>,
}

impl<const N: usize, H: SampleHandler<N>> StepNormalizer<N, H> {
    /// Create a normalizer emitting samples every `h` time units.
    ///
    /// `h` is a positive magnitude; the integration direction comes from
    /// the steps themselves.
    pub fn new(h: f64, mode: SamplingMode, bounds: BoundsPolicy, handler: H) -> Result<Self, Error> {
        if !h.is_finite() || h <= 0.0 {
            return Err(Error::InvalidConfig {
                message: format!("sampling step {} must be positive and finite", h),
            });
        }
        Ok(Self {
            h,
            mode,
            bounds,
            handler,
            grid: None,
            pending: None,
        })
    }

    /// Recover the wrapped handler after the run.
    pub fn into_inner(self) -> H {
        self.handler
    }

    /// Access the wrapped handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// First grid time strictly past `t0` in the integration direction
    fn first_grid(&self, t0: f64, dir: f64) -> Grid {
        let step = self.h * dir;
        let origin = match self.mode {
            SamplingMode::Increment => t0 + step,
            SamplingMode::Multiples => {
                if dir > 0.0 {
                    self.h * ((t0 / self.h).floor() + 1.0)
                } else {
                    self.h * ((t0 / self.h).ceil() - 1.0)
                }
            }
        };
        Grid {
            origin,
            step,
            count: 0,
        }
    }

    fn flush_pending(&mut self) {
        if let Some(p) = self.pending.take() {
            self.handler.sample(p.t, &p.y, &p.y_dot, false);
        }
    }
}

impl<const N: usize, H: SampleHandler<N>> StepHandler<N> for StepNormalizer<N, H> {
    fn handle_step(&mut self, interp: &StepInterpolator<N>, is_last: bool) {
        let dir = if interp.is_forward() { 1.0 } else { -1.0 };

        if self.grid.is_none() {
            let t0 = interp.t_start();
            self.grid = Some(self.first_grid(t0, dir));
            if matches!(self.bounds, BoundsPolicy::First | BoundsPolicy::Both) {
                self.pending = Some(Sample {
                    t: t0,
                    y: *interp.y_start(),
                    y_dot: interp.derivative(t0),
                });
            }
        }

        let t_end = interp.t_end();
        loop {
            let t_next = match &self.grid {
                Some(grid) => grid.next_time(),
                None => break,
            };
            // The end bound is handled by the bounds policy, never as an
            // interior grid point
            if (t_next - t_end) * dir >= 0.0 {
                break;
            }
            self.flush_pending();
            self.pending = Some(Sample {
                t: t_next,
                y: interp.value(t_next),
                y_dot: interp.derivative(t_next),
            });
            if let Some(grid) = self.grid.as_mut() {
                grid.count += 1;
            }
        }

        if is_last {
            if matches!(self.bounds, BoundsPolicy::Last | BoundsPolicy::Both) {
                self.flush_pending();
                self.handler
                    .sample(t_end, interp.y_end(), interp.y_dot_end(), true);
            } else if let Some(p) = self.pending.take() {
                self.handler.sample(p.t, &p.y, &p.y_dot, true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{Dp54, OdeSystem, Tolerances};
    use approx::assert_relative_eq;

    /// Collects every sample delivered by the normalizer
    #[derive(Default)]
    struct Collector {
        samples: Vec<(f64, f64, bool)>,
    }

    impl SampleHandler<1> for Collector {
        fn sample(&mut self, t: f64, y: &[f64; 1], _y_dot: &[f64; 1], is_last: bool) {
            self.samples.push((t, y[0], is_last));
        }
    }

    /// Committed steps of y' = 1, y(0) = y0, split at the given times
    fn feed_linear_steps<H: SampleHandler<1>>(
        normalizer: &mut StepNormalizer<1, H>,
        y0: f64,
        boundaries: &[f64],
    ) {
        for (i, pair) in boundaries.windows(2).enumerate() {
            let (a, b) = (pair[0], pair[1]);
            let interp = StepInterpolator::new(
                a,
                [y0 + (a - boundaries[0])],
                [1.0],
                b,
                [y0 + (b - boundaries[0])],
                [1.0],
            );
            normalizer.handle_step(&interp, i == boundaries.len() - 2);
        }
    }

    #[test]
    fn test_increment_neither_interior_only() {
        // Span [0, 30] at spacing 3: the bounds are excluded, giving
        // exactly 3, 6, ..., 27
        let mut norm = StepNormalizer::new(
            3.0,
            SamplingMode::Increment,
            BoundsPolicy::Neither,
            Collector::default(),
        )
        .unwrap();

        feed_linear_steps(&mut norm, 0.0, &[0.0, 7.0, 16.0, 30.0]);
        let samples = norm.into_inner().samples;

        let expected: Vec<f64> = (1..=9).map(|k| 3.0 * k as f64).collect();
        let times: Vec<f64> = samples.iter().map(|s| s.0).collect();
        assert_eq!(times, expected, "grid times");

        // Interpolated values track y = t
        for &(t, y, _) in &samples {
            assert_relative_eq!(y, t, max_relative = 1e-12);
        }

        // is_last on the final interior point only
        let last_count = samples.iter().filter(|s| s.2).count();
        assert_eq!(last_count, 1);
        let last = samples.last().unwrap();
        assert!(last.2);
        assert_eq!(last.0, 27.0);
    }

    #[test]
    fn test_both_bounds_emitted() {
        let mut norm = StepNormalizer::new(
            3.0,
            SamplingMode::Increment,
            BoundsPolicy::Both,
            Collector::default(),
        )
        .unwrap();

        feed_linear_steps(&mut norm, 0.0, &[0.0, 7.0, 16.0, 30.0]);
        let samples = norm.into_inner().samples;

        let times: Vec<f64> = samples.iter().map(|s| s.0).collect();
        let mut expected = vec![0.0];
        expected.extend((1..=9).map(|k| 3.0 * k as f64));
        expected.push(30.0);
        assert_eq!(times, expected);

        // Only the end bound carries is_last
        assert!(samples.last().unwrap().2);
        assert_eq!(samples.iter().filter(|s| s.2).count(), 1);
    }

    #[test]
    fn test_multiples_mode_ignores_start_offset() {
        // Starting at t = 1.5 with h = 1, multiples are 2, 3, 4 inside
        // [1.5, 5), plus the end bound
        let mut norm = StepNormalizer::new(
            1.0,
            SamplingMode::Multiples,
            BoundsPolicy::Last,
            Collector::default(),
        )
        .unwrap();

        feed_linear_steps(&mut norm, 0.0, &[1.5, 3.2, 5.0]);
        let samples = norm.into_inner().samples;

        let times: Vec<f64> = samples.iter().map(|s| s.0).collect();
        assert_eq!(times, vec![2.0, 3.0, 4.0, 5.0]);
        assert!(samples.last().unwrap().2);
    }

    #[test]
    fn test_backward_grid() {
        // Backward span [10, 0] at spacing 2: interior points 8, 6, 4, 2
        let mut norm = StepNormalizer::new(
            2.0,
            SamplingMode::Increment,
            BoundsPolicy::Neither,
            Collector::default(),
        )
        .unwrap();

        for (i, pair) in [(10.0, 4.0), (4.0, 0.0)].iter().enumerate() {
            let (a, b): (f64, f64) = *pair;
            let interp = StepInterpolator::new(a, [a], [1.0], b, [b], [1.0]);
            norm.handle_step(&interp, i == 1);
        }
        let samples = norm.into_inner().samples;

        let times: Vec<f64> = samples.iter().map(|s| s.0).collect();
        assert_eq!(times, vec![8.0, 6.0, 4.0, 2.0]);
        assert!(samples.last().unwrap().2);
    }

    #[test]
    fn test_no_grid_point_inside_span() {
        // Span shorter than the spacing with Neither: nothing is emitted
        let mut norm = StepNormalizer::new(
            3.0,
            SamplingMode::Increment,
            BoundsPolicy::Neither,
            Collector::default(),
        )
        .unwrap();

        feed_linear_steps(&mut norm, 0.0, &[0.0, 2.0]);
        assert!(norm.into_inner().samples.is_empty());
    }

    #[test]
    fn test_invalid_spacing_rejected() {
        let r = StepNormalizer::new(
            0.0,
            SamplingMode::Increment,
            BoundsPolicy::Neither,
            Collector::default(),
        );
        assert!(r.is_err());
        let r = StepNormalizer::new(
            -1.0,
            SamplingMode::Increment,
            BoundsPolicy::Neither,
            Collector::default(),
        );
        assert!(r.is_err());
    }

    /// End-to-end: resample an adaptive run of the harmonic oscillator
    #[test]
    fn test_resampled_integration() {
        struct Harmonic;
        impl OdeSystem<2> for Harmonic {
            fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) {
                dydt[0] = y[1];
                dydt[1] = -y[0];
            }
        }

        struct CosCheck {
            count: usize,
        }
        impl SampleHandler<2> for CosCheck {
            fn sample(&mut self, t: f64, y: &[f64; 2], y_dot: &[f64; 2], _is_last: bool) {
                // Grid times are exact multiples of the spacing
                let k = (t / 0.5).round();
                assert!(
                    (t - 0.5 * k).abs() < 1e-12,
                    "sample time {} off the grid",
                    t
                );
                assert!((y[0] - t.cos()).abs() < 1e-6, "y({}) = {}", t, y[0]);
                assert!((y_dot[0] - y[1]).abs() < 1e-6);
                self.count += 1;
            }
        }

        let mut norm = StepNormalizer::new(
            0.5,
            SamplingMode::Increment,
            BoundsPolicy::Neither,
            CosCheck { count: 0 },
        )
        .unwrap();

        let mut solver = Dp54::new(Tolerances::new(1e-10, 1e-10));
        solver
            .integrate_with_handler(&Harmonic, 0.0, &[1.0, 0.0], 6.0, 0.1, &mut norm)
            .unwrap();

        // Interior points 0.5 .. 5.5
        assert_eq!(norm.handler().count, 11);
    }
}
