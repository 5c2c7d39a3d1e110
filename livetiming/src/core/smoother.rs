use crate::core::render_driver::TimingPars;
use helpers::general::circular_lerp;
use std::collections::HashMap;

/// smooth_step is a discrete first-order low-pass filter on the circular progress signal. Without
/// a previous value, for a non-positive frame time or after a gap of at least `reset_gap_ms`
/// (e.g. a backgrounded window) the target is adopted directly.
pub fn smooth_step(
    prev: Option<f64>,
    target: f64,
    dt: Option<f64>,
    tau_ms: f64,
    reset_gap_ms: f64,
) -> f64 {
    match (prev, dt) {
        (Some(prev), Some(dt)) if dt > 0.0 && dt < reset_gap_ms => {
            let blend = 1.0 - (-dt / tau_ms).exp();
            circular_lerp(prev, target, blend)
        }
        _ => target,
    }
}

/// ProgressSmoother holds the rendered lap fraction of every car, i.e. where the car visually
/// is. All cars share one frame clock.
#[derive(Debug, Clone)]
pub struct ProgressSmoother {
    tau_ms: f64,
    reset_gap_ms: f64,
    last_frame_time: Option<f64>,
    rendered: HashMap<u32, f64>,
}

impl ProgressSmoother {
    pub fn new(timing_pars: &TimingPars) -> ProgressSmoother {
        ProgressSmoother {
            tau_ms: timing_pars.smoothing_tau_ms,
            reset_gap_ms: timing_pars.smoothing_reset_gap_ms,
            last_frame_time: None,
            rendered: HashMap::new(),
        }
    }

    /// begin_frame advances the shared clock and returns the time since the previous frame (None
    /// on the very first frame).
    pub fn begin_frame(&mut self, now: f64) -> Option<f64> {
        let dt = self.last_frame_time.map(|t_prev| now - t_prev);
        self.last_frame_time = Some(now);
        dt
    }

    /// smooth filters the interpolated target of a car and stores the result as its rendered
    /// progress.
    pub fn smooth(&mut self, car_no: u32, target: f64, dt: Option<f64>) -> f64 {
        let prev = self.rendered.get(&car_no).copied();
        let smoothed = smooth_step(prev, target, dt, self.tau_ms, self.reset_gap_ms);
        self.rendered.insert(car_no, smoothed);
        smoothed
    }

    pub fn get(&self, car_no: u32) -> Option<f64> {
        self.rendered.get(&car_no).copied()
    }

    pub fn rendered(&self) -> &HashMap<u32, f64> {
        &self.rendered
    }

    pub fn remove(&mut self, car_no: u32) {
        self.rendered.remove(&car_no);
    }

    pub fn clear(&mut self) {
        self.rendered.clear();
        self.last_frame_time = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn converges_monotonically_to_fixed_target() {
        let mut smoother = ProgressSmoother::new(&TimingPars::default());
        smoother.begin_frame(0.0);
        smoother.smooth(1, 0.10, None);

        let mut prev = 0.10;
        let mut now = 0.0;
        for _ in 0..10 {
            now += 16.0;
            let dt = smoother.begin_frame(now);
            let p = smoother.smooth(1, 0.30, dt);
            assert!(p > prev, "{} did not increase over {}", p, prev);
            assert!(p < 0.30);
            prev = p;
        }

        // exp(-dt/tau) per frame: about 85 frames of 16ms for the remaining gap to drop below 0.001
        for _ in 0..90 {
            now += 16.0;
            let dt = smoother.begin_frame(now);
            prev = smoother.smooth(1, 0.30, dt);
        }
        assert_abs_diff_eq!(prev, 0.30, epsilon = 0.001);
    }

    #[test]
    fn first_value_is_adopted() {
        assert_eq!(smooth_step(None, 0.7, Some(16.0), 250.0, 200.0), 0.7);
    }

    #[test]
    fn large_gap_resets() {
        assert_eq!(smooth_step(Some(0.1), 0.7, Some(200.0), 250.0, 200.0), 0.7);
        assert_eq!(smooth_step(Some(0.1), 0.7, Some(0.0), 250.0, 200.0), 0.7);
        assert_eq!(smooth_step(Some(0.1), 0.7, None, 250.0, 200.0), 0.7);
    }

    #[test]
    fn smooths_across_the_seam() {
        let p = smooth_step(Some(0.99), 0.01, Some(100.0), 250.0, 200.0);
        assert!(p > 0.99 || p < 0.01, "took the long way round: {}", p);
    }
}
