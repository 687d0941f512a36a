use std::time::Duration;

use crate::config::FilterConfig;

/// Low-pass filter component
struct LowPassFilter {
    prev: Option<f32>,
}

impl LowPassFilter {
    fn new() -> Self {
        Self { prev: None }
    }

    fn filter(&mut self, value: f32, alpha: f32) -> f32 {
        match self.prev {
            Some(prev) => {
                let result = alpha * value + (1.0 - alpha) * prev;
                self.prev = Some(result);
                result
            }
            None => {
                self.prev = Some(value);
                value
            }
        }
    }

    fn reset(&mut self) {
        self.prev = None;
    }
}

/// alpha = 1 / (1 + tau/Te), tau = 1/(2*pi*fc)
fn smoothing_factor(te: f32, cutoff: f32) -> f32 {
    let r = 2.0 * std::f32::consts::PI * cutoff * te;
    r / (r + 1.0)
}

/// One Euro Filter for a single scalar signal.
///
/// Time steps come from frame timestamps, never the wall clock.
pub struct OneEuroFilter {
    min_cutoff: f32,
    beta: f32,
    d_cutoff: f32,
    x_filter: LowPassFilter,
    dx_filter: LowPassFilter,
    prev: Option<(f32, Duration)>,
}

impl OneEuroFilter {
    pub fn new(min_cutoff: f32, beta: f32) -> Self {
        Self {
            min_cutoff,
            beta,
            d_cutoff: 1.0,
            x_filter: LowPassFilter::new(),
            dx_filter: LowPassFilter::new(),
            prev: None,
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(config.min_cutoff, config.beta)
    }

    pub fn filter(&mut self, value: f32, timestamp: Duration) -> f32 {
        let (prev_value, prev_time) = match self.prev {
            Some(prev) => prev,
            None => {
                self.prev = Some((value, timestamp));
                return self.x_filter.filter(value, 1.0);
            }
        };
        self.prev = Some((value, timestamp));

        let dt = timestamp.saturating_sub(prev_time).as_secs_f32();
        // 同一タイムスタンプは 30fps 相当とみなす
        let dt = if dt > 0.0 { dt } else { 1.0 / 30.0 };

        let dx = (value - prev_value) / dt;
        let edx = self.dx_filter.filter(dx, smoothing_factor(dt, self.d_cutoff));
        let cutoff = self.min_cutoff + self.beta * edx.abs();
        self.x_filter.filter(value, smoothing_factor(dt, cutoff))
    }

    pub fn reset(&mut self) {
        self.x_filter.reset();
        self.dx_filter.reset();
        self.prev = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_smoothing_factor_bounds() {
        for &cutoff in &[0.1, 1.0, 10.0, 100.0] {
            for &te in &[0.001, 0.01, 0.033, 0.1] {
                let alpha = smoothing_factor(te, cutoff);
                assert!(alpha > 0.0 && alpha < 1.0, "alpha={} for te={}, cutoff={}", alpha, te, cutoff);
            }
        }
    }

    #[test]
    fn test_first_value_passthrough() {
        let mut f = OneEuroFilter::new(1.0, 0.0);
        assert_eq!(f.filter(5.0, ms(0)), 5.0);
    }

    #[test]
    fn test_smooths_step() {
        let mut f = OneEuroFilter::new(1.0, 0.0);
        f.filter(0.0, ms(0));
        let result = f.filter(10.0, ms(33));
        assert!(result < 10.0, "Expected smoothing, got {}", result);
        assert!(result > 0.0, "Expected positive value, got {}", result);
    }

    #[test]
    fn test_high_beta_responsive() {
        let mut f_low_beta = OneEuroFilter::new(1.0, 0.0);
        let mut f_high_beta = OneEuroFilter::new(1.0, 1.0);

        f_low_beta.filter(0.0, ms(0));
        f_high_beta.filter(0.0, ms(0));

        let r_low = f_low_beta.filter(10.0, ms(33));
        let r_high = f_high_beta.filter(10.0, ms(33));

        assert!(r_high > r_low, "High beta ({}) should be more responsive than low beta ({})", r_high, r_low);
    }

    #[test]
    fn test_converges_on_constant_input() {
        let mut f = OneEuroFilter::new(3.0, 0.5);
        f.filter(0.0, ms(0));
        let mut out = 0.0;
        for i in 1..=60 {
            out = f.filter(1.0, ms(i * 33));
        }
        assert!((out - 1.0).abs() < 1e-3, "got {}", out);
    }

    #[test]
    fn test_reset() {
        let mut f = OneEuroFilter::new(1.0, 0.0);
        f.filter(1.0, ms(0));
        f.filter(2.0, ms(33));
        f.reset();
        assert_eq!(f.filter(10.0, ms(66)), 10.0);
    }
}
