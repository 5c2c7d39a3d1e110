use std::error::Error;
use std::fmt;

/// InputValueError is used if some option or parameter does not fulfill the posed requirements,
/// e.g., a sector boundary outside of [0.0, 1.0[.
#[derive(Debug, Clone)]
pub struct InputValueError {
    pub msg: String,
}

impl InputValueError {
    pub fn new(msg: &str) -> InputValueError {
        InputValueError {
            msg: msg.to_owned(),
        }
    }
}

impl fmt::Display for InputValueError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid input value: {}", self.msg)
    }
}

impl Error for InputValueError {}

/// wrap_progress maps an arbitrary lap fraction onto the circle [0.0, 1.0[.
pub fn wrap_progress(p: f64) -> f64 {
    let wrapped = p.rem_euclid(1.0);

    // rem_euclid can return exactly 1.0 for tiny negative inputs due to rounding
    if wrapped >= 1.0 {
        0.0
    } else {
        wrapped
    }
}

/// shortest_circular_delta returns the signed progress difference from `from` to `to` taking the
/// shorter way around the loop. The result lies in ]-0.5, 0.5].
pub fn shortest_circular_delta(from: f64, to: f64) -> f64 {
    let delta = wrap_progress(to - from);

    if delta > 0.5 {
        delta - 1.0
    } else {
        delta
    }
}

/// forward_distance returns the one-directional distance (always >= 0.0) that has to be driven
/// from `from` to reach `to`.
pub fn forward_distance(from: f64, to: f64) -> f64 {
    wrap_progress(to - from)
}

/// circular_lerp interpolates between two lap fractions along the shorter arc, e.g.
/// circular_lerp(0.95, 0.05, 0.5) is 0.0 and not 0.5.
pub fn circular_lerp(from: f64, to: f64, u: f64) -> f64 {
    wrap_progress(from + shortest_circular_delta(from, to) * u)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn lerp_crosses_the_seam() {
        let p = circular_lerp(0.95, 0.05, 0.5);
        // 0.0 may come back as something just below 1.0
        assert_abs_diff_eq!(shortest_circular_delta(0.0, p), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn lerp_without_seam_is_plain_lerp() {
        assert_abs_diff_eq!(circular_lerp(0.2, 0.4, 0.25), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn delta_picks_shorter_direction() {
        assert_abs_diff_eq!(shortest_circular_delta(0.9, 0.1), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(shortest_circular_delta(0.1, 0.9), -0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(shortest_circular_delta(0.5, 0.4), -0.1, epsilon = 1e-12);
    }

    #[test]
    fn delta_half_lap_is_positive() {
        assert_abs_diff_eq!(shortest_circular_delta(0.0, 0.5), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(shortest_circular_delta(0.5, 0.0), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn forward_distance_wraps() {
        assert_abs_diff_eq!(forward_distance(0.8, 0.1), 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(forward_distance(0.1, 0.8), 0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(forward_distance(0.3, 0.3), 0.0);
    }

    #[test]
    fn wrap_handles_negative_values() {
        assert_abs_diff_eq!(wrap_progress(-0.25), 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_progress(1.25), 0.25, epsilon = 1e-12);
        assert!(wrap_progress(-1e-18) < 1.0);
    }
}
