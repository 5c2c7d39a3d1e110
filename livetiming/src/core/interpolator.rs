use crate::core::sample_buffer::SampleBuffer;
use helpers::general::circular_lerp;

/// interpolate_progress returns the lap fraction of a car at `render_time` (ms). Outside of the
/// buffered time span the first or last sample is held. Returns None for an empty buffer.
pub fn interpolate_progress(buffer: &SampleBuffer, render_time: f64) -> Option<f64> {
    let first = buffer.first()?;
    let last = buffer.last()?;

    if render_time <= first.received_at {
        return Some(first.progress);
    }
    if render_time >= last.received_at {
        return Some(last.progress);
    }

    // first <= render_time < last holds, therefore a bracketing pair with t1 > t0 exists
    let (s0, s1) = buffer
        .iter()
        .zip(buffer.iter().skip(1))
        .find(|(_, s1)| render_time < s1.received_at)?;

    let u = (render_time - s0.received_at) / (s1.received_at - s0.received_at);
    Some(circular_lerp(s0.progress, s1.progress, u))
}
