use crate::core::render_driver::TimingPars;
use helpers::buffer::RingBuffer;
use helpers::general::{shortest_circular_delta, wrap_progress};
use std::collections::vec_deque::Iter;

/// Sample is one accepted progress report of a car.
///
/// * `progress` - Lap fraction in [0.0, 1.0[
/// * `received_at` - (ms) Arrival time on the local clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub progress: f64,
    pub received_at: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    /// moved backwards by more than the tolerated jump (mis-projected telemetry)
    Backward,
    /// no meaningful motion compared with the last stored sample
    Duplicate,
    /// arrived with a timestamp older than the last stored sample
    Stale,
}

/// SampleBuffer keeps the most recent samples of one car, oldest first, with non-decreasing
/// arrival times.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: RingBuffer<Sample>,
    max_backward_jump: f64,
    min_progress_delta: f64,
}

impl SampleBuffer {
    pub fn new(timing_pars: &TimingPars) -> SampleBuffer {
        SampleBuffer {
            samples: RingBuffer::new(timing_pars.buffer_capacity),
            max_backward_jump: timing_pars.max_backward_jump,
            min_progress_delta: timing_pars.min_progress_delta,
        }
    }

    /// push filters a new progress report against the last stored sample and appends it if it
    /// passes. The oldest sample is dropped if the capacity is exceeded.
    pub fn push(&mut self, progress: f64, now: f64) -> PushOutcome {
        let progress = wrap_progress(progress);

        if let Some(last) = self.samples.back() {
            if now < last.received_at {
                return PushOutcome::Stale;
            }

            let delta = shortest_circular_delta(last.progress, progress);

            if delta < -self.max_backward_jump {
                return PushOutcome::Backward;
            }
            if delta.abs() <= self.min_progress_delta {
                return PushOutcome::Duplicate;
            }
        }

        self.samples.push(Sample {
            progress,
            received_at: now,
        });
        PushOutcome::Accepted
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.front()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn iter(&self) -> Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
