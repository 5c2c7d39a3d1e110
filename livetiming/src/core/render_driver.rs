use crate::core::interpolator::interpolate_progress;
use crate::core::sample_buffer::{PushOutcome, SampleBuffer};
use crate::core::segments::{SegmentBuffer, SegmentTracker};
use crate::core::smoother::ProgressSmoother;
use crate::core::track::{SectorBoundaries, Track, NO_SECTORS};
use crate::core::track_path::TrackPath;
use crate::interfaces::gui_interface::{CarTransform, RenderTarget};
use crate::interfaces::telemetry::{LapSegments, TelemetryBatch};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// * `render_delay_ms` - (ms) Jitter buffer delay, cars are rendered where they were this long ago
/// * `smoothing_tau_ms` - (ms) Time constant of the exponential smoother
/// * `smoothing_reset_gap_ms` - (ms) Frame gaps of at least this size skip smoothing
/// * `buffer_capacity` - Number of samples kept per car
/// * `max_backward_jump` - (lap fraction) Larger backward jumps are rejected as artifacts
/// * `min_progress_delta` - (lap fraction) Smaller changes are rejected as duplicates
/// * `tangent_epsilon` - (lap fraction) Offset of the two points the heading is computed from
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TimingPars {
    pub render_delay_ms: f64,
    pub smoothing_tau_ms: f64,
    pub smoothing_reset_gap_ms: f64,
    pub buffer_capacity: usize,
    pub max_backward_jump: f64,
    pub min_progress_delta: f64,
    pub tangent_epsilon: f64,
}

impl Default for TimingPars {
    fn default() -> Self {
        TimingPars {
            render_delay_ms: 400.0,
            smoothing_tau_ms: 250.0,
            smoothing_reset_gap_ms: 200.0,
            buffer_capacity: 10,
            max_backward_jump: 0.04,
            min_progress_delta: 0.00005,
            tangent_epsilon: 0.005,
        }
    }
}

/// IngestStats counts what happened to the incoming samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub no_batches: u64,
    pub no_accepted: u64,
    pub no_backward: u64,
    pub no_duplicate: u64,
    pub no_stale: u64,
    pub no_without_progress: u64,
    pub no_removed_cars: u64,
}

/// CarFeed is the ingestion side state of one car.
#[derive(Debug)]
struct CarFeed {
    buffer: SampleBuffer,
    lap: Option<u32>,
    segments: Option<LapSegments>,
}

pub type SegmentCallback = Box<dyn FnMut(&HashMap<u32, SegmentBuffer>)>;

/// RenderDriver runs the per-frame pipeline sample buffer -> interpolation -> smoothing -> track
/// path and writes the result into the registered render targets. It is driven by the host's frame
/// clock and owns all per-car state; nothing else writes to the targets.
pub struct RenderDriver {
    timing_pars: TimingPars,
    track_path: Option<Rc<TrackPath>>,
    cars: HashMap<u32, CarFeed>,
    smoother: ProgressSmoother,
    targets: HashMap<u32, RenderTarget>,
    segment_tracker: SegmentTracker,
    segment_callback: Option<SegmentCallback>,
    stats: IngestStats,
    running: bool,
}

impl RenderDriver {
    pub fn new(timing_pars: &TimingPars, track: &Track) -> RenderDriver {
        RenderDriver {
            timing_pars: timing_pars.to_owned(),
            track_path: track.path.clone(),
            cars: HashMap::new(),
            smoother: ProgressSmoother::new(timing_pars),
            targets: HashMap::new(),
            segment_tracker: SegmentTracker::new(track.sectors, track.mini_segments),
            segment_callback: None,
            stats: IngestStats::default(),
            running: true,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // INGESTION -----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// ingest buffers a telemetry batch that arrived at `now` (ms). Cars that are not part of the
    /// batch lose all their state.
    pub fn ingest(&mut self, batch: &TelemetryBatch, now: f64) {
        self.stats.no_batches += 1;
        let mut present = HashSet::with_capacity(batch.updates.len());

        for update in batch.updates.iter() {
            present.insert(update.car_no);

            let progress = match update.progress {
                Some(progress) if progress.is_finite() => progress,
                _ => {
                    self.stats.no_without_progress += 1;
                    continue;
                }
            };

            let timing_pars = &self.timing_pars;
            let car = self.cars.entry(update.car_no).or_insert_with(|| CarFeed {
                buffer: SampleBuffer::new(timing_pars),
                lap: None,
                segments: None,
            });

            match car.buffer.push(progress, now) {
                PushOutcome::Accepted => self.stats.no_accepted += 1,
                PushOutcome::Backward => {
                    self.stats.no_backward += 1;
                    log::trace!(
                        "Discarded backward jump of car {} to {:.4}",
                        update.car_no,
                        progress
                    );
                }
                PushOutcome::Duplicate => self.stats.no_duplicate += 1,
                PushOutcome::Stale => {
                    self.stats.no_stale += 1;
                    log::trace!("Discarded stale sample of car {}", update.car_no);
                }
            }

            if update.lap.is_some() {
                car.lap = update.lap;
            }
            if let Some(segments) = &update.segments {
                car.segments = Some(segments.to_owned());
            }
        }

        if self.reconcile(&present) {
            self.notify_segments();
        }
    }

    /// reconcile deletes buffers, smoothed state and segment state of every car that is not in
    /// `present`. Returns true if segment buffers were deleted.
    pub fn reconcile(&mut self, present: &HashSet<u32>) -> bool {
        let gone: Vec<u32> = self
            .cars
            .keys()
            .chain(self.smoother.rendered().keys())
            .chain(self.segment_tracker.buffers().keys())
            .filter(|&&car_no| !present.contains(&car_no))
            .copied()
            .collect::<HashSet<u32>>()
            .into_iter()
            .collect();

        let mut segments_changed = false;

        for car_no in gone {
            self.cars.remove(&car_no);
            self.smoother.remove(car_no);
            segments_changed |= self.segment_tracker.remove(car_no);
            self.stats.no_removed_cars += 1;
            log::debug!("Car {} left the feed, dropped its state", car_no);
        }

        segments_changed
    }

    // ---------------------------------------------------------------------------------------------
    // FRAME TICK ----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// tick renders one frame at `now` (ms) and returns the number of targets written.
    pub fn tick(&mut self, now: f64) -> usize {
        if !self.running {
            return 0;
        }

        let dt = self.smoother.begin_frame(now);
        let render_time = now - self.timing_pars.render_delay_ms;
        let mut no_written = 0;
        let mut segments_changed = false;

        for (&car_no, car) in self.cars.iter() {
            let target_progress = match interpolate_progress(&car.buffer, render_time) {
                Some(progress) => progress,
                None => continue,
            };
            let progress = self.smoother.smooth(car_no, target_progress, dt);

            // without geometry positions and segments are not available
            let track_path = match &self.track_path {
                Some(track_path) => track_path,
                None => continue,
            };

            if let Some(target) = self.targets.get(&car_no) {
                let pos = track_path.point_at_progress(progress);
                let mut transform = target.borrow_mut();

                let eps = self.timing_pars.tangent_epsilon;
                if let Some(heading) = track_path.stable_tangent_at_progress(progress, eps) {
                    transform.heading = heading;
                }
                transform.pos = pos;
                transform.progress = progress;
                transform.written = true;
                no_written += 1;
            }

            segments_changed |= self.segment_tracker.update(
                car_no,
                progress,
                car.segments.as_ref(),
                car.lap,
            );
        }

        if segments_changed {
            self.notify_segments();
        }

        no_written
    }

    fn notify_segments(&mut self) {
        if let Some(callback) = self.segment_callback.as_mut() {
            callback(self.segment_tracker.buffers());
        }
    }

    // ---------------------------------------------------------------------------------------------
    // REGISTRATION AND LIFECYCLE ------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// register_target binds (Some) or unbinds (None) the render destination of a car. Calling it
    /// repeatedly with the same arguments has no further effect.
    pub fn register_target(&mut self, car_no: u32, target: Option<RenderTarget>) {
        match target {
            Some(target) => {
                self.targets.insert(car_no, target);
            }
            None => {
                self.targets.remove(&car_no);
            }
        }
    }

    /// target_for returns the render target of a car, registering a new one on first use. The same
    /// handle is returned for a car until it is unregistered.
    pub fn target_for(&mut self, car_no: u32) -> RenderTarget {
        Rc::clone(
            self.targets
                .entry(car_no)
                .or_insert_with(|| Rc::new(RefCell::new(CarTransform::default()))),
        )
    }

    pub fn set_segment_callback(&mut self, callback: Option<SegmentCallback>) {
        self.segment_callback = callback;
    }

    /// set_segment_scope restricts segment tracking to one car (None for all cars). A scope change
    /// replaces all segment buffers.
    pub fn set_segment_scope(&mut self, scope: Option<u32>) {
        if self.segment_tracker.set_scope(scope) {
            self.notify_segments();
        }
    }

    /// set_track replaces the geometry and discards all per-car state. Registered targets are kept
    /// and keep their last position until they are written again.
    pub fn set_track(&mut self, track: &Track) {
        log::info!("Switching live map to track {}", track.name);
        self.track_path = track.path.clone();
        self.cars.clear();
        self.smoother.clear();
        self.segment_tracker
            .set_track(track.sectors, track.mini_segments);
        self.notify_segments();
    }

    /// stop tears the frame loop down, further ticks do nothing.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // ---------------------------------------------------------------------------------------------
    // GETTERS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// rendered_progress returns the visual lap fraction of every car.
    pub fn rendered_progress(&self) -> &HashMap<u32, f64> {
        self.smoother.rendered()
    }

    pub fn segment_buffers(&self) -> &HashMap<u32, SegmentBuffer> {
        self.segment_tracker.buffers()
    }

    pub fn sample_buffer(&self, car_no: u32) -> Option<&SampleBuffer> {
        self.cars.get(&car_no).map(|car| &car.buffer)
    }

    pub fn get_stats(&self) -> IngestStats {
        self.stats
    }

    pub fn get_no_lap_resets(&self) -> u64 {
        self.segment_tracker.get_no_lap_resets()
    }

    pub fn get_car_nos(&self) -> Vec<u32> {
        let mut car_nos: Vec<u32> = self.cars.keys().copied().collect();
        car_nos.sort_unstable();
        car_nos
    }

    pub fn get_canonical_counts(&self) -> [usize; NO_SECTORS] {
        self.segment_tracker.canonical_counts()
    }

    pub fn get_sectors(&self) -> SectorBoundaries {
        self.segment_tracker.sectors()
    }
}
