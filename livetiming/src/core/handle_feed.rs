use crate::core::track::{SectorBoundaries, NO_SECTORS};
use crate::core::track_path::TrackPath;
use crate::interfaces::telemetry::{LapSegments, PositionUpdate, SegmentStatus, TelemetryBatch};
use crate::pre::read_live_pars::LivePars;
use anyhow::Context;
use flume::Sender;
use helpers::general::wrap_progress;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use std::thread::sleep;
use std::time::{Duration, Instant};

const FEED_POLL_INTERVAL_MS: u64 = 10;

/// * `update_interval_ms` - (ms) Mean time between two telemetry batches
/// * `interval_jitter_ms` - (ms) Maximum deviation from the mean interval
/// * `progress_noise` - (lap fraction) Standard deviation of the reported progress
/// * `glitch_probability` - Probability of a mis-projected sample jumping backwards
/// * `retire_probability` - Probability per batch and car that the car retires
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeedPars {
    pub update_interval_ms: f64,
    pub interval_jitter_ms: f64,
    pub progress_noise: f64,
    pub glitch_probability: f64,
    pub retire_probability: f64,
}

impl Default for FeedPars {
    fn default() -> Self {
        FeedPars {
            update_interval_ms: 1000.0,
            interval_jitter_ms: 300.0,
            progress_noise: 0.002,
            glitch_probability: 0.02,
            retire_probability: 0.0,
        }
    }
}

#[derive(Debug)]
struct SimCar {
    car_no: u32,
    laptime_distr: Normal<f64>,
    t_lap_cur: f64,
    lap_dist: f64,
    lap: u32,
    retired: bool,
    segments: LapSegments,
}

/// SyntheticFeed stands in for the live timing source: cars lap the track with varying lap times
/// and are reported in irregular batches with noise, occasional backward glitches and retirements.
#[derive(Debug)]
pub struct SyntheticFeed {
    feed_pars: FeedPars,
    sectors: SectorBoundaries,
    mini_segments: [usize; NO_SECTORS],
    track_path: Option<TrackPath>,
    cars: Vec<SimCar>,
    t_sim: f64,
    t_next_emit: f64,
    noise_distr: Normal<f64>,
    rng: StdRng,
}

impl SyntheticFeed {
    pub fn new(
        live_pars: &LivePars,
        track_path: Option<TrackPath>,
        seed: Option<u64>,
    ) -> anyhow::Result<SyntheticFeed> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mini_segments = live_pars.track_pars.mini_segments;
        let mut cars = Vec::with_capacity(live_pars.car_pars_all.len());

        for (i, car_pars) in live_pars.car_pars_all.iter().enumerate() {
            let std_dev = (1.0 - car_pars.consistency).max(0.0) * 2.0;
            let laptime_distr = Normal::new(car_pars.t_lap, std_dev).context(format!(
                "Invalid lap time distribution for car {}!",
                car_pars.car_no
            ))?;

            // grid slots just before the start/finish line
            cars.push(SimCar {
                car_no: car_pars.car_no,
                t_lap_cur: laptime_distr.sample(&mut rng),
                laptime_distr,
                lap_dist: wrap_progress(-0.005 * (i + 1) as f64),
                lap: 0,
                retired: false,
                segments: LapSegments::new(mini_segments),
            });
        }

        let noise_distr = Normal::new(0.0, live_pars.feed_pars.progress_noise)
            .context("Invalid progress noise!")?;

        Ok(SyntheticFeed {
            feed_pars: live_pars.feed_pars.to_owned(),
            sectors: live_pars.track_pars.sectors,
            mini_segments,
            track_path,
            cars,
            t_sim: 0.0,
            t_next_emit: 0.0,
            noise_distr,
            rng,
        })
    }

    /// get_true_progress returns the noise-free lap fraction of a car.
    pub fn get_true_progress(&self, car_no: u32) -> Option<f64> {
        self.cars
            .iter()
            .find(|car| car.car_no == car_no && !car.retired)
            .map(|car| wrap_progress(self.sectors.start_finish + car.lap_dist))
    }

    pub fn get_t_next_emit(&self) -> f64 {
        self.t_next_emit
    }

    /// poll advances the simulation to `t` (ms) and returns a batch if one is due.
    pub fn poll(&mut self, t: f64) -> Option<TelemetryBatch> {
        self.advance(t);

        if t < self.t_next_emit {
            return None;
        }

        let jitter = self.feed_pars.interval_jitter_ms;
        let jitter = if jitter > 0.0 {
            self.rng.gen_range(-jitter..=jitter)
        } else {
            0.0
        };
        self.t_next_emit += (self.feed_pars.update_interval_ms + jitter).max(1.0);

        Some(self.build_batch())
    }

    fn advance(&mut self, t: f64) {
        let dt = t - self.t_sim;
        if dt <= 0.0 {
            return;
        }
        self.t_sim = t;

        for car in self.cars.iter_mut().filter(|car| !car.retired) {
            car.lap_dist += dt / (car.t_lap_cur * 1000.0);

            if car.lap_dist >= 1.0 {
                car.lap_dist -= 1.0;
                car.lap += 1;
                car.t_lap_cur = car.laptime_distr.sample(&mut self.rng);
                car.segments = LapSegments::new(self.mini_segments);
            }

            // reveal codes of the mini-segments passed so far
            for sector in 0..NO_SECTORS {
                let end_dists = self.sectors.segment_end_dists(sector, self.mini_segments[sector]);
                let codes = car.segments.sector_mut(sector);

                for (code, &end_dist) in codes.iter_mut().zip(end_dists.iter()) {
                    if *code == 0 && car.lap_dist >= end_dist {
                        let r: f64 = self.rng.gen();
                        *code = if r < 0.1 {
                            SegmentStatus::PURPLE
                        } else if r < 0.3 {
                            SegmentStatus::YELLOW
                        } else {
                            SegmentStatus::GREEN
                        };
                    }
                }
            }
        }
    }

    fn build_batch(&mut self) -> TelemetryBatch {
        let mut updates = Vec::with_capacity(self.cars.len());

        for car in self.cars.iter_mut() {
            if car.retired {
                continue;
            }
            if self.rng.gen::<f64>() < self.feed_pars.retire_probability {
                car.retired = true;
                log::info!("Car {} retired from the synthetic feed", car.car_no);
                continue;
            }

            let progress = wrap_progress(self.sectors.start_finish + car.lap_dist);
            let reported = if self.rng.gen::<f64>() < self.feed_pars.glitch_probability {
                wrap_progress(progress - 0.1)
            } else {
                wrap_progress(progress + self.noise_distr.sample(&mut self.rng))
            };
            let pos = self
                .track_path
                .as_ref()
                .map(|track_path| track_path.point_at_progress(progress))
                .unwrap_or_default();

            updates.push(PositionUpdate {
                car_no: car.car_no,
                progress: Some(reported),
                x: pos.x,
                y: pos.y,
                lap: Some(car.lap),
                segments: Some(car.segments.to_owned()),
            });
        }

        TelemetryBatch { updates }
    }
}

/// handle_feed runs the synthetic feed in real time and sends its batches to the receiver until
/// `duration_s` is over or the receiver hung up. Returns the number of sent batches.
pub fn handle_feed(
    live_pars: &LivePars,
    track_path: Option<TrackPath>,
    tx: &Sender<TelemetryBatch>,
    realtime_factor: f64,
    duration_s: Option<f64>,
) -> anyhow::Result<u64> {
    let mut feed = SyntheticFeed::new(live_pars, track_path, None)?;
    let t_start = Instant::now();
    let mut no_sent = 0;
    let mut t_prev_poll = Instant::now();

    log::info!(
        "Starting synthetic telemetry feed for {} cars",
        live_pars.car_pars_all.len()
    );

    loop {
        let t_sim = t_start.elapsed().as_secs_f64() * 1000.0 * realtime_factor;

        if matches!(duration_s, Some(duration_s) if t_sim > duration_s * 1000.0) {
            break;
        }

        let poll_gap = t_prev_poll.elapsed();
        if poll_gap > Duration::from_millis(10 * FEED_POLL_INTERVAL_MS) {
            log::warn!(
                "Synthetic feed fell behind real time, last poll was {}ms ago",
                poll_gap.as_millis()
            );
        }
        t_prev_poll = Instant::now();

        if let Some(batch) = feed.poll(t_sim) {
            if tx.send(batch).is_err() {
                log::info!("Receiver closed, stopping the synthetic telemetry feed");
                break;
            }
            no_sent += 1;
        }

        sleep(Duration::from_millis(FEED_POLL_INTERVAL_MS));
    }

    Ok(no_sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::car::CarPars;
    use crate::core::render_driver::TimingPars;
    use crate::core::track::TrackPars;

    fn live_pars(feed_pars: FeedPars) -> LivePars {
        LivePars {
            timing_pars: TimingPars::default(),
            track_pars: TrackPars {
                name: String::from("Test"),
                sectors: SectorBoundaries::default(),
                mini_segments: [4, 4, 4],
            },
            car_pars_all: vec![
                CarPars {
                    car_no: 1,
                    initials: String::from("AAA"),
                    color: String::from("#ff0000"),
                    t_lap: 10.0,
                    consistency: 1.0,
                },
                CarPars {
                    car_no: 2,
                    initials: String::from("BBB"),
                    color: String::from("#00ff00"),
                    t_lap: 11.0,
                    consistency: 0.9,
                },
            ],
            feed_pars,
        }
    }

    #[test]
    fn emits_batches_at_update_interval() {
        let feed_pars = FeedPars {
            interval_jitter_ms: 0.0,
            ..FeedPars::default()
        };
        let mut feed = SyntheticFeed::new(&live_pars(feed_pars), None, Some(1)).unwrap();

        let mut no_batches = 0;
        let mut t = 0.0;
        while t <= 5000.0 {
            if let Some(batch) = feed.poll(t) {
                assert_eq!(batch.updates.len(), 2);
                assert!(batch.updates.iter().all(|update| update.progress.is_some()));
                no_batches += 1;
            }
            t += 10.0;
        }

        // at 0, 1000, ..., 5000 ms
        assert_eq!(no_batches, 6);
    }

    #[test]
    fn noise_free_feed_reports_true_progress() {
        let feed_pars = FeedPars {
            interval_jitter_ms: 0.0,
            progress_noise: 0.0,
            glitch_probability: 0.0,
            ..FeedPars::default()
        };
        let mut feed = SyntheticFeed::new(&live_pars(feed_pars), None, Some(2)).unwrap();
        feed.poll(0.0);

        let batch = feed.poll(3000.0).unwrap();
        let reported = batch.updates[0].progress.unwrap();
        assert_eq!(Some(reported), feed.get_true_progress(1));
        assert_eq!(batch.updates[0].lap, Some(1));
    }

    #[test]
    fn retired_cars_leave_the_batch() {
        let feed_pars = FeedPars {
            retire_probability: 1.0,
            ..FeedPars::default()
        };
        let mut feed = SyntheticFeed::new(&live_pars(feed_pars), None, Some(3)).unwrap();
        let batch = feed.poll(0.0).unwrap();
        assert!(batch.updates.is_empty());
        assert!(feed.get_true_progress(1).is_none());
    }

    #[test]
    fn passed_segments_get_codes() {
        let feed_pars = FeedPars {
            interval_jitter_ms: 0.0,
            ..FeedPars::default()
        };
        let mut feed = SyntheticFeed::new(&live_pars(feed_pars), None, Some(4)).unwrap();
        feed.poll(0.0);

        // car 1 needs 10s per lap, after 5s it is roughly at half distance
        let batch = feed.poll(5000.0).unwrap();
        let segments = batch.updates[0].segments.as_ref().unwrap();
        assert!(segments.sector1.iter().all(|&code| code != 0));
        assert!(segments.sector3.iter().all(|&code| code == 0));
    }

    #[test]
    fn handle_feed_stops_after_duration() {
        let (tx, rx) = flume::unbounded();
        let live_pars = live_pars(FeedPars::default());
        let no_sent = handle_feed(&live_pars, None, &tx, 100.0, Some(2.0)).unwrap();

        assert!(no_sent >= 1);
        assert_eq!(rx.try_iter().count() as u64, no_sent);
    }

    #[test]
    fn handle_feed_stops_without_receiver() {
        let (tx, rx) = flume::unbounded::<TelemetryBatch>();
        drop(rx);
        let no_sent = handle_feed(&live_pars(FeedPars::default()), None, &tx, 1.0, None).unwrap();
        assert_eq!(no_sent, 0);
    }
}
