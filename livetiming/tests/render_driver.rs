use approx::assert_abs_diff_eq;
use helpers::general::shortest_circular_delta;
use helpers::geometry::Point2d;
use livetiming::core::car::CarPars;
use livetiming::core::handle_feed::{FeedPars, SyntheticFeed};
use livetiming::core::render_driver::{RenderDriver, SegmentCallback, TimingPars};
use livetiming::core::track::{SectorBoundaries, Track, TrackPars};
use livetiming::core::track_path::TrackPath;
use livetiming::interfaces::telemetry::{LapSegments, PositionUpdate, SegmentStatus, TelemetryBatch};
use livetiming::pre::read_live_pars::LivePars;
use std::cell::Cell;
use std::f64::consts::FRAC_1_SQRT_2;
use std::rc::Rc;

fn unit_square() -> Vec<Point2d> {
    vec![
        Point2d::new(0.0, 0.0),
        Point2d::new(1.0, 0.0),
        Point2d::new(1.0, 1.0),
        Point2d::new(0.0, 1.0),
        Point2d::new(0.0, 0.0),
    ]
}

fn track_pars() -> TrackPars {
    TrackPars {
        name: String::from("Square"),
        sectors: SectorBoundaries::default(),
        mini_segments: [2, 2, 2],
    }
}

fn square_driver() -> RenderDriver {
    RenderDriver::new(
        &TimingPars::default(),
        &Track::new(&track_pars(), &unit_square()),
    )
}

fn update(car_no: u32, progress: f64) -> PositionUpdate {
    PositionUpdate {
        car_no,
        progress: Some(progress),
        ..PositionUpdate::default()
    }
}

fn batch(updates: Vec<PositionUpdate>) -> TelemetryBatch {
    TelemetryBatch { updates }
}

fn counting_callback(render_driver: &mut RenderDriver) -> Rc<Cell<u32>> {
    let no_calls = Rc::new(Cell::new(0));
    let no_calls_cb = Rc::clone(&no_calls);
    let callback: SegmentCallback = Box::new(move |_| no_calls_cb.set(no_calls_cb.get() + 1));
    render_driver.set_segment_callback(Some(callback));
    no_calls
}

#[test]
fn unit_square_holds_first_sample_until_second_arrives() {
    let mut render_driver = square_driver();
    let target = render_driver.target_for(1);

    render_driver.ingest(&batch(vec![update(1, 0.0)]), 0.0);
    assert_eq!(render_driver.tick(500.0), 1);

    let transform = *target.borrow();
    assert!(transform.written);
    assert_abs_diff_eq!(transform.pos.x, 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(transform.pos.y, 0.0, epsilon = 1e-9);
    // heading across the corner at the seam
    assert_abs_diff_eq!(transform.heading.x, FRAC_1_SQRT_2, epsilon = 1e-9);
    assert_abs_diff_eq!(transform.heading.y, -FRAC_1_SQRT_2, epsilon = 1e-9);

    // the frame gap of 400ms skips smoothing, the car jumps onto the delayed target
    render_driver.ingest(&batch(vec![update(1, 0.25)]), 500.0);
    render_driver.tick(900.0);

    let transform = *target.borrow();
    assert_abs_diff_eq!(transform.progress, 0.25, epsilon = 1e-9);
    assert_abs_diff_eq!(transform.pos.x, 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(transform.pos.y, 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(transform.heading.x, FRAC_1_SQRT_2, epsilon = 1e-9);
    assert_abs_diff_eq!(transform.heading.y, FRAC_1_SQRT_2, epsilon = 1e-9);
}

#[test]
fn absent_cars_lose_all_state() {
    let mut render_driver = square_driver();
    let no_calls = counting_callback(&mut render_driver);

    render_driver.ingest(&batch(vec![update(1, 0.1), update(2, 0.2)]), 0.0);
    render_driver.tick(16.0);
    assert_eq!(render_driver.get_car_nos(), vec![1, 2]);
    assert_eq!(render_driver.segment_buffers().len(), 2);
    let no_calls_before = no_calls.get();

    render_driver.ingest(&batch(vec![update(2, 0.21)]), 1000.0);

    assert_eq!(render_driver.get_car_nos(), vec![2]);
    assert!(render_driver.sample_buffer(1).is_none());
    assert!(!render_driver.rendered_progress().contains_key(&1));
    assert!(!render_driver.segment_buffers().contains_key(&1));
    assert_eq!(render_driver.get_stats().no_removed_cars, 1);
    assert_eq!(no_calls.get(), no_calls_before + 1);
}

#[test]
fn cars_without_progress_are_skipped_but_kept() {
    let mut render_driver = square_driver();
    render_driver.ingest(&batch(vec![update(5, 0.3)]), 0.0);

    let mut no_progress = update(5, 0.0);
    no_progress.progress = None;
    render_driver.ingest(&batch(vec![no_progress]), 1000.0);

    assert_eq!(render_driver.get_car_nos(), vec![5]);
    assert_eq!(render_driver.sample_buffer(5).map(|buf| buf.len()), Some(1));
    assert_eq!(render_driver.get_stats().no_without_progress, 1);
}

#[test]
fn target_handles_are_stable() {
    let mut render_driver = square_driver();
    let first = render_driver.target_for(3);
    let second = render_driver.target_for(3);
    assert!(Rc::ptr_eq(&first, &second));

    render_driver.register_target(3, None);
    render_driver.register_target(3, None);
    let third = render_driver.target_for(3);
    assert!(!Rc::ptr_eq(&first, &third));

    // unregistered handles are not written anymore
    render_driver.ingest(&batch(vec![update(3, 0.5)]), 0.0);
    render_driver.tick(16.0);
    assert!(!first.borrow().written);
    assert!(third.borrow().written);
}

#[test]
fn segment_callback_fires_only_on_change() {
    let mut render_driver = square_driver();
    let no_calls = counting_callback(&mut render_driver);

    let mut segments = LapSegments::new([2, 2, 2]);
    segments.sector1[0] = SegmentStatus::GREEN;
    let mut car = update(8, 0.2);
    car.lap = Some(3);
    car.segments = Some(segments);

    // allocation and stamping within the same tick are reported once
    render_driver.ingest(&batch(vec![car.to_owned()]), 0.0);
    render_driver.tick(0.0);
    assert_eq!(no_calls.get(), 1);
    assert_eq!(
        render_driver.segment_buffers()[&8].get(0, 0),
        Some(SegmentStatus::GREEN)
    );

    render_driver.ingest(&batch(vec![car.to_owned()]), 16.0);
    render_driver.tick(16.0);
    render_driver.tick(32.0);
    assert_eq!(no_calls.get(), 1);

    // new lap number -> fresh buffer
    car.lap = Some(4);
    car.segments = Some(LapSegments::new([2, 2, 2]));
    render_driver.ingest(&batch(vec![car]), 48.0);
    render_driver.tick(48.0);
    assert_eq!(no_calls.get(), 2);
    assert_eq!(render_driver.segment_buffers()[&8].no_stamped(), 0);
    assert_eq!(render_driver.get_no_lap_resets(), 1);
}

#[test]
fn scoped_segments_follow_one_car() {
    let mut render_driver = square_driver();
    render_driver.set_segment_scope(Some(2));

    render_driver.ingest(&batch(vec![update(1, 0.1), update(2, 0.2)]), 0.0);
    render_driver.tick(0.0);

    let car_nos: Vec<u32> = render_driver.segment_buffers().keys().copied().collect();
    assert_eq!(car_nos, vec![2]);
    // smoothing is not affected by the scope
    assert_eq!(render_driver.rendered_progress().len(), 2);
}

#[test]
fn stopped_driver_does_not_render() {
    let mut render_driver = square_driver();
    let target = render_driver.target_for(1);
    render_driver.ingest(&batch(vec![update(1, 0.4)]), 0.0);

    render_driver.stop();
    assert!(!render_driver.is_running());
    assert_eq!(render_driver.tick(16.0), 0);
    assert!(!target.borrow().written);

    render_driver.start();
    assert_eq!(render_driver.tick(32.0), 1);
    assert!(target.borrow().written);
}

#[test]
fn missing_geometry_keeps_smoothing_only() {
    let mut render_driver =
        RenderDriver::new(&TimingPars::default(), &Track::new(&track_pars(), &[]));
    let no_calls = counting_callback(&mut render_driver);
    let target = render_driver.target_for(1);

    render_driver.ingest(&batch(vec![update(1, 0.4)]), 0.0);
    assert_eq!(render_driver.tick(16.0), 0);

    assert!(!target.borrow().written);
    assert_eq!(render_driver.rendered_progress().get(&1), Some(&0.4));
    assert!(render_driver.segment_buffers().is_empty());
    assert_eq!(no_calls.get(), 0);
}

#[test]
fn track_switch_discards_car_state() {
    let mut render_driver = square_driver();
    let target = render_driver.target_for(1);
    render_driver.ingest(&batch(vec![update(1, 0.4)]), 0.0);
    render_driver.tick(16.0);

    let mut pars = track_pars();
    pars.mini_segments = [3, 3, 3];
    render_driver.set_track(&Track::new(&pars, &unit_square()));

    assert!(render_driver.get_car_nos().is_empty());
    assert!(render_driver.rendered_progress().is_empty());
    assert!(render_driver.segment_buffers().is_empty());
    assert_eq!(render_driver.get_canonical_counts(), [3, 3, 3]);
    // the registered target survives
    assert!(Rc::ptr_eq(&target, &render_driver.target_for(1)));
}

#[test]
fn synthetic_feed_renders_without_jumps() {
    let live_pars = LivePars {
        timing_pars: TimingPars::default(),
        track_pars: track_pars(),
        car_pars_all: (1..=4)
            .map(|car_no| CarPars {
                car_no,
                initials: format!("C{:02}", car_no),
                color: String::from("#ffffff"),
                t_lap: 25.0 + car_no as f64,
                consistency: 0.95,
            })
            .collect(),
        // cars start within 0.02 before the line, the first sample must not lie behind it
        feed_pars: FeedPars {
            progress_noise: 0.001,
            ..FeedPars::default()
        },
    };
    let centerline = unit_square();
    let mut feed =
        SyntheticFeed::new(&live_pars, TrackPath::build(&centerline), Some(42)).unwrap();
    let mut render_driver =
        RenderDriver::new(&live_pars.timing_pars, &Track::new(&live_pars.track_pars, &centerline));
    let targets: Vec<_> = (1..=4).map(|car_no| render_driver.target_for(car_no)).collect();

    let sectors = live_pars.track_pars.sectors;
    let mut prev: Vec<Option<f64>> = vec![None; targets.len()];
    let mut max_step: f64 = 0.0;
    let mut no_crossings: u64 = 0;

    // 60 s at 60 Hz, every car passes the start/finish line at least twice
    for frame in 0..3600 {
        let now = frame as f64 * 1000.0 / 60.0;
        if let Some(batch) = feed.poll(now) {
            render_driver.ingest(&batch, now);
        }
        render_driver.tick(now);

        for (i, target) in targets.iter().enumerate() {
            let transform = *target.borrow();
            if !transform.written {
                continue;
            }
            if let Some(prev_progress) = prev[i] {
                let step = shortest_circular_delta(prev_progress, transform.progress);
                max_step = max_step.max(step.abs());

                let sector_prev = sectors.sector_index(sectors.lap_dist(prev_progress));
                let sector = sectors.sector_index(sectors.lap_dist(transform.progress));
                if sector_prev == 2 && sector == 0 {
                    no_crossings += 1;
                }
            }
            prev[i] = Some(transform.progress);
        }
    }

    assert!(targets.iter().all(|target| target.borrow().written));
    assert!(max_step < 0.01, "largest step per frame was {}", max_step);
    assert!(no_crossings >= 8, "only {} line crossings", no_crossings);
    // lap number changes are paired with the drawn crossings
    assert_eq!(render_driver.get_no_lap_resets(), no_crossings);
}
