use clap::Parser;
use flume;
use gui::core::gui::LivePlot;
use helpers::general::shortest_circular_delta;
use livetiming::core::handle_feed::{handle_feed, SyntheticFeed};
use livetiming::core::render_driver::{RenderDriver, SegmentCallback};
use livetiming::core::track::{read_centerline, Track};
use livetiming::core::track_path::TrackPath;
use livetiming::pre::live_opts::LiveOpts;
use livetiming::pre::read_live_pars::{read_live_pars, LivePars};
use plotters::prelude::*;
use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::Instant;

/// ReplayTrace contains the raw and the rendered lap fraction of one car over the replay.
#[derive(Debug, Default)]
struct ReplayTrace {
    car_no: u32,
    raw: Vec<(f64, f64)>,
    rendered: Vec<(f64, f64)>,
    max_step: f64,
    no_backward_steps: u64,
}

fn export_trace_plot(trace: &ReplayTrace, t_end_s: f64) -> anyhow::Result<String> {
    let out_dir = std::path::Path::new("output");
    std::fs::create_dir_all(out_dir)?;
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs();
    let filename = format!("live_trace_{}.png", ts);
    let out_path = out_dir.join(filename);

    let root = BitMapBackend::new(&out_path, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Raw vs rendered lap fraction of car {}", trace.car_no),
            ("sans-serif", 24).into_font(),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..t_end_s.max(1.0), 0.0..1.0)?;

    chart
        .configure_mesh()
        .x_desc("Time in s")
        .y_desc("Lap fraction")
        .label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 16))
        .draw()?;

    // break the rendered line at the start/finish line instead of drawing a vertical jump
    let mut pieces: Vec<Vec<(f64, f64)>> = vec![vec![]];
    for &(t, progress) in trace.rendered.iter() {
        if let Some(&(_, prev)) = pieces.last().and_then(|piece| piece.last()) {
            if (progress - prev).abs() > 0.5 {
                pieces.push(vec![]);
            }
        }
        if let Some(piece) = pieces.last_mut() {
            piece.push((t / 1000.0, progress));
        }
    }

    for (i, piece) in pieces.into_iter().enumerate() {
        let series = chart.draw_series(LineSeries::new(piece, BLUE.stroke_width(2)))?;
        if i == 0 {
            series
                .label("rendered")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
        }
    }

    chart
        .draw_series(
            trace
                .raw
                .iter()
                .map(|&(t, progress)| Circle::new((t / 1000.0, progress), 3, RED.filled())),
        )?
        .label("raw samples")
        .legend(|(x, y)| Circle::new((x + 10, y), 3, RED.filled()));

    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .label_font(("sans-serif", 16))
        .position(plotters::chart::SeriesLabelPosition::UpperRight)
        .draw()?;

    root.present()?;
    Ok(out_path.to_string_lossy().into_owned())
}

/// replay drives the full pipeline with a simulated frame clock and returns the trace of the
/// traced car.
fn replay(
    live_pars: &LivePars,
    track: &Track,
    feed_path: Option<TrackPath>,
    live_opts: &LiveOpts,
) -> anyhow::Result<ReplayTrace> {
    let mut feed = SyntheticFeed::new(live_pars, feed_path, None)?;
    let mut render_driver = RenderDriver::new(&live_pars.timing_pars, track);
    render_driver.set_segment_scope(live_opts.focus_car);

    let no_segment_updates = Rc::new(Cell::new(0u64));
    let no_segment_updates_cb = Rc::clone(&no_segment_updates);
    let segment_callback: SegmentCallback = Box::new(move |_| {
        no_segment_updates_cb.set(no_segment_updates_cb.get() + 1)
    });
    render_driver.set_segment_callback(Some(segment_callback));

    let car_no = match live_opts
        .focus_car
        .or_else(|| live_pars.car_pars_all.first().map(|car_pars| car_pars.car_no))
    {
        Some(car_no) => car_no,
        None => anyhow::bail!("Parameter file does not contain any cars!"),
    };
    let target = render_driver.target_for(car_no);
    for car_pars in live_pars.car_pars_all.iter() {
        render_driver.target_for(car_pars.car_no);
    }

    let mut trace = ReplayTrace {
        car_no,
        ..ReplayTrace::default()
    };

    let frame_dt = 1000.0 / live_opts.frame_rate;
    let t_end = live_opts.duration * 1000.0;
    let mut no_frames: u64 = 0;
    let mut t_last_print = 0.0;
    let mut prev_rendered: Option<f64> = None;

    loop {
        let now = no_frames as f64 * frame_dt;
        if now > t_end {
            break;
        }
        no_frames += 1;

        if let Some(batch) = feed.poll(now) {
            if let Some(progress) = batch
                .updates
                .iter()
                .find(|update| update.car_no == car_no)
                .and_then(|update| update.progress)
            {
                trace.raw.push((now, progress));
            }
            render_driver.ingest(&batch, now);
        }

        render_driver.tick(now);

        let transform = *target.borrow();
        if transform.written {
            if let Some(prev) = prev_rendered {
                let step = shortest_circular_delta(prev, transform.progress);
                trace.max_step = trace.max_step.max(step.abs());
                if step < 0.0 {
                    trace.no_backward_steps += 1;
                }
            }
            prev_rendered = Some(transform.progress);
            trace.rendered.push((now, transform.progress));
        }

        if now > t_last_print + 9999.0 {
            log::debug!(
                "Replay at {:.1}s, car {} rendered at {:.4} (true {:.4})",
                now / 1000.0,
                car_no,
                transform.progress,
                feed.get_true_progress(car_no).unwrap_or(f64::NAN)
            );
            t_last_print = now;
        }
    }

    let stats = render_driver.get_stats();
    log::info!(
        "Replayed {} frames: {} batches, {} samples accepted, {} backward, {} duplicate, {} stale, \
        {} without progress, {} cars removed",
        no_frames,
        stats.no_batches,
        stats.no_accepted,
        stats.no_backward,
        stats.no_duplicate,
        stats.no_stale,
        stats.no_without_progress,
        stats.no_removed_cars
    );
    log::info!(
        "Segment buffers: {} lap resets, {} callback notifications",
        render_driver.get_no_lap_resets(),
        no_segment_updates.get()
    );
    log::info!(
        "Car {}: largest rendered step per frame {:.5}, {} backward steps",
        car_no,
        trace.max_step,
        trace.no_backward_steps
    );

    Ok(trace)
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get options from the command line arguments
    let live_opts: LiveOpts = LiveOpts::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if live_opts.debug {
            "debug"
        } else {
            "info"
        },
    ))
    .init();

    if !(live_opts.frame_rate > 0.0 && live_opts.realtime_factor > 0.0 && live_opts.duration > 0.0)
    {
        anyhow::bail!("Frame rate, real-time factor and duration must be positive!");
    }

    // get parameters
    let live_pars = if let Some(parfile_path) = &live_opts.parfile_path {
        log::info!("Reading parameters from {:?}", parfile_path);
        read_live_pars(parfile_path)?
    } else {
        anyhow::bail!("No parameter file provided! Use -p <path_to_json> to start the live map.");
    };

    // load track (always from input/tracks)
    let trackfile_path = live_pars.get_trackfile_path();
    log::info!("Loading track from {:?}", trackfile_path);
    let centerline = read_centerline(&trackfile_path)?;
    let track = Track::new(&live_pars.track_pars, &centerline);

    log::info!(
        "Live map of {} with {} cars",
        live_pars.track_pars.name,
        live_pars.car_pars_all.len()
    );

    // EXECUTION -----------------------------------------------------------------------------------
    if !live_opts.gui {
        // NON-GUI CASE
        log::info!("Running headless replay of {:.1}s...", live_opts.duration);
        let t_start = Instant::now();

        let trace = replay(
            &live_pars,
            &track,
            TrackPath::build(&centerline),
            &live_opts,
        )?;

        log::info!("Execution time: {}ms", t_start.elapsed().as_millis());

        match export_trace_plot(&trace, live_opts.duration) {
            Ok(path) => log::info!("Trace plot saved to {}", path),
            Err(err) => log::warn!("Could not save trace plot: {}", err),
        }
    } else {
        // GUI CASE
        log::info!("Starting live map...");

        // create channel between the feed thread and the GUI
        let (tx, rx) = flume::unbounded();

        // run the synthetic feed in a separate thread
        let live_pars_thread = live_pars.clone();
        let feed_path = TrackPath::build(&centerline);
        let realtime_factor = live_opts.realtime_factor;
        let duration = live_opts.duration;

        let _ = thread::spawn(move || {
            let res = handle_feed(
                &live_pars_thread,
                feed_path,
                &tx,
                realtime_factor,
                Some(duration),
            );
            match res {
                Ok(no_sent) => log::info!("Synthetic feed sent {} batches", no_sent),
                Err(err) => log::error!("Synthetic feed failed: {:#}", err),
            }
        });

        // run GUI (must be in the main thread)
        let gui = LivePlot::new(rx, &live_pars, track, live_opts.focus_car);
        let native_options = eframe::NativeOptions {
            initial_window_size: Some(eframe::egui::Vec2::new(1280.0, 720.0)),
            ..eframe::NativeOptions::default()
        };
        eframe::run_native(Box::new(gui), native_options);
    }

    Ok(())
}
