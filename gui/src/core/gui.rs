use crate::interfaces::feed_interface::FeedInterface;
use eframe::{egui, epi};
use flume::Receiver;
use helpers::buffer::RingBuffer;
use helpers::geometry::Point2d;
use livetiming::core::render_driver::RenderDriver;
use livetiming::core::segments::SegmentBuffer;
use livetiming::core::track::{SectorBoundaries, Track, NO_SECTORS};
use livetiming::core::track_path::TrackPath;
use livetiming::interfaces::gui_interface::{CarInfo, RenderTarget};
use livetiming::interfaces::telemetry::{SegmentStatus, TelemetryBatch};
use livetiming::pre::read_live_pars::LivePars;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write;
use std::rc::Rc;
use std::time::Instant;

/// SegmentPath is a stamped mini-segment prepared for drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPath {
    pub car_no: u32,
    pub centerline: Vec<Point2d>,
    pub color: egui::Color32,
}

/// segment_color returns the drawing colour of a mini-segment code, None for unknown codes.
pub fn segment_color(code: u32) -> Option<egui::Color32> {
    match SegmentStatus::from(code) {
        SegmentStatus::Yellow => Some(egui::Color32::from_rgb(255, 210, 0)),
        SegmentStatus::Green => Some(egui::Color32::from_rgb(0, 200, 60)),
        SegmentStatus::Purple => Some(egui::Color32::from_rgb(170, 40, 255)),
        SegmentStatus::Pitlane => Some(egui::Color32::from_gray(140)),
        SegmentStatus::Unknown(_) => None,
    }
}

/// build_segment_paths converts the stamped slots of all segment buffers into centerline pieces.
pub fn build_segment_paths(
    buffers: &HashMap<u32, SegmentBuffer>,
    sectors: &SectorBoundaries,
    track_path: &TrackPath,
) -> Vec<SegmentPath> {
    let mut segment_paths = vec![];

    for (&car_no, buffer) in buffers.iter() {
        for sector in 0..NO_SECTORS {
            let slots = &buffer.sectors[sector];

            for (idx, slot) in slots.iter().enumerate() {
                let color = match slot.and_then(segment_color) {
                    Some(color) => color,
                    None => continue,
                };
                let (p_start, p_end) = sectors.segment_bounds(sector, idx, slots.len());

                segment_paths.push(SegmentPath {
                    car_no,
                    centerline: track_path.sub_path(p_start, p_end),
                    color,
                });
            }
        }
    }

    segment_paths
}

#[derive(Debug)]
pub struct CarGui {
    pub info: CarInfo,
    pub target: RenderTarget,
}

pub struct LivePlot {
    pub feed_interface: FeedInterface,
    pub render_driver: RenderDriver,
    pub track: Track,
    pub cars: Vec<CarGui>,
    pub focus_car: Option<u32>,
    pub centerline_cl: Vec<egui::Pos2>,
    pub segment_paths: Rc<RefCell<Vec<SegmentPath>>>,
    pub t_start: Instant,
    pub prev_update: Instant,
    pub prev_update_durations: RingBuffer<u32>,
}

impl LivePlot {
    pub fn new(
        rx: Receiver<TelemetryBatch>,
        live_pars: &LivePars,
        track: Track,
        focus_car: Option<u32>,
    ) -> LivePlot {
        let mut render_driver = RenderDriver::new(&live_pars.timing_pars, &track);
        render_driver.set_segment_scope(focus_car);

        // register one render target per configured car
        let cars = live_pars
            .car_pars_all
            .iter()
            .map(|car_pars| CarGui {
                info: car_pars.get_car_info(),
                target: render_driver.target_for(car_pars.car_no),
            })
            .collect();

        // segment buffers are converted into drawable pieces only when they changed
        let segment_paths = Rc::new(RefCell::new(vec![]));

        if let Some(track_path) = track.path.clone() {
            let segment_paths_cb = Rc::clone(&segment_paths);
            let sectors = track.sectors;

            render_driver.set_segment_callback(Some(Box::new(
                move |buffers: &HashMap<u32, SegmentBuffer>| {
                    *segment_paths_cb.borrow_mut() =
                        build_segment_paths(buffers, &sectors, &track_path);
                },
            )));
        }

        // get centerline from track (saved separately such that this must not be repeated in each
        // call)
        let centerline_cl = match &track.path {
            Some(track_path) => track_path
                .points()
                .iter()
                .map(|point| egui::Pos2 {
                    x: point.x as f32,
                    y: point.y as f32,
                })
                .collect(),
            None => vec![],
        };

        LivePlot {
            feed_interface: FeedInterface::new(rx),
            render_driver,
            track,
            cars,
            focus_car,
            centerline_cl,
            segment_paths,
            t_start: Instant::now(),
            prev_update: Instant::now(),
            prev_update_durations: RingBuffer::new(10),
        }
    }

    pub fn set_ui_content(&mut self, ui: &mut egui::Ui) -> egui::Response {
        // PREPARATIONS ----------------------------------------------------------------------------
        // get UI handles
        let (response, painter) =
            ui.allocate_painter(ui.available_size_before_wrap_finite(), egui::Sense::drag());

        // get transformation from x/y to pixels in the window (y axis must be inverted)
        let [x_min, x_max, y_min, y_max] = self.track.get_axes_expansion(50.0);

        // preserve the aspect ratio of the track
        let track_width = (x_max - x_min).abs() as f32;
        let track_height = (y_max - y_min).abs() as f32;
        let track_aspect = if track_height != 0.0 {
            track_width / track_height
        } else {
            1.0
        };

        let screen_width = response.rect.width();
        let screen_height = response.rect.height();
        let screen_aspect = screen_width / screen_height;

        let dest_rect = if screen_aspect > track_aspect {
            // screen is wider -> fit height
            let new_width = screen_height * track_aspect;
            let offset_x = (screen_width - new_width) / 2.0;
            egui::Rect::from_min_size(
                egui::Pos2::new(response.rect.min.x + offset_x, response.rect.min.y),
                egui::Vec2::new(new_width, screen_height),
            )
        } else {
            // screen is taller -> fit width
            let new_height = screen_width / track_aspect;
            let offset_y = (screen_height - new_height) / 2.0;
            egui::Rect::from_min_size(
                egui::Pos2::new(response.rect.min.x, response.rect.min.y + offset_y),
                egui::Vec2::new(screen_width, new_height),
            )
        };

        let to_screen = egui::emath::RectTransform::from_to(
            egui::emath::Rect::from_min_max(
                egui::Pos2 {
                    x: x_min as f32,
                    y: y_max as f32,
                },
                egui::Pos2 {
                    x: x_max as f32,
                    y: y_min as f32,
                },
            ),
            dest_rect,
        );
        let to_pos2 = |point: &Point2d| egui::Pos2 {
            x: point.x as f32,
            y: point.y as f32,
        };

        // create vector for drawn shapes
        let mut shapes = vec![];

        // TRACK DRAWING ---------------------------------------------------------------------------
        // add track centerline
        let centerline_cl_tmp: Vec<egui::Pos2> =
            self.centerline_cl.iter().map(|p| to_screen * *p).collect();

        shapes.push(egui::Shape::line(
            centerline_cl_tmp,
            egui::Stroke::new(3.0, egui::Color32::WHITE),
        ));

        // add stamped mini-segments
        for segment_path in self.segment_paths.borrow().iter() {
            shapes.push(egui::Shape::line(
                segment_path
                    .centerline
                    .iter()
                    .map(|point| to_screen * to_pos2(point))
                    .collect(),
                egui::Stroke::new(7.0, segment_path.color),
            ));
        }

        // add sector boundaries
        if let Some(track_path) = &self.track.path {
            let sectors = self.track.sectors;
            let tmp_progs = [sectors.start_finish, sectors.sector1_2, sectors.sector2_3];
            let tmp_texts = ["SF", "S12", "S23"];
            let text_offset = 60.0;
            let bound_length = 40.0;

            for (tmp_prog, tmp_text) in tmp_progs.iter().zip(tmp_texts.iter()) {
                let (tmp_coords, tmp_tangent) =
                    match track_path.point_and_tangent_at_progress(*tmp_prog) {
                        Some(pose) => pose,
                        None => continue,
                    };
                let tmp_normvec = tmp_tangent.normal();

                let tmp_p1 = tmp_coords
                    .as_vector2d()
                    .add(&tmp_normvec.mult(0.5 * bound_length))
                    .as_point2d();
                let tmp_p2 = tmp_coords
                    .as_vector2d()
                    .sub(&tmp_normvec.mult(0.5 * bound_length))
                    .as_point2d();
                let tmp_text_coords = tmp_coords
                    .as_vector2d()
                    .add(&tmp_normvec.mult(text_offset))
                    .as_point2d();

                shapes.push(egui::Shape::line_segment(
                    [to_screen * to_pos2(&tmp_p1), to_screen * to_pos2(&tmp_p2)],
                    egui::Stroke::new(3.0, egui::Color32::WHITE),
                ));
                shapes.push(egui::Shape::text(
                    ui.fonts(),
                    to_screen * to_pos2(&tmp_text_coords),
                    egui::Align2::CENTER_CENTER,
                    tmp_text,
                    egui::TextStyle::Body,
                    egui::Color32::WHITE,
                ));
            }
        }

        // CARS DRAWING ----------------------------------------------------------------------------
        let text_offset = 100.0;

        for car in self.cars.iter() {
            let transform = *car.target.borrow();

            // not rendered yet
            if !transform.written {
                continue;
            }

            let tmp_text_coords = transform
                .pos
                .as_vector2d()
                .add(&transform.heading.normal().mult(text_offset))
                .as_point2d();
            let rgb = car.info.color;
            let color = egui::Color32::from_rgb(rgb.r, rgb.g, rgb.b);
            let radius = if self.focus_car == Some(car.info.car_no) {
                10.0
            } else {
                7.0
            };

            shapes.push(egui::Shape::circle_filled(
                to_screen * to_pos2(&transform.pos),
                radius,
                color,
            ));
            shapes.push(egui::Shape::text(
                ui.fonts(),
                to_screen * to_pos2(&tmp_text_coords),
                egui::Align2::CENTER_CENTER,
                &format!("{} ({})", car.info.car_no, car.info.initials),
                egui::TextStyle::Body,
                color,
            ));
        }

        // UPDATE GENERAL INFORMATION TEXT IN GUI --------------------------------------------------
        let mut gen_info_text = format!("Track: {}\n", self.track.name);
        let stats = self.render_driver.get_stats();

        // write! into a String cannot fail
        let _ = writeln!(
            &mut gen_info_text,
            "Cars: {}\nBatches: {} ({})\nDiscarded samples: {} backward, {} duplicate",
            self.render_driver.get_car_nos().len(),
            self.feed_interface.no_received,
            if self.feed_interface.connected {
                "live"
            } else {
                "feed ended"
            },
            stats.no_backward,
            stats.no_duplicate,
        );

        // calculate current UI update duration, append it to the buffer, and set update time
        self.prev_update_durations
            .push(self.prev_update.elapsed().as_millis() as u32);
        self.prev_update = Instant::now();

        if let Some(avg_duration) = self.prev_update_durations.get_avg() {
            if avg_duration > 0.0 {
                let _ = write!(
                    &mut gen_info_text,
                    "GUI update frequency: {:.0} Hz",
                    1000.0 / avg_duration
                );
            }
        }

        // show general informations text in the GUI
        shapes.push(egui::Shape::text(
            ui.fonts(),
            to_screen
                * egui::Pos2 {
                    x: x_min as f32,
                    y: y_max as f32,
                },
            egui::Align2::LEFT_TOP,
            &gen_info_text,
            egui::TextStyle::Body,
            egui::Color32::WHITE,
        ));

        // DRAWING ---------------------------------------------------------------------------------
        // update shapes in UI painter and return response
        painter.extend(shapes);
        response
    }
}

impl epi::App for LivePlot {
    /// Called each time the UI needs repainting, which may be many times per second.
    fn update(&mut self, ctx: &egui::CtxRef, _frame: &mut epi::Frame) {
        // one frame clock for ingestion and rendering
        let now = self.t_start.elapsed().as_secs_f64() * 1000.0;

        self.feed_interface.update(&mut self.render_driver, now);
        self.render_driver.tick(now);

        // update UI content (live track)
        egui::CentralPanel::default().show(ctx, |ui| {
            let mut frame = egui::Frame::dark_canvas(ui.style());
            frame.fill = egui::Color32::from_rgb(20, 80, 20);
            frame.show(ui, |ui| {
                self.set_ui_content(ui);
            });
        });

        // request repaint of the UI
        ctx.request_repaint();
    }

    fn on_exit(&mut self) {
        self.render_driver.stop();
    }

    fn name(&self) -> &str {
        "Live Map"
    }
}
