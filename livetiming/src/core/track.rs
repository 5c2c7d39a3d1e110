use crate::core::track_path::TrackPath;
use anyhow::{Context, Result};
use helpers::general::{forward_distance, wrap_progress};
use helpers::geometry::Point2d;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::Path;
use std::rc::Rc;

pub const NO_SECTORS: usize = 3;

/// Lap fractions of the three timing lines. Sector 1 runs from `start_finish` to `sector1_2`,
/// sector 2 to `sector2_3` and sector 3 back to `start_finish`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct SectorBoundaries {
    pub start_finish: f64,
    pub sector1_2: f64,
    pub sector2_3: f64,
}

impl Default for SectorBoundaries {
    fn default() -> Self {
        SectorBoundaries {
            start_finish: 0.0,
            sector1_2: 1.0 / 3.0,
            sector2_3: 2.0 / 3.0,
        }
    }
}

impl SectorBoundaries {
    /// lap_dist returns the lap fraction driven since the start/finish line.
    pub fn lap_dist(&self, progress: f64) -> f64 {
        forward_distance(self.start_finish, progress)
    }

    /// sector_index returns 0, 1 or 2 for a distance given in lap_dist units.
    pub fn sector_index(&self, lap_dist: f64) -> usize {
        if lap_dist < self.lap_dist(self.sector1_2) {
            0
        } else if lap_dist < self.lap_dist(self.sector2_3) {
            1
        } else {
            2
        }
    }

    /// sector_bounds returns start and end lap fraction of a sector.
    pub fn sector_bounds(&self, sector: usize) -> (f64, f64) {
        match sector {
            0 => (self.start_finish, self.sector1_2),
            1 => (self.sector1_2, self.sector2_3),
            _ => (self.sector2_3, self.start_finish),
        }
    }

    /// sector_length returns the lap fraction covered by a sector. A degenerate (zero-length)
    /// sector is treated as a full lap.
    pub fn sector_length(&self, sector: usize) -> f64 {
        let (start, end) = self.sector_bounds(sector);
        let length = forward_distance(start, end);

        if length <= 0.0 {
            1.0
        } else {
            length
        }
    }

    /// segment_bounds returns start and end lap fraction of mini-segment `idx` out of
    /// `no_segments` equally long ones within a sector.
    pub fn segment_bounds(&self, sector: usize, idx: usize, no_segments: usize) -> (f64, f64) {
        let (start, _) = self.sector_bounds(sector);
        let seg_length = self.sector_length(sector) / no_segments.max(1) as f64;

        (
            wrap_progress(start + seg_length * idx as f64),
            wrap_progress(start + seg_length * (idx + 1) as f64),
        )
    }

    /// segment_end_dists returns the end of every mini-segment of a sector in lap_dist units.
    /// Segment ends coinciding with the start/finish line are mapped onto 1.0 (a full lap).
    pub fn segment_end_dists(&self, sector: usize, no_segments: usize) -> Vec<f64> {
        (0..no_segments)
            .map(|idx| {
                let (_, end) = self.segment_bounds(sector, idx, no_segments);
                let end_dist = self.lap_dist(end);

                if (sector == NO_SECTORS - 1 && idx == no_segments - 1) || end_dist <= 1e-9 {
                    1.0
                } else {
                    end_dist
                }
            })
            .collect()
    }

    pub fn check(&self) -> bool {
        [self.start_finish, self.sector1_2, self.sector2_3]
            .iter()
            .all(|&p| (0.0..1.0).contains(&p))
            && 0.0 < self.lap_dist(self.sector1_2)
            && self.lap_dist(self.sector1_2) < self.lap_dist(self.sector2_3)
    }
}

/// * `name` - Track name, the centerline is read from input/tracks/<name>.csv
/// * `sectors` - Lap fractions of start/finish line and sector boundaries
/// * `mini_segments` - Track-wide (canonical) number of mini-segments per sector
#[derive(Debug, Deserialize, Clone)]
pub struct TrackPars {
    pub name: String,
    #[serde(default)]
    pub sectors: SectorBoundaries,
    pub mini_segments: [usize; NO_SECTORS],
}

#[derive(Debug, Deserialize, Clone)]
pub struct CsvTrackEl {
    pub x_m: f64,
    pub y_m: f64,
}

/// read_centerline reads the track centerline from a CSV file (columns `x_m`, `y_m`, further
/// columns are ignored) and closes the loop if the last point differs from the first one.
pub fn read_centerline(trackfile_path: &Path) -> Result<Vec<Point2d>> {
    let fh = OpenOptions::new()
        .read(true)
        .open(trackfile_path)
        .context(format!(
            "Failed to open track file {}!",
            trackfile_path.display()
        ))?;

    let mut csv_reader = csv::Reader::from_reader(&fh);
    let mut centerline: Vec<Point2d> = vec![];

    for result in csv_reader.deserialize() {
        let csv_track_el: CsvTrackEl = result.context(format!(
            "Failed to parse track file {}!",
            trackfile_path.display()
        ))?;
        centerline.push(Point2d::new(csv_track_el.x_m, csv_track_el.y_m));
    }

    if let (Some(&first), Some(&last)) = (centerline.first(), centerline.last()) {
        if first != last {
            centerline.push(first);
        }
    }

    Ok(centerline)
}

/// Track bundles everything the live map needs to know about the circuit. The path is shared
/// read-only by all cars and is None if the centerline is unusable.
#[derive(Debug, Clone)]
pub struct Track {
    pub name: String,
    pub sectors: SectorBoundaries,
    pub mini_segments: [usize; NO_SECTORS],
    pub path: Option<Rc<TrackPath>>,
}

impl Track {
    pub fn new(track_pars: &TrackPars, centerline: &[Point2d]) -> Track {
        let path = TrackPath::build(centerline).map(Rc::new);

        if path.is_none() {
            log::warn!(
                "Centerline of track {} is unusable ({} points), positions will not be rendered",
                track_pars.name,
                centerline.len()
            );
        }

        Track {
            name: track_pars.name.to_owned(),
            sectors: track_pars.sectors,
            mini_segments: track_pars.mini_segments,
            path,
        }
    }

    pub fn from_csv(track_pars: &TrackPars, trackfile_path: &Path) -> Result<Track> {
        let centerline = read_centerline(trackfile_path)?;
        Ok(Track::new(track_pars, &centerline))
    }

    /// get_axes_expansion returns [x_min, x_max, y_min, y_max] of the centerline plus a margin.
    pub fn get_axes_expansion(&self, margin: f64) -> [f64; 4] {
        let mut axes = [
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
        ];

        if let Some(path) = &self.path {
            for point in path.points() {
                axes[0] = axes[0].min(point.x);
                axes[1] = axes[1].max(point.x);
                axes[2] = axes[2].min(point.y);
                axes[3] = axes[3].max(point.y);
            }
        } else {
            return [-margin, margin, -margin, margin];
        }

        [
            axes[0] - margin,
            axes[1] + margin,
            axes[2] - margin,
            axes[3] + margin,
        ]
    }
}
