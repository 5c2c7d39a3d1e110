use crate::core::car::CarPars;
use crate::core::handle_feed::FeedPars;
use crate::core::render_driver::TimingPars;
use crate::core::track::TrackPars;
use anyhow::Context;
use helpers::general::InputValueError;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// LivePars is used to store all other parameter structs.
#[derive(Debug, Deserialize, Clone)]
pub struct LivePars {
    #[serde(default)]
    pub timing_pars: TimingPars,
    pub track_pars: TrackPars,
    pub car_pars_all: Vec<CarPars>,
    #[serde(default)]
    pub feed_pars: FeedPars,
}

impl LivePars {
    /// get_trackfile_path returns the path of the centerline file, input/tracks/<name>.csv.
    pub fn get_trackfile_path(&self) -> PathBuf {
        let mut trackfile_path = PathBuf::new();
        trackfile_path.push("input");
        trackfile_path.push("tracks");
        trackfile_path.push(&self.track_pars.name);
        trackfile_path.set_extension("csv");
        trackfile_path
    }
}

/// read_live_pars reads the JSON file, decodes it into the parameter structs and checks the
/// values.
pub fn read_live_pars(filepath: &Path) -> anyhow::Result<LivePars> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open parameter file {}!",
            filepath.display()
        ))?;
    let pars: LivePars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse parameter file {}!",
        filepath.display()
    ))?;

    check_pars(&pars).context(format!(
        "Parameter file {} contains invalid values!",
        filepath.display()
    ))?;
    Ok(pars)
}

/// check_pars returns an InputValueError for the first parameter out of its valid range.
pub fn check_pars(pars: &LivePars) -> Result<(), InputValueError> {
    let timing_pars = &pars.timing_pars;

    if !(timing_pars.render_delay_ms >= 0.0) {
        return Err(InputValueError::new("render_delay_ms must be >= 0.0"));
    }
    if !(timing_pars.smoothing_tau_ms > 0.0) {
        return Err(InputValueError::new("smoothing_tau_ms must be > 0.0"));
    }
    if !(timing_pars.smoothing_reset_gap_ms > 0.0) {
        return Err(InputValueError::new("smoothing_reset_gap_ms must be > 0.0"));
    }
    if timing_pars.buffer_capacity < 2 {
        return Err(InputValueError::new("buffer_capacity must be >= 2"));
    }
    if !(0.0..0.5).contains(&timing_pars.max_backward_jump)
        || !(0.0..0.5).contains(&timing_pars.min_progress_delta)
    {
        return Err(InputValueError::new(
            "max_backward_jump and min_progress_delta must be in [0.0, 0.5[",
        ));
    }
    if !(timing_pars.tangent_epsilon > 0.0 && timing_pars.tangent_epsilon < 0.5) {
        return Err(InputValueError::new("tangent_epsilon must be in ]0.0, 0.5["));
    }

    if !pars.track_pars.sectors.check() {
        return Err(InputValueError::new(
            "sector boundaries must be in [0.0, 1.0[ and ordered \
            start_finish -> sector1_2 -> sector2_3",
        ));
    }
    if pars.track_pars.mini_segments.iter().any(|&count| count == 0) {
        return Err(InputValueError::new("every sector needs at least one mini-segment"));
    }

    for car_pars in pars.car_pars_all.iter() {
        if !(car_pars.t_lap > 0.0) {
            return Err(InputValueError::new(&format!(
                "t_lap of car {} must be > 0.0",
                car_pars.car_no
            )));
        }
        if !(0.0..=1.0).contains(&car_pars.consistency) {
            return Err(InputValueError::new(&format!(
                "consistency of car {} must be in [0.0, 1.0]",
                car_pars.car_no
            )));
        }
    }

    if !(pars.feed_pars.update_interval_ms > 0.0) {
        return Err(InputValueError::new("update_interval_ms must be > 0.0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARS_JSON: &str = r##"{
        "track_pars": {
            "name": "Oval",
            "sectors": {"start_finish": 0.0, "sector1_2": 0.3, "sector2_3": 0.65},
            "mini_segments": [6, 8, 7]
        },
        "car_pars_all": [
            {"car_no": 1, "initials": "VER", "color": "#1e41ff", "t_lap": 80.0},
            {"car_no": 44, "initials": "HAM", "color": "#00d2be", "t_lap": 80.4,
                "consistency": 0.95}
        ],
        "timing_pars": {"render_delay_ms": 500.0}
    }"##;

    #[test]
    fn decodes_with_defaults() {
        let pars: LivePars = serde_json::from_str(PARS_JSON).unwrap();
        assert_eq!(pars.timing_pars.render_delay_ms, 500.0);
        assert_eq!(pars.timing_pars.buffer_capacity, 10);
        assert_eq!(pars.feed_pars.update_interval_ms, 1000.0);
        assert_eq!(pars.car_pars_all[0].consistency, 1.0);
        assert_eq!(
            pars.get_trackfile_path(),
            PathBuf::from("input").join("tracks").join("Oval.csv")
        );
        assert!(check_pars(&pars).is_ok());
    }

    #[test]
    fn rejects_unordered_sectors() {
        let mut pars: LivePars = serde_json::from_str(PARS_JSON).unwrap();
        pars.track_pars.sectors.sector2_3 = 0.2;
        assert!(check_pars(&pars).is_err());
    }

    #[test]
    fn rejects_tiny_buffer() {
        let mut pars: LivePars = serde_json::from_str(PARS_JSON).unwrap();
        pars.timing_pars.buffer_capacity = 1;
        let err = check_pars(&pars).unwrap_err();
        assert!(err.to_string().contains("buffer_capacity"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_live_pars(Path::new("does/not/exist.json")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.json"));
    }
}
