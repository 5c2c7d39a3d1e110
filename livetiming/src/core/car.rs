use crate::interfaces::gui_interface::{CarInfo, RgbColor};
use serde::Deserialize;

/// * `car_no` - Car number
/// * `initials` - Driver initials shown next to the car, e.g. VER
/// * `color` - Team colour as CSS hex string, e.g. #1e41ff
/// * `t_lap` - (s) Mean lap time used by the synthetic feed
/// * `consistency` - Lap time consistency in [0.0, 1.0], 1.0 means identical lap times
#[derive(Debug, Deserialize, Clone)]
pub struct CarPars {
    pub car_no: u32,
    pub initials: String,
    pub color: String,
    pub t_lap: f64,
    #[serde(default = "default_consistency")]
    pub consistency: f64,
}

fn default_consistency() -> f64 {
    1.0
}

impl CarPars {
    /// get_rgb_color parses the team colour, unparsable colours fall back to grey.
    pub fn get_rgb_color(&self) -> RgbColor {
        match self.color.parse::<css_color_parser::Color>() {
            Ok(color) => RgbColor {
                r: color.r,
                g: color.g,
                b: color.b,
            },
            Err(_) => {
                log::warn!(
                    "Could not parse colour {} of car {}, using grey",
                    self.color,
                    self.car_no
                );
                RgbColor {
                    r: 128,
                    g: 128,
                    b: 128,
                }
            }
        }
    }

    pub fn get_car_info(&self) -> CarInfo {
        CarInfo {
            car_no: self.car_no,
            initials: self.initials.to_owned(),
            color: self.get_rgb_color(),
        }
    }
}
