use crate::core::track::NO_SECTORS;
use serde::Deserialize;

/// Raw mini-segment codes of the current lap as delivered by the timing feed. 0 means that no data
/// is available yet, other values encode a colour category (see SegmentStatus). The array lengths
/// may differ between cars and over time.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct LapSegments {
    pub sector1: Vec<u32>,
    pub sector2: Vec<u32>,
    pub sector3: Vec<u32>,
}

impl LapSegments {
    pub fn new(counts: [usize; NO_SECTORS]) -> LapSegments {
        LapSegments {
            sector1: vec![0; counts[0]],
            sector2: vec![0; counts[1]],
            sector3: vec![0; counts[2]],
        }
    }

    pub fn sector(&self, sector: usize) -> &[u32] {
        match sector {
            0 => &self.sector1,
            1 => &self.sector2,
            _ => &self.sector3,
        }
    }

    pub fn sector_mut(&mut self, sector: usize) -> &mut Vec<u32> {
        match sector {
            0 => &mut self.sector1,
            1 => &mut self.sector2,
            _ => &mut self.sector3,
        }
    }
}

/// One entry of the position stream.
///
/// * `car_no` - Car number identifying the entity
/// * `progress` - Lap fraction in [0.0, 1.0[, only present if the source is path-locked
/// * `x`, `y` - (m) Raw position as reported by the source
/// * `lap` - Current lap number of the car
/// * `segments` - Mini-segment codes of the current lap
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PositionUpdate {
    pub car_no: u32,
    pub progress: Option<f64>,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub lap: Option<u32>,
    #[serde(default)]
    pub segments: Option<LapSegments>,
}

/// TelemetryBatch contains all cars mentioned by one update of the feed. Cars missing from a batch
/// are considered gone.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelemetryBatch {
    pub updates: Vec<PositionUpdate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    Yellow,
    Green,
    Purple,
    Pitlane,
    Unknown(u32),
}

impl SegmentStatus {
    pub const YELLOW: u32 = 2048;
    pub const GREEN: u32 = 2049;
    pub const PURPLE: u32 = 2051;
    pub const PITLANE: u32 = 2064;
}

impl From<u32> for SegmentStatus {
    fn from(code: u32) -> Self {
        match code {
            SegmentStatus::YELLOW => SegmentStatus::Yellow,
            SegmentStatus::GREEN => SegmentStatus::Green,
            SegmentStatus::PURPLE => SegmentStatus::Purple,
            SegmentStatus::PITLANE => SegmentStatus::Pitlane,
            _ => SegmentStatus::Unknown(code),
        }
    }
}
