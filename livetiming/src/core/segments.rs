use crate::core::track::{SectorBoundaries, NO_SECTORS};
use crate::interfaces::telemetry::LapSegments;
use std::collections::{HashMap, HashSet};

/// SegmentBuffer holds the stamped mini-segment codes of one car for the current lap. A None slot
/// has not been reached visually yet, a stamped slot never changes until the whole buffer is
/// replaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentBuffer {
    pub sectors: [Vec<Option<u32>>; NO_SECTORS],
}

impl SegmentBuffer {
    pub fn new(counts: [usize; NO_SECTORS]) -> SegmentBuffer {
        SegmentBuffer {
            sectors: [
                vec![None; counts[0]],
                vec![None; counts[1]],
                vec![None; counts[2]],
            ],
        }
    }

    pub fn counts(&self) -> [usize; NO_SECTORS] {
        [
            self.sectors[0].len(),
            self.sectors[1].len(),
            self.sectors[2].len(),
        ]
    }

    /// resize changes the number of slots per sector and keeps the stamped ones.
    fn resize(&mut self, counts: [usize; NO_SECTORS]) {
        for (slots, &count) in self.sectors.iter_mut().zip(counts.iter()) {
            slots.resize(count, None);
        }
    }

    pub fn get(&self, sector: usize, idx: usize) -> Option<u32> {
        self.sectors.get(sector)?.get(idx).copied().flatten()
    }

    pub fn no_stamped(&self) -> usize {
        self.sectors
            .iter()
            .map(|slots| slots.iter().filter(|slot| slot.is_some()).count())
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    NoBuffer,
    Accumulating { sector: usize, lap: Option<u32> },
}

/// SegmentTracker stamps mini-segments as the rendered (not raw) position of a car passes their
/// end and starts a fresh buffer exactly once per lap.
///
/// The raw lap number runs ahead of the rendered position, so a lap number change and the visual
/// line crossing of the same lap are paired. A change while the car is still drawn in sector 3
/// waits for the crossing and stamping pauses until then. A change shortly after a crossing
/// (still in sector 1) is absorbed by it. Only an unpaired change resets on its own.
#[derive(Debug, Clone)]
pub struct SegmentTracker {
    sectors: SectorBoundaries,
    canonical_counts: [usize; NO_SECTORS],
    states: HashMap<u32, SegmentState>,
    buffers: HashMap<u32, SegmentBuffer>,
    crossed_awaiting_lap: HashSet<u32>,
    lap_awaiting_crossing: HashSet<u32>,
    scope: Option<u32>,
    no_lap_resets: u64,
}

impl SegmentTracker {
    pub fn new(sectors: SectorBoundaries, canonical_counts: [usize; NO_SECTORS]) -> SegmentTracker {
        SegmentTracker {
            sectors,
            canonical_counts,
            states: HashMap::new(),
            buffers: HashMap::new(),
            crossed_awaiting_lap: HashSet::new(),
            lap_awaiting_crossing: HashSet::new(),
            scope: None,
            no_lap_resets: 0,
        }
    }

    pub fn buffers(&self) -> &HashMap<u32, SegmentBuffer> {
        &self.buffers
    }

    pub fn buffer(&self, car_no: u32) -> Option<&SegmentBuffer> {
        self.buffers.get(&car_no)
    }

    pub fn state(&self, car_no: u32) -> SegmentState {
        self.states
            .get(&car_no)
            .copied()
            .unwrap_or(SegmentState::NoBuffer)
    }

    /// get_no_lap_resets returns how many fresh buffers were allocated because of a lap crossing
    /// or a lap number change (the first allocation of a car is not counted).
    pub fn get_no_lap_resets(&self) -> u64 {
        self.no_lap_resets
    }

    pub fn sectors(&self) -> SectorBoundaries {
        self.sectors
    }

    pub fn canonical_counts(&self) -> [usize; NO_SECTORS] {
        self.canonical_counts
    }

    pub fn scope(&self) -> Option<u32> {
        self.scope
    }

    /// set_scope restricts tracking to a single car (None tracks all cars). Changing the scope
    /// drops every buffer. Returns true if the scope changed.
    pub fn set_scope(&mut self, scope: Option<u32>) -> bool {
        if self.scope == scope {
            return false;
        }

        self.scope = scope;
        self.clear();
        true
    }

    /// set_track replaces sector boundaries and canonical counts and drops every buffer.
    pub fn set_track(&mut self, sectors: SectorBoundaries, canonical_counts: [usize; NO_SECTORS]) {
        self.sectors = sectors;
        self.canonical_counts = canonical_counts;
        self.clear();
    }

    /// remove deletes all segment state of a car. Returns true if there was any.
    pub fn remove(&mut self, car_no: u32) -> bool {
        self.states.remove(&car_no);
        self.crossed_awaiting_lap.remove(&car_no);
        self.lap_awaiting_crossing.remove(&car_no);
        self.buffers.remove(&car_no).is_some()
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.buffers.clear();
        self.crossed_awaiting_lap.clear();
        self.lap_awaiting_crossing.clear();
    }

    /// counts_for returns the number of slots per sector of a fresh buffer: the track-wide count,
    /// zero-padded up to longer raw arrays of this car.
    fn counts_for(&self, raw: Option<&LapSegments>) -> [usize; NO_SECTORS] {
        let mut counts = self.canonical_counts;

        if let Some(raw) = raw {
            for (sector, count) in counts.iter_mut().enumerate() {
                *count = (*count).max(raw.sector(sector).len());
            }
        }

        counts
    }

    /// update feeds the rendered progress of a car into its state machine. Returns true if the
    /// car's buffer changed (allocated, replaced, resized or stamped).
    pub fn update(
        &mut self,
        car_no: u32,
        smoothed_progress: f64,
        raw: Option<&LapSegments>,
        lap: Option<u32>,
    ) -> bool {
        if matches!(self.scope, Some(scope) if scope != car_no) {
            return false;
        }

        let lap_dist = self.sectors.lap_dist(smoothed_progress);
        let sector = self.sectors.sector_index(lap_dist);
        let counts = self.counts_for(raw);
        let mut changed = false;

        // STATE TRANSITION ------------------------------------------------------------------------
        let lap_state = match self.state(car_no) {
            SegmentState::NoBuffer => {
                self.buffers.insert(car_no, SegmentBuffer::new(counts));
                changed = true;
                lap
            }
            SegmentState::Accumulating {
                sector: sector_prev,
                lap: lap_prev,
            } => {
                let crossed_line = sector_prev == NO_SECTORS - 1 && sector == 0;
                let lap_changed = matches!((lap_prev, lap), (Some(a), Some(b)) if a != b);

                let raw_ahead = self.lap_awaiting_crossing.contains(&car_no);

                let reset = if sector == NO_SECTORS - 1 {
                    // still drawn before the line, the crossing resets
                    if lap_changed {
                        self.lap_awaiting_crossing.insert(car_no);
                    }
                    false
                } else if crossed_line || raw_ahead {
                    self.lap_awaiting_crossing.remove(&car_no);
                    if !lap_changed && !raw_ahead {
                        self.crossed_awaiting_lap.insert(car_no);
                    }
                    true
                } else if lap_changed {
                    !self.crossed_awaiting_lap.remove(&car_no)
                } else {
                    false
                };

                if sector != 0 {
                    self.crossed_awaiting_lap.remove(&car_no);
                }

                if reset {
                    self.buffers.insert(car_no, SegmentBuffer::new(counts));
                    self.no_lap_resets += 1;
                    changed = true;
                } else if self.lap_awaiting_crossing.contains(&car_no) {
                    // raw data already belongs to the next lap
                } else if let Some(buffer) = self.buffers.get_mut(&car_no) {
                    // within a lap slots are only ever added
                    let mut grown = buffer.counts();
                    for (count, &required) in grown.iter_mut().zip(counts.iter()) {
                        *count = (*count).max(required);
                    }

                    if buffer.counts() != grown {
                        buffer.resize(grown);
                        changed = true;
                    }
                }

                lap.or(lap_prev)
            }
        };

        self.states.insert(
            car_no,
            SegmentState::Accumulating {
                sector,
                lap: lap_state,
            },
        );

        // STAMPING --------------------------------------------------------------------------------
        let raw = match raw {
            Some(raw) if !self.lap_awaiting_crossing.contains(&car_no) => raw,
            _ => return changed,
        };

        let sectors = self.sectors;
        if let Some(buffer) = self.buffers.get_mut(&car_no) {
            for (sector_idx, slots) in buffer.sectors.iter_mut().enumerate() {
                let raw_codes = raw.sector(sector_idx);
                let end_dists = sectors.segment_end_dists(sector_idx, slots.len());

                for (idx, slot) in slots.iter_mut().enumerate() {
                    let code = raw_codes.get(idx).copied().unwrap_or(0);

                    if slot.is_none() && code != 0 && lap_dist >= end_dists[idx] {
                        *slot = Some(code);
                        changed = true;
                    }
                }
            }
        }

        changed
    }
}
