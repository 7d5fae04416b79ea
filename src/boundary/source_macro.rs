use super::{InflowTimeSeries, InsertContext};
use crate::config::GapAcceptance;
use crate::segment::Lane;

/// Entering vehicles take over the speed of a slower leader closer than this
/// time headway at the inflow speed, in s.
const FREE_ENTRY_HEADWAY: f64 = 3.0;

/// Inserts vehicles at the start of a segment following an aggregate flow schedule.
#[derive(Clone, Debug)]
pub struct MacroSource {
    inflow: InflowTimeSeries,
    gap_acceptance: GapAcceptance,
    /// Fractional number of vehicles waiting to enter.
    waiting: f64,
    /// The type drawn for the next vehicle, kept while its entry is deferred.
    pending: Option<usize>,
    inserted: u64,
}

impl MacroSource {
    pub fn new(inflow: InflowTimeSeries, gap_acceptance: GapAcceptance) -> Self {
        Self {
            inflow,
            gap_acceptance,
            waiting: 0.0,
            pending: None,
            inserted: 0,
        }
    }

    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    /// The fractional number of vehicles waiting to enter.
    pub fn waiting(&self) -> f64 {
        self.waiting
    }

    pub(crate) fn time_step(&mut self, lanes: &mut [Lane], ctx: &mut InsertContext) {
        let time = ctx.time;
        self.waiting += self.inflow.flow(time) * lanes.len() as f64 * ctx.dt;
        if self.waiting < 1.0 {
            return;
        }

        let type_index = match self.pending.or_else(|| ctx.sample_type()) {
            Some(type_index) => type_index,
            None => return,
        };
        self.pending = Some(type_index);

        // The lane with the largest entry gap; ties go to the leftmost lane.
        let mut best: Option<(usize, f64, Option<f64>)> = None;
        for (idx, lane) in lanes.iter().enumerate() {
            let (gap, leader_speed) = ctx.entry_gap(lane);
            if best.map_or(true, |(_, best_gap, _)| gap > best_gap) {
                best = Some((idx, gap, leader_speed));
            }
        }
        let Some((lane, gap, leader_speed)) = best else {
            return;
        };

        let inflow_speed = self.inflow.speed(time);
        let speed = match leader_speed {
            Some(leader) if gap < inflow_speed * FREE_ENTRY_HEADWAY => f64::min(inflow_speed, leader),
            _ => inflow_speed,
        };
        if gap < self.gap_acceptance.required(speed) {
            return;
        }

        ctx.spawn(lanes, lane, type_index, 0.0, speed);
        self.waiting -= 1.0;
        self.pending = None;
        self.inserted += 1;
    }

    pub(crate) fn reset(&mut self) {
        self.waiting = 0.0;
        self.pending = None;
        self.inserted = 0;
    }
}
