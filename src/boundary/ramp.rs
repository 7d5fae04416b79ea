use super::{InflowTimeSeries, InsertContext};
use crate::config::SimpleRampConfig;
use crate::segment::Lane;
use crate::util::Interval;
use itertools::Itertools;

/// An on-ramp that merges vehicles directly into the largest acceptable gap of a
/// merge zone on the main road.
///
/// While the density in the merge zone exceeds a threshold the effective inflow
/// drops by the configured fraction.
#[derive(Clone, Debug)]
pub struct SimpleRamp {
    inflow: InflowTimeSeries,
    zone: Interval,
    lane: usize,
    config: SimpleRampConfig,
    waiting: f64,
    pending: Option<usize>,
    inserted: u64,
}

/// A feasible insertion spot.
#[derive(Clone, Copy, Debug)]
struct Slot {
    front: f64,
    speed: f64,
    /// The smaller of the two gaps the entering vehicle would have.
    clearance: f64,
}

impl SimpleRamp {
    /// Creates a ramp on a road of the given length and lane count.
    pub fn new(config: &SimpleRampConfig, length: f64, lanes: usize) -> Self {
        let start = config.merge_start.clamp(0.0, length);
        let rightmost = lanes.saturating_sub(1);
        Self {
            inflow: InflowTimeSeries::new(&config.inflow),
            zone: Interval::starting_at(start, f64::max(config.merge_length, 0.0)).clamp_max(length),
            lane: config.lane.map_or(rightmost, |lane| lane.min(rightmost)),
            config: config.clone(),
            waiting: 0.0,
            pending: None,
            inserted: 0,
        }
    }

    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    /// The merge zone.
    pub fn zone(&self) -> Interval {
        self.zone
    }

    /// The lane vehicles merge into.
    pub fn lane(&self) -> usize {
        self.lane
    }

    /// The density of vehicles in the merge zone, in vehicles per m.
    fn zone_density(&self, lane: &Lane, ctx: &InsertContext) -> f64 {
        if self.zone.length() <= 0.0 {
            return 0.0;
        }
        let count = lane
            .vehicles()
            .iter()
            .filter(|id| self.zone.contains(ctx.vehicles[**id].pos()))
            .count();
        count as f64 / self.zone.length()
    }

    /// The best spot for a vehicle of `length` entering the merge zone.
    fn find_slot(&self, lane: &Lane, length: f64, inflow_speed: f64, ctx: &InsertContext) -> Option<Slot> {
        let neighbours = lane.vehicles().iter().map(|id| {
            let veh = &ctx.vehicles[*id];
            Some((veh.pos(), veh.pos_rear(), veh.vel()))
        });
        std::iter::once(None)
            .chain(neighbours)
            .chain(std::iter::once(None))
            .tuple_windows()
            .filter_map(|(follower, leader)| {
                let back = follower.map_or(f64::NEG_INFINITY, |(front, _, _)| front);
                let ahead = leader.map_or(f64::INFINITY, |(_, rear, _)| rear);
                let speed = match (follower, leader) {
                    (Some((_, _, v1)), Some((_, _, v2))) => 0.5 * (v1 + v2),
                    (Some((_, _, v)), None) | (None, Some((_, _, v))) => v,
                    (None, None) => inflow_speed,
                } * self.config.speed_factor;
                let required = self.config.gap_acceptance.required(speed);

                let ideal = match (back.is_finite(), ahead.is_finite()) {
                    (true, true) => 0.5 * (back + ahead + length),
                    (true, false) => back + length + required,
                    (false, true) => ahead - required,
                    (false, false) => self.zone.midpoint(),
                };
                let front = ideal.clamp(self.zone.min, self.zone.max);
                let clearance = f64::min(ahead - front, front - length - back);
                (clearance >= required).then(|| Slot {
                    front,
                    speed,
                    clearance,
                })
            })
            .max_by(|a, b| a.clearance.total_cmp(&b.clearance))
    }

    pub(crate) fn time_step(&mut self, lanes: &mut [Lane], ctx: &mut InsertContext) {
        let Some(lane) = lanes.get(self.lane) else {
            return;
        };
        let mut flow = self.inflow.flow(ctx.time);
        if self.zone_density(lane, ctx) > self.config.density_threshold {
            flow *= 1.0 - self.config.capacity_drop.clamp(0.0, 1.0);
        }
        self.waiting += flow * ctx.dt;
        if self.waiting < 1.0 {
            return;
        }

        let Some(type_index) = self.pending.or_else(|| ctx.sample_type()) else {
            return;
        };
        self.pending = Some(type_index);

        let length = ctx.length_of(type_index);
        let inflow_speed = self.inflow.speed(ctx.time);
        if let Some(slot) = self.find_slot(lane, length, inflow_speed, ctx) {
            ctx.spawn(lanes, self.lane, type_index, slot.front, slot.speed);
            self.waiting -= 1.0;
            self.pending = None;
            self.inserted += 1;
        }
    }

    pub(crate) fn reset(&mut self) {
        self.waiting = 0.0;
        self.pending = None;
        self.inserted = 0;
    }
}
