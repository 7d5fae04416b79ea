use crate::boundary::InflowEnv;
use crate::composition::TrafficComposition;
use crate::error::{ConfigError, SimError};
use crate::light::TrafficLight;
use crate::model::FollowInput;
use crate::objects::RoadObject;
use crate::regulator::SignalEvent;
use crate::rng::SimRng;
use crate::segment::{LaneRef, RoadSegment};
use crate::vehicle::{
    lane_change, AccelerationUpdate, LaneChangeAccelerations, LaneDirection, Vehicle,
    VehicleFactory,
};
use crate::{SegmentId, SegmentSet, TrafficLightId, VehicleId, VehicleSet};
use arrayvec::ArrayVec;
use itertools::Itertools;
use slotmap::SlotMap;
use std::collections::HashMap;

/// The maximum distance searched ahead for leaders and traffic lights, in m.
const LOOKAHEAD: f64 = 500.0;

/// The maximum number of segments followed when searching ahead.
const MAX_HOPS: usize = 16;

/// What a vehicle sees of the vehicle in front of it.
#[derive(Clone, Copy, Debug)]
struct LeaderView {
    gap: f64,
    speed: f64,
    acc: f64,
}

impl LeaderView {
    /// The view of `leader` from a follower whose front is at `follower_pos`,
    /// with the leader's position shifted by `offset`.
    fn of(leader: &Vehicle, offset: f64, follower_pos: f64) -> Self {
        Self {
            gap: offset + leader.pos_rear() - follower_pos,
            speed: leader.vel(),
            acc: leader.acc(),
        }
    }
}

/// The lanes adjacent to `lane` on a segment with `count` lanes.
fn adjacent_lanes(lane: usize, count: usize) -> ArrayVec<usize, 2> {
    let mut lanes = ArrayVec::new();
    if lane > 0 {
        lanes.push(lane - 1);
    }
    if lane + 1 < count {
        lanes.push(lane + 1);
    }
    lanes
}

/// The road network: segments, their connectivity, and the vehicles and traffic
/// lights on them.
#[derive(Default)]
pub struct RoadNetwork {
    /// The road segments.
    segments: SegmentSet,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// The traffic lights.
    lights: SlotMap<TrafficLightId, TrafficLight>,
    /// Segments by externally assigned road id.
    road_ids: HashMap<String, SegmentId>,
    /// Traffic lights by signal id.
    signals: HashMap<String, TrafficLightId>,
    factory: VehicleFactory,
    /// The network-wide traffic composition.
    composition: Option<TrafficComposition>,
    crash_exit: bool,
    /// The next sequential vehicle number.
    numbers: u64,
    /// The number of non-obstacle vehicles placed by initial conditions.
    initial: u64,
}

impl RoadNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a segment to the network.
    ///
    /// # Parameters
    /// * `road_id` - The externally assigned road id
    /// * `length` - The length of the segment in m
    /// * `lanes` - The number of lanes
    pub fn add_segment(&mut self, road_id: &str, length: f64, lanes: usize) -> SegmentId {
        let id = self
            .segments
            .insert_with_key(|id| RoadSegment::new(id, road_id, length, lanes));
        if self.road_ids.insert(road_id.into(), id).is_some() {
            log::warn!("road id {} is used more than once", road_id);
        }
        id
    }

    /// Connects a lane to the lane its vehicles continue into.
    pub fn connect(
        &mut self,
        from: SegmentId,
        from_lane: usize,
        to: SegmentId,
        to_lane: usize,
    ) -> Result<(), ConfigError> {
        self.check_lane(from, from_lane)?;
        self.check_lane(to, to_lane)?;
        self.segments[from]
            .lane_mut(from_lane)
            .set_successor(LaneRef {
                segment: to,
                lane: to_lane,
            });
        self.segments[to].lane_mut(to_lane).add_predecessor(LaneRef {
            segment: from,
            lane: from_lane,
        });
        Ok(())
    }

    fn check_lane(&self, segment: SegmentId, lane: usize) -> Result<(), ConfigError> {
        let seg = self
            .segments
            .get(segment)
            .ok_or_else(|| ConfigError::Invalid("unknown segment".into()))?;
        if lane >= seg.lane_count() {
            return Err(ConfigError::InvalidLane {
                road: seg.road_id().into(),
                lane,
                lanes: seg.lane_count(),
            });
        }
        Ok(())
    }

    /// Looks up a segment by its road id.
    pub fn find_by_road_id(&self, road_id: &str) -> Result<SegmentId, ConfigError> {
        self.road_ids
            .get(road_id)
            .copied()
            .ok_or_else(|| ConfigError::UnknownRoad(road_id.into()))
    }

    /// Gets a reference to the segment with the given ID.
    pub fn segment(&self, id: SegmentId) -> &RoadSegment {
        &self.segments[id]
    }

    pub(crate) fn segment_mut(&mut self, id: SegmentId) -> &mut RoadSegment {
        &mut self.segments[id]
    }

    /// Iterates over all the segments in the network.
    pub fn segments(&self) -> impl Iterator<Item = &RoadSegment> {
        self.segments.values()
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    /// Iterates over all the vehicles in the network.
    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Gets a reference to the traffic light with the given ID.
    pub fn light(&self, id: TrafficLightId) -> Option<&TrafficLight> {
        self.lights.get(id)
    }

    /// Looks up a traffic light by its signal id.
    pub fn find_signal(&self, signal_id: &str) -> Result<TrafficLightId, ConfigError> {
        self.signals
            .get(signal_id)
            .copied()
            .ok_or_else(|| ConfigError::UnknownSignal(signal_id.into()))
    }

    /// The number of live vehicles, obstacles included.
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// The number of obstacles.
    pub fn obstacle_count(&self) -> usize {
        self.vehicles.values().filter(|v| v.is_obstacle()).count()
    }

    /// The total number of vehicles inserted by sources and ramps.
    pub fn inserted(&self) -> u64 {
        self.segments.values().map(RoadSegment::inserted).sum()
    }

    /// The total number of vehicles removed by sinks.
    pub fn removed(&self) -> u64 {
        self.segments.values().map(|s| s.sink().removed()).sum()
    }

    /// The number of non-obstacle vehicles placed by initial conditions.
    pub fn initial(&self) -> u64 {
        self.initial
    }

    pub fn factory(&self) -> &VehicleFactory {
        &self.factory
    }

    pub(crate) fn set_factory(&mut self, factory: VehicleFactory) {
        self.factory = factory;
    }

    /// The network-wide traffic composition.
    pub fn composition(&self) -> Option<&TrafficComposition> {
        self.composition.as_ref()
    }

    pub(crate) fn set_composition(&mut self, composition: Option<TrafficComposition>) {
        self.composition = composition;
    }

    pub(crate) fn set_crash_exit(&mut self, crash_exit: bool) {
        self.crash_exit = crash_exit;
    }

    /// Places a traffic light on a road.
    pub(crate) fn add_traffic_light(
        &mut self,
        signal_id: &str,
        road_id: &str,
        position: f64,
    ) -> Result<TrafficLightId, ConfigError> {
        let segment = self.find_by_road_id(road_id)?;
        if self.signals.contains_key(signal_id) {
            return Err(ConfigError::Invalid(format!(
                "duplicate signal id {}",
                signal_id
            )));
        }
        let id = self
            .lights
            .insert(TrafficLight::new(signal_id, segment, position));
        self.signals.insert(signal_id.into(), id);
        self.segments[segment].add_object(RoadObject::TrafficLight { id, position });
        Ok(id)
    }

    /// Applies a status change sent by a regulator.
    pub(crate) fn apply_signal_event(&mut self, event: &SignalEvent) {
        if let Some(light) = self.lights.get_mut(event.light) {
            light.set_status(event.status);
        }
    }

    /// Verifies that every traffic light has a status.
    pub(crate) fn check_lights(&self) -> Result<(), ConfigError> {
        match self.lights.values().find(|light| light.status().is_none()) {
            Some(light) => Err(ConfigError::UninitializedLight {
                signal: light.signal_id().into(),
                road: self.segments[light.segment_id()].road_id().into(),
            }),
            None => Ok(()),
        }
    }

    /// Finalizes the road object positions of every segment.
    pub(crate) fn finalize(&mut self) {
        for segment in self.segments.values_mut() {
            segment.finalize_signal_positions();
            for (id, position) in segment.traffic_lights() {
                if let Some(light) = self.lights.get_mut(id) {
                    light.set_position(position);
                }
            }
        }
    }

    /// Places a vehicle before the first step.
    pub(crate) fn add_vehicle(
        &mut self,
        segment: SegmentId,
        lane: usize,
        pos: f64,
        speed: f64,
        type_index: usize,
        rng: &mut SimRng,
    ) -> Result<VehicleId, ConfigError> {
        self.check_lane(segment, lane)?;
        let seg = &self.segments[segment];
        if !(0.0..=seg.length()).contains(&pos) {
            return Err(ConfigError::Invalid(format!(
                "position {} is outside road {}",
                pos,
                seg.road_id()
            )));
        }
        let number = self.numbers;
        self.numbers += 1;
        let factory = &self.factory;
        let id = self
            .vehicles
            .insert_with_key(|id| factory.create(id, number, type_index, 0.0, rng));
        let veh = &mut self.vehicles[id];
        veh.set_location(segment, lane, pos);
        veh.set_speed(speed);
        if !veh.is_obstacle() {
            self.initial += 1;
        }
        self.segments[segment]
            .lane_mut(lane)
            .insert_vehicle(&self.vehicles, id);
        Ok(id)
    }

    /// Removes all vehicles and the run state of every component, keeping the
    /// topology and its attachments.
    pub(crate) fn reset(&mut self) {
        self.vehicles.clear();
        for segment in self.segments.values_mut() {
            segment.reset();
        }
        for light in self.lights.values_mut() {
            light.reset();
        }
        self.numbers = 0;
        self.initial = 0;
    }

    /// Releases everything, including the topology.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Advances the network by one step.
    ///
    /// # Parameters
    /// * `dt` - The time step in seconds
    /// * `time` - The simulation time at the end of the step
    /// * `rng` - The random source
    pub(crate) fn time_step(&mut self, dt: f64, time: f64, rng: &mut SimRng) -> Result<(), SimError> {
        let updates = self.compute_accelerations(dt, rng);
        for (id, update) in updates {
            self.vehicles[id].apply(update);
        }
        let changes = self.decide_lane_changes(dt, rng);
        self.integrate(dt);
        self.sort_lanes();
        self.apply_lane_changes(changes);
        self.check_consistency(time)?;
        self.outflow(time);
        self.inflow(dt, time, rng);
        for light in self.lights.values_mut() {
            light.step(dt);
        }
        for segment in self.segments.values_mut() {
            segment.update_objects(&mut self.vehicles, time, rng);
        }
        Ok(())
    }

    /// Computes every vehicle's acceleration from the pre-step state.
    fn compute_accelerations(&self, dt: f64, rng: &mut SimRng) -> Vec<(VehicleId, AccelerationUpdate)> {
        let mut updates = Vec::with_capacity(self.vehicles.len());
        for segment in self.segments.values() {
            for (lane_idx, lane) in segment.lanes().iter().enumerate() {
                for (idx, id) in lane.vehicles().iter().enumerate() {
                    let veh = &self.vehicles[*id];
                    if veh.is_obstacle() {
                        continue;
                    }
                    let leader = self.leader_in_lane(segment.id(), lane_idx, idx + 1, veh.pos());
                    let input = self.follow_input(veh, leader, dt);
                    let stop = self.stop_distance(veh);
                    updates.push((*id, veh.compute_acceleration(input, stop, rng)));
                }
            }
        }
        updates
    }

    /// The model input for a vehicle following the given leader.
    fn follow_input(&self, veh: &Vehicle, leader: Option<LeaderView>, dt: f64) -> FollowInput {
        let segment = &self.segments[veh.segment_id()];
        let (alpha_t, alpha_v0) = segment.bottleneck_factors(veh.pos());
        let input = FollowInput {
            alpha_t,
            alpha_v0: alpha_v0 * veh.speed_factor(),
            speed_limit: segment.speed_limit_at(veh.pos()),
            max_deceleration: veh.max_deceleration(),
            ..FollowInput::free(veh.vel(), dt)
        };
        match leader {
            Some(leader) => input.behind(leader.gap, leader.speed, leader.acc),
            None => input,
        }
    }

    /// The model acceleration of `veh` behind `leader`, without noise or memory.
    fn model_acc(&self, veh: &Vehicle, leader: Option<LeaderView>, dt: f64, rng: &mut SimRng) -> f64 {
        veh.model_acceleration(&self.follow_input(veh, leader, dt), rng)
    }

    /// Finds the first vehicle at or after index `start` of a lane, following the
    /// lane's successors when the lane ends.
    fn leader_in_lane(&self, segment: SegmentId, lane: usize, start: usize, front: f64) -> Option<LeaderView> {
        let mut at = LaneRef { segment, lane };
        let mut idx = start;
        let mut offset = 0.0;
        for _ in 0..MAX_HOPS {
            let seg = &self.segments[at.segment];
            let lane = seg.lane(at.lane)?;
            if let Some(id) = lane.vehicles().get(idx) {
                return Some(LeaderView::of(&self.vehicles[*id], offset, front));
            }
            offset += seg.length();
            if offset - front > LOOKAHEAD {
                return None;
            }
            at = lane.successor()?;
            idx = 0;
        }
        None
    }

    /// The distance to the nearest stop line ahead at which the vehicle must stop.
    fn stop_distance(&self, veh: &Vehicle) -> Option<f64> {
        let mut at = LaneRef {
            segment: veh.segment_id(),
            lane: veh.lane(),
        };
        let mut offset = 0.0;
        for _ in 0..MAX_HOPS {
            let seg = &self.segments[at.segment];
            let stop = seg
                .traffic_lights()
                .map(|(id, position)| (id, offset + position - veh.pos()))
                .filter(|(_, distance)| (0.0..=LOOKAHEAD).contains(distance))
                .find(|(id, distance)| {
                    self.lights[*id].must_stop(*distance, veh.vel(), veh.max_deceleration())
                });
            if let Some((_, distance)) = stop {
                return Some(distance);
            }
            offset += seg.length();
            if offset - veh.pos() > LOOKAHEAD {
                return None;
            }
            at = seg.lane(at.lane)?.successor()?;
        }
        None
    }

    /// Evaluates the MOBIL decision of every vehicle on the post-acceleration,
    /// pre-position state.
    fn decide_lane_changes(&self, dt: f64, rng: &mut SimRng) -> Vec<(VehicleId, usize)> {
        let mut changes = vec![];
        for segment in self.segments.values() {
            if segment.lane_count() < 2 {
                continue;
            }
            for (lane_idx, lane) in segment.lanes().iter().enumerate() {
                for (idx, id) in lane.vehicles().iter().enumerate() {
                    let veh = &self.vehicles[*id];
                    let Some(params) = veh.lane_change() else {
                        continue;
                    };
                    let target = if veh.is_diverting() {
                        segment.diversion_lane_at(veh.pos())
                    } else {
                        None
                    };
                    let mut best: Option<(usize, f64)> = None;
                    for candidate in adjacent_lanes(lane_idx, segment.lane_count()) {
                        let Some(accs) = self.lane_change_accelerations(segment, lane_idx, idx, candidate, dt, rng) else {
                            continue;
                        };
                        let mandatory = target.and_then(|target| {
                            let before = target.abs_diff(lane_idx);
                            let after = target.abs_diff(candidate);
                            (before != after).then(|| after < before)
                        });
                        let direction = LaneDirection::between(lane_idx, candidate);
                        let value = lane_change::incentive(params, &accs, direction, mandatory);
                        if value > params.threshold && best.map_or(true, |(_, b)| value > b) {
                            best = Some((candidate, value));
                        }
                    }
                    if let Some((target, _)) = best {
                        changes.push((*id, target));
                    }
                }
            }
        }
        changes
    }

    /// Gathers the accelerations affected by moving the vehicle at `idx` of
    /// `lane_idx` into `target`, or `None` if the change is unsafe.
    fn lane_change_accelerations(
        &self,
        segment: &RoadSegment,
        lane_idx: usize,
        idx: usize,
        target: usize,
        dt: f64,
        rng: &mut SimRng,
    ) -> Option<LaneChangeAccelerations> {
        let lane = &segment.lanes()[lane_idx];
        let me = &self.vehicles[lane.vehicles()[idx]];
        let params = me.lane_change()?;
        let target_lane = &segment.lanes()[target];
        let ahead = target_lane.index_ahead_of(&self.vehicles, me.pos());

        let new_leader = self.leader_in_lane(segment.id(), target, ahead, me.pos());
        let new_follower = ahead
            .checked_sub(1)
            .map(|k| &self.vehicles[target_lane.vehicles()[k]]);
        let front_gap = new_leader.map_or(f64::INFINITY, |l| l.gap);
        let back_gap = new_follower.map_or(f64::INFINITY, |f| me.pos_rear() - f.pos());
        if !lane_change::is_safe(params, front_gap, back_gap, None) {
            return None;
        }

        let new_follower = match new_follower {
            Some(f) if !f.is_obstacle() => {
                let current = self.leader_in_lane(segment.id(), target, ahead, f.pos());
                let before = self.model_acc(f, current, dt, rng);
                let after = self.model_acc(f, Some(LeaderView::of(me, 0.0, f.pos())), dt, rng);
                Some((before, after))
            }
            _ => None,
        };
        if !lane_change::is_safe(params, front_gap, back_gap, new_follower.map(|(_, after)| after)) {
            return None;
        }

        let own_leader = self.leader_in_lane(segment.id(), lane_idx, idx + 1, me.pos());
        let own_before = self.model_acc(me, own_leader, dt, rng);
        let own_after = self.model_acc(me, new_leader, dt, rng);

        let old_follower = match idx.checked_sub(1).map(|k| &self.vehicles[lane.vehicles()[k]]) {
            Some(f) if !f.is_obstacle() => {
                let before = self.model_acc(f, Some(LeaderView::of(me, 0.0, f.pos())), dt, rng);
                let next = self.leader_in_lane(segment.id(), lane_idx, idx + 1, f.pos());
                let after = self.model_acc(f, next, dt, rng);
                Some((before, after))
            }
            _ => None,
        };

        Some(LaneChangeAccelerations {
            own_before,
            own_after,
            new_follower,
            old_follower,
        })
    }

    /// Moves every vehicle and records detector crossings.
    fn integrate(&mut self, dt: f64) {
        for veh in self.vehicles.values_mut() {
            veh.integrate(dt);
            self.segments[veh.segment_id()].record_crossings(veh);
        }
    }

    fn sort_lanes(&mut self) {
        for segment in self.segments.values_mut() {
            for lane in 0..segment.lane_count() {
                segment.lane_mut(lane).sort(&self.vehicles);
            }
        }
    }

    /// Executes the lane changes decided this step. A change is skipped if the
    /// vehicle no longer fits into its target gap.
    fn apply_lane_changes(&mut self, changes: Vec<(VehicleId, usize)>) {
        for (id, target) in changes {
            let veh = &self.vehicles[id];
            let (segment_id, from, front, rear) = (veh.segment_id(), veh.lane(), veh.pos(), veh.pos_rear());
            let segment = &mut self.segments[segment_id];
            let Some(lane) = segment.lane(target) else {
                continue;
            };
            let ahead = lane.index_ahead_of(&self.vehicles, front);
            let leader_blocks = lane
                .vehicles()
                .get(ahead)
                .map_or(false, |l| self.vehicles[*l].pos_rear() < front);
            let follower_blocks = ahead
                .checked_sub(1)
                .map_or(false, |k| self.vehicles[lane.vehicles()[k]].pos() > rear);
            if leader_blocks || follower_blocks {
                log::debug!(
                    "lane change of vehicle {} into lane {} blocked",
                    self.vehicles[id].number(),
                    target
                );
                continue;
            }
            segment.lane_mut(from).remove_vehicle(id);
            self.vehicles[id].set_lane(target);
            segment.lane_mut(target).insert_vehicle(&self.vehicles, id);
        }
    }

    /// Checks that consecutive vehicles in every lane do not overlap.
    fn check_consistency(&self, time: f64) -> Result<(), SimError> {
        for segment in self.segments.values() {
            for (lane_idx, lane) in segment.lanes().iter().enumerate() {
                for (follower, leader) in lane.vehicles().iter().tuple_windows() {
                    let follower = &self.vehicles[*follower];
                    let gap = self.vehicles[*leader].pos_rear() - follower.pos();
                    if gap >= 0.0 {
                        continue;
                    }
                    if self.crash_exit {
                        log::error!(
                            "crash of vehicle {} on road {} lane {} at t={:.2}s",
                            follower.number(),
                            segment.road_id(),
                            lane_idx,
                            time
                        );
                        return Err(SimError::Crash {
                            road: segment.road_id().into(),
                            lane: lane_idx,
                            vehicle: follower.number(),
                            time,
                            gap,
                        });
                    }
                    log::warn!(
                        "crash of vehicle {} on road {} lane {} at t={:.2}s (gap={:.3}m)",
                        follower.number(),
                        segment.road_id(),
                        lane_idx,
                        time,
                        gap
                    );
                }
            }
        }
        Ok(())
    }

    /// Moves vehicles past the end of their segment onto the successor lane, or
    /// removes them through the segment's sink.
    fn outflow(&mut self, time: f64) {
        let mut moved = vec![];
        for segment in self.segments.values_mut() {
            let length = segment.length();
            for lane in 0..segment.lane_count() {
                while let Some(id) = segment.lane_mut(lane).pop_beyond(&self.vehicles, length) {
                    match segment.lanes()[lane].successor() {
                        Some(next) => {
                            self.vehicles[id].transfer(next.segment, next.lane, length);
                            moved.push(id);
                        }
                        None => {
                            if let Some(veh) = self.vehicles.remove(id) {
                                segment.sink_vehicle(&veh, time);
                            }
                        }
                    }
                }
            }
        }
        for id in moved {
            let veh = &self.vehicles[id];
            let (segment, lane) = (veh.segment_id(), veh.lane());
            self.segments[segment]
                .lane_mut(lane)
                .insert_vehicle(&self.vehicles, id);
        }
    }

    /// Runs every source and ramp.
    fn inflow(&mut self, dt: f64, time: f64, rng: &mut SimRng) {
        for segment in self.segments.values_mut() {
            if segment.source().is_none() && segment.ramp().is_none() {
                continue;
            }
            segment.run_boundaries(InflowEnv {
                vehicles: &mut self.vehicles,
                factory: &self.factory,
                composition: self.composition.as_ref(),
                rng: &mut *rng,
                time,
                dt,
                numbers: &mut self.numbers,
            });
        }
    }
}
