pub use lane::{Lane, LaneRef};

use crate::boundary::{InflowEnv, InsertContext, SimpleRamp, Sink, TrafficSource};
use crate::composition::TrafficComposition;
use crate::objects::{DiversionSign, LoopDetector, RoadObject};
use crate::rng::SimRng;
use crate::vehicle::Vehicle;
use crate::{SegmentId, TrafficLightId, VehicleSet};

mod lane;

/// Factors from bottlenecks never scale the model parameters below this value.
const MIN_BOTTLENECK_FACTOR: f64 = 0.1;

/// A road segment with one or more parallel lanes.
#[derive(Clone, Debug)]
pub struct RoadSegment {
    /// The segment ID.
    id: SegmentId,
    /// The externally assigned road id.
    road_id: String,
    /// The length in m.
    length: f64,
    /// The lanes, leftmost first.
    lanes: Vec<Lane>,
    /// Road objects, ordered by position once finalized.
    objects: Vec<RoadObject>,
    source: Option<TrafficSource>,
    ramp: Option<SimpleRamp>,
    sink: Sink,
    /// Overrides the network composition on this segment.
    composition: Option<TrafficComposition>,
}

impl RoadSegment {
    /// Creates a new segment.
    pub(crate) fn new(id: SegmentId, road_id: &str, length: f64, lanes: usize) -> Self {
        Self {
            id,
            road_id: road_id.into(),
            length,
            lanes: vec![Lane::default(); lanes],
            objects: vec![],
            source: None,
            ramp: None,
            sink: Sink::default(),
            composition: None,
        }
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn road_id(&self) -> &str {
        &self.road_id
    }

    /// Gets the length of the segment in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn lane(&self, lane: usize) -> Option<&Lane> {
        self.lanes.get(lane)
    }

    pub(crate) fn lane_mut(&mut self, lane: usize) -> &mut Lane {
        &mut self.lanes[lane]
    }

    /// Whether vehicles leave the network through at least one lane of this segment.
    pub fn has_exit(&self) -> bool {
        self.lanes.iter().any(|lane| lane.successor().is_none())
    }

    /// The number of vehicles on the segment.
    pub fn vehicle_count(&self) -> usize {
        self.lanes.iter().map(|lane| lane.vehicles().len()).sum()
    }

    pub fn objects(&self) -> &[RoadObject] {
        &self.objects
    }

    pub(crate) fn add_object(&mut self, object: RoadObject) {
        self.objects.push(object);
    }

    /// The traffic lights on the segment with their stop line positions.
    pub fn traffic_lights(&self) -> impl Iterator<Item = (TrafficLightId, f64)> + '_ {
        self.objects.iter().filter_map(|obj| match obj {
            RoadObject::TrafficLight { id, position } => Some((*id, *position)),
            _ => None,
        })
    }

    /// The loop detectors on the segment, in order of position.
    pub fn detectors(&self) -> impl Iterator<Item = &LoopDetector> {
        self.objects.iter().filter_map(|obj| match obj {
            RoadObject::Detector(det) => Some(det),
            _ => None,
        })
    }

    /// Gets a loop detector by its index in order of position.
    pub fn detector(&self, index: usize) -> Option<&LoopDetector> {
        self.detectors().nth(index)
    }

    fn diversions(&self) -> impl Iterator<Item = &DiversionSign> {
        self.objects.iter().filter_map(|obj| match obj {
            RoadObject::Diversion(sign) => Some(sign),
            _ => None,
        })
    }

    pub fn source(&self) -> Option<&TrafficSource> {
        self.source.as_ref()
    }

    pub(crate) fn set_source(&mut self, source: TrafficSource) {
        self.source = Some(source);
    }

    pub fn ramp(&self) -> Option<&SimpleRamp> {
        self.ramp.as_ref()
    }

    pub(crate) fn set_ramp(&mut self, ramp: SimpleRamp) {
        self.ramp = Some(ramp);
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub(crate) fn set_sink(&mut self, sink: Sink) {
        self.sink = sink;
    }

    pub fn composition(&self) -> Option<&TrafficComposition> {
        self.composition.as_ref()
    }

    pub(crate) fn set_composition(&mut self, composition: TrafficComposition) {
        self.composition = Some(composition);
    }

    /// The number of vehicles inserted by the segment's source and ramp.
    pub fn inserted(&self) -> u64 {
        self.source.as_ref().map_or(0, TrafficSource::inserted)
            + self.ramp.as_ref().map_or(0, SimpleRamp::inserted)
    }

    /// Fits every road object onto the segment and orders them by position.
    /// Must be called once all objects are attached.
    pub(crate) fn finalize_signal_positions(&mut self) {
        let (length, lanes) = (self.length, self.lanes.len());
        for object in &mut self.objects {
            object.finalize(length, lanes);
        }
        self.objects
            .sort_by(|a, b| a.position().total_cmp(&b.position()));
    }

    /// The time headway and desired speed factors at `pos`.
    pub fn bottleneck_factors(&self, pos: f64) -> (f64, f64) {
        self.objects
            .iter()
            .filter_map(|obj| match obj {
                RoadObject::Bottleneck(bn) => Some((bn.alpha_t(pos), bn.alpha_v0(pos))),
                _ => None,
            })
            .fold((1.0, 1.0), |(t, v0), (bt, bv0)| {
                (
                    t * f64::max(bt, MIN_BOTTLENECK_FACTOR),
                    v0 * f64::max(bv0, MIN_BOTTLENECK_FACTOR),
                )
            })
    }

    /// The speed limit in effect at `pos`, in m/s.
    pub fn speed_limit_at(&self, pos: f64) -> f64 {
        self.objects
            .iter()
            .filter_map(|obj| match obj {
                RoadObject::SpeedLimit(limit) if limit.position <= pos => Some(limit.limit),
                _ => None,
            })
            .last()
            .unwrap_or(f64::INFINITY)
    }

    /// The lane a diverted vehicle at `pos` must reach, if a diversion applies there.
    pub fn diversion_lane_at(&self, pos: f64) -> Option<usize> {
        self.diversions()
            .find(|sign| sign.range().contains(pos))
            .and_then(DiversionSign::lane)
    }

    /// Records detector crossings of a vehicle that has just been integrated.
    pub(crate) fn record_crossings(&mut self, vehicle: &Vehicle) {
        for object in &mut self.objects {
            if let RoadObject::Detector(det) = object {
                if det.crossed(vehicle.prev_pos(), vehicle.pos()) {
                    det.record(vehicle.lane(), vehicle.vel(), vehicle.length());
                }
            }
        }
    }

    /// Runs the segment's source and ramp.
    pub(crate) fn run_boundaries(&mut self, env: InflowEnv<'_>) {
        let Self {
            id,
            road_id,
            lanes,
            source,
            ramp,
            composition,
            ..
        } = self;
        let mut ctx = InsertContext {
            vehicles: env.vehicles,
            factory: env.factory,
            composition: composition.as_ref().or(env.composition),
            rng: env.rng,
            segment: *id,
            road_id,
            time: env.time,
            dt: env.dt,
            numbers: env.numbers,
        };
        if let Some(source) = source {
            source.time_step(lanes, &mut ctx);
        }
        if let Some(ramp) = ramp {
            ramp.time_step(lanes, &mut ctx);
        }
    }

    /// Removes a vehicle leaving the network through this segment.
    pub(crate) fn sink_vehicle(&mut self, vehicle: &Vehicle, time: f64) {
        self.sink.record(vehicle, &self.road_id, time);
    }

    /// Runs the attached road objects after the vehicles have moved.
    pub(crate) fn update_objects(&mut self, vehicles: &mut VehicleSet, time: f64, rng: &mut SimRng) {
        for object in &mut self.objects {
            match object {
                RoadObject::Detector(det) => det.update(time),
                RoadObject::Diversion(sign) => {
                    let range = sign.range();
                    for id in self.lanes.iter().flat_map(|lane| lane.vehicles()) {
                        let veh = &mut vehicles[*id];
                        if veh.is_obstacle() || veh.diverting().is_some() || !range.contains(veh.pos()) {
                            continue;
                        }
                        veh.set_diverting(Some(rng.chance(sign.compliance())));
                    }
                }
                _ => {}
            }
        }
    }

    /// Forgets all vehicles and the run state of sources, sinks and detectors.
    pub(crate) fn reset(&mut self) {
        for lane in &mut self.lanes {
            lane.clear();
        }
        for object in &mut self.objects {
            if let RoadObject::Detector(det) = object {
                det.reset();
            }
        }
        if let Some(source) = self.source.as_mut() {
            source.reset();
        }
        if let Some(ramp) = self.ramp.as_mut() {
            ramp.reset();
        }
        self.sink.reset();
    }
}
