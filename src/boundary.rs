//! Boundary conditions: vehicles entering and leaving the network.

pub use inflow::InflowTimeSeries;
pub use ramp::SimpleRamp;
pub use sink::Sink;
pub use source_macro::MacroSource;
pub use source_micro::{MicroArrival, MicroSource};

use crate::composition::TrafficComposition;
use crate::rng::SimRng;
use crate::segment::Lane;
use crate::vehicle::VehicleFactory;
use crate::{SegmentId, VehicleId, VehicleSet};

mod inflow;
mod ramp;
mod sink;
mod source_macro;
mod source_micro;

/// The network state lent to the boundaries of a segment for one step.
pub(crate) struct InflowEnv<'a> {
    pub vehicles: &'a mut VehicleSet,
    pub factory: &'a VehicleFactory,
    /// The network-wide composition, used on roads without their own.
    pub composition: Option<&'a TrafficComposition>,
    pub rng: &'a mut SimRng,
    /// The simulation time at the end of the current step.
    pub time: f64,
    pub dt: f64,
    /// The next sequential vehicle number.
    pub numbers: &'a mut u64,
}

/// Everything an inserting boundary needs besides its own lanes.
pub(crate) struct InsertContext<'a> {
    pub vehicles: &'a mut VehicleSet,
    pub factory: &'a VehicleFactory,
    pub composition: Option<&'a TrafficComposition>,
    pub rng: &'a mut SimRng,
    pub segment: SegmentId,
    pub road_id: &'a str,
    /// The simulation time at the end of the current step.
    pub time: f64,
    pub dt: f64,
    /// The next sequential vehicle number.
    pub numbers: &'a mut u64,
}

impl<'a> InsertContext<'a> {
    /// Draws a vehicle type from the road's composition.
    pub fn sample_type(&mut self) -> Option<usize> {
        let composition = self.composition?;
        Some(composition.sample(self.rng))
    }

    /// The length of a vehicle type.
    pub fn length_of(&self, type_index: usize) -> f64 {
        self.factory.get(type_index).length
    }

    /// Creates a vehicle and inserts it into `lane` at front position `pos`.
    pub fn spawn(
        &mut self,
        lanes: &mut [Lane],
        lane: usize,
        type_index: usize,
        pos: f64,
        speed: f64,
    ) -> VehicleId {
        let number = *self.numbers;
        *self.numbers += 1;
        let factory = self.factory;
        let rng = &mut *self.rng;
        let time = self.time;
        let id = self
            .vehicles
            .insert_with_key(|id| factory.create(id, number, type_index, time, rng));
        let veh = &mut self.vehicles[id];
        veh.set_location(self.segment, lane, pos);
        veh.set_speed(speed);
        lanes[lane].insert_vehicle(self.vehicles, id);
        log::debug!(
            "t={:.1}s: vehicle {} entered road {} lane {} at {:.1} m with {:.1} m/s",
            time,
            number,
            self.road_id,
            lane,
            pos,
            speed
        );
        id
    }

    /// The gap in front of a vehicle entering `lane` at the segment start and the
    /// speed of the vehicle ahead. Infinite on an empty lane.
    pub fn entry_gap(&self, lane: &Lane) -> (f64, Option<f64>) {
        match lane.rear_vehicle() {
            Some(id) => {
                let leader = &self.vehicles[id];
                (leader.pos_rear(), Some(leader.vel()))
            }
            None => (f64::INFINITY, None),
        }
    }
}

/// A traffic source at the start of a segment.
#[derive(Clone, Debug)]
pub enum TrafficSource {
    Macro(MacroSource),
    Micro(MicroSource),
}

impl TrafficSource {
    /// The number of vehicles inserted so far.
    pub fn inserted(&self) -> u64 {
        match self {
            TrafficSource::Macro(source) => source.inserted(),
            TrafficSource::Micro(source) => source.inserted(),
        }
    }

    pub(crate) fn time_step(&mut self, lanes: &mut [Lane], ctx: &mut InsertContext) {
        match self {
            TrafficSource::Macro(source) => source.time_step(lanes, ctx),
            TrafficSource::Micro(source) => source.time_step(lanes, ctx),
        }
    }

    pub(crate) fn reset(&mut self) {
        match self {
            TrafficSource::Macro(source) => source.reset(),
            TrafficSource::Micro(source) => source.reset(),
        }
    }
}
