//! A microscopic, lane-based road traffic simulation kernel.
//!
//! Vehicles travel along the lanes of [RoadSegment]s, driven by pluggable
//! longitudinal models and MOBIL lane changing, and enter and leave through
//! sources, on-ramps and sinks. A [Simulation] advances everything in fixed
//! time steps.

pub use boundary::{InflowTimeSeries, MacroSource, MicroArrival, MicroSource, SimpleRamp, Sink, TrafficSource};
pub use composition::TrafficComposition;
pub use error::{ConfigError, SimError};
pub use light::{LightStatus, TrafficLight};
pub use model::{FollowInput, LongitudinalModel};
pub use network::RoadNetwork;
pub use objects::{DetectorSample, DiversionSign, FlowConservingBottleneck, LoopDetector, RoadObject, SpeedLimit};
pub use regulator::{Phase, Regulator, SignalEvent};
pub use rng::SimRng;
pub use segment::{Lane, LaneRef, RoadSegment};
pub use simulation::{Simulation, SimulationState, StopHandle, TimestepListener};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use topology::{LaneConnection, SegmentSpec, Topology, TopologyLoader};
pub use util::Interval;
pub use vehicle::{Memory, Noise, Vehicle, VehicleFactory, VehicleKind, VehicleType};

mod boundary;
mod composition;
pub mod config;
mod error;
mod initial;
mod light;
pub mod math;
pub mod model;
mod network;
mod objects;
mod regulator;
mod rng;
mod segment;
mod simulation;
mod topology;
mod util;
mod vehicle;

new_key_type! {
    /// Unique ID of a [RoadSegment].
    pub struct SegmentId;
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
    /// Unique ID of a [TrafficLight].
    pub struct TrafficLightId;
}

type SegmentSet = SlotMap<SegmentId, RoadSegment>;
type VehicleSet = SlotMap<VehicleId, Vehicle>;
