//! Already-validated scenario configuration consumed by the simulation.
//!
//! Reading these values from files is the job of an external loader; the structs
//! here only carry the values and their defaults.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The top-level configuration of a simulation run.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScenarioConfig {
    /// A name used in log messages.
    pub name: String,
    /// The fixed time step in s. Must be positive.
    pub timestep: f64,
    /// The simulated duration in s; `None` runs until the completion predicate holds.
    pub duration: Option<f64>,
    /// Whether to seed the random source with `seed`.
    pub fixed_seed: bool,
    /// The random seed.
    pub seed: u64,
    /// Whether a crash aborts the run.
    pub crash_exit: bool,
    /// Wall-clock time of `t = 0` in ms since the UNIX epoch, for output correlation.
    pub time_offset_millis: Option<i64>,
    /// The vehicle types referenced by compositions and initial conditions.
    pub vehicle_types: Vec<VehicleTypeConfig>,
    /// The network-wide traffic composition.
    pub composition: Vec<CompositionEntry>,
    /// Per-road set-up.
    pub roads: Vec<RoadConfig>,
    /// The traffic lights.
    pub traffic_lights: Vec<TrafficLightConfig>,
    /// The controllers driving the traffic lights.
    pub regulators: Vec<RegulatorConfig>,
    /// The vehicles present before the first step.
    pub initial_conditions: InitialConditions,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            name: "scenario".into(),
            timestep: 0.2,
            duration: None,
            fixed_seed: true,
            seed: 42,
            crash_exit: false,
            time_offset_millis: None,
            vehicle_types: vec![],
            composition: vec![],
            roads: vec![],
            traffic_lights: vec![],
            regulators: vec![],
            initial_conditions: Default::default(),
        }
    }
}

/// The parameters of a named model, e.g. `IDM` with `v0 = 30`.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModelSpec {
    /// The model name, matched case-insensitively.
    pub name: String,
    /// Parameter values by name. Unspecified parameters take the model defaults.
    pub params: BTreeMap<String, f64>,
}

impl ModelSpec {
    /// Creates a model specification from a name and parameter pairs.
    pub fn new<'a>(name: &str, params: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    /// Gets a parameter or its default.
    pub fn get(&self, key: &str, default: f64) -> f64 {
        self.params.get(key).copied().unwrap_or(default)
    }
}

/// A vehicle type record.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleTypeConfig {
    /// Unique label.
    pub label: String,
    /// Vehicle length in m.
    pub length: f64,
    /// Maximum (emergency) deceleration, a positive number in m/s^2.
    pub max_deceleration: f64,
    /// Whether vehicles of this type are permanently stationary obstacles.
    pub obstacle: bool,
    /// The longitudinal model.
    pub model: ModelSpec,
    /// Lane-changing parameters; `None` keeps vehicles in their lane.
    pub lane_change: Option<LaneChangeConfig>,
    /// Optional acceleration noise.
    pub noise: Option<NoiseConfig>,
    /// Optional perception memory.
    pub memory: Option<MemoryConfig>,
    /// Standard deviation of the per-vehicle desired speed factor.
    pub speed_factor_stddev: Option<f64>,
}

impl VehicleTypeConfig {
    /// A stationary obstacle type with the given label and length.
    pub fn obstacle(label: &str, length: f64) -> Self {
        Self {
            label: label.into(),
            length,
            max_deceleration: 9.0,
            obstacle: true,
            model: ModelSpec::new("IDM", []),
            lane_change: None,
            noise: None,
            memory: None,
            speed_factor_stddev: None,
        }
    }
}

/// MOBIL lane-changing parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LaneChangeConfig {
    /// Weight given to the acceleration changes of other drivers.
    pub politeness: f64,
    /// Minimum acceleration advantage in m/s^2.
    pub threshold: f64,
    /// Extra advantage for moving right in m/s^2.
    pub bias_right: f64,
    /// Maximum deceleration imposed on the new follower in m/s^2.
    pub safe_deceleration: f64,
    /// Minimum gap in front of and behind the vehicle in the target lane, in m.
    pub min_gap: f64,
}

impl Default for LaneChangeConfig {
    fn default() -> Self {
        Self {
            politeness: 0.1,
            threshold: 0.2,
            bias_right: 0.1,
            safe_deceleration: 4.0,
            min_gap: 2.0,
        }
    }
}

/// Acceleration noise parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NoiseConfig {
    /// Fluctuation strength in m/s^2.
    pub strength: f64,
    /// Relaxation time of the noise process in s.
    pub relaxation_time: f64,
}

/// Perception memory parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MemoryConfig {
    /// Time constant of the estimation lag in s.
    pub tau: f64,
}

/// A share of a traffic composition.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompositionEntry {
    /// The vehicle type label.
    pub label: String,
    /// The relative fraction; fractions need not sum to one.
    pub fraction: f64,
}

impl CompositionEntry {
    pub fn new(label: &str, fraction: f64) -> Self {
        Self {
            label: label.into(),
            fraction,
        }
    }
}

/// The set-up of one road, matched to a segment by its road id.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoadConfig {
    pub road_id: String,
    /// Overrides the network composition on this road.
    pub composition: Option<Vec<CompositionEntry>>,
    pub source: Option<SourceConfig>,
    pub sink: Option<SinkConfig>,
    pub simple_ramp: Option<SimpleRampConfig>,
    pub detectors: Option<DetectorConfig>,
    pub bottlenecks: Vec<BottleneckConfig>,
    pub speed_limits: Vec<SpeedLimitConfig>,
    pub diversions: Vec<DiversionConfig>,
}

impl RoadConfig {
    pub fn new(road_id: &str) -> Self {
        Self {
            road_id: road_id.into(),
            ..Default::default()
        }
    }
}

/// A point of an inflow time series.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InflowPoint {
    /// Simulation time in s.
    pub time: f64,
    /// Flow per lane in vehicles per hour.
    pub flow_per_hour: f64,
    /// Entry speed in m/s.
    pub speed: f64,
}

/// Minimum headway a new vehicle needs in front of it to be inserted.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GapAcceptance {
    /// Constant part of the required gap in m.
    pub min_gap: f64,
    /// Speed-dependent part of the required gap in s.
    pub time_gap: f64,
}

impl Default for GapAcceptance {
    fn default() -> Self {
        Self {
            min_gap: 2.0,
            time_gap: 0.5,
        }
    }
}

impl GapAcceptance {
    /// The gap needed for a vehicle entering with `speed`.
    pub fn required(&self, speed: f64) -> f64 {
        self.min_gap + self.time_gap * speed
    }
}

/// A boundary traffic source.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SourceConfig {
    /// Insertion driven by an aggregate flow schedule.
    Macro {
        inflow: Vec<InflowPoint>,
        gap_acceptance: GapAcceptance,
    },
    /// Insertion of explicit vehicles at given times.
    Micro {
        records: Vec<MicroInflowRecord>,
        policy: InfeasiblePolicy,
    },
}

/// An explicit vehicle arrival.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MicroInflowRecord {
    /// Arrival time in s.
    pub time: f64,
    pub lane: usize,
    /// Vehicle type label; `None` samples the road composition.
    pub type_label: Option<String>,
    /// Entry speed in m/s.
    pub speed: f64,
}

/// What to do with a microscopic arrival that cannot physically enter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InfeasiblePolicy {
    /// Drop the arrival and log a warning.
    #[default]
    Drop,
    /// Retry on the next step.
    Defer,
}

/// Set-up of a road's sink.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SinkConfig {
    /// Whether to log every removal.
    pub logging: bool,
}

/// An on-ramp merging directly into the road.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimpleRampConfig {
    pub inflow: Vec<InflowPoint>,
    /// Start of the merge zone in m.
    pub merge_start: f64,
    /// Length of the merge zone in m.
    pub merge_length: f64,
    /// The lane merged into; `None` is the rightmost lane.
    pub lane: Option<usize>,
    /// Entry speed relative to the mean speed of the surrounding vehicles.
    pub speed_factor: f64,
    pub gap_acceptance: GapAcceptance,
    /// Density in the merge zone, in vehicles per m, above which capacity drops.
    pub density_threshold: f64,
    /// Fraction of the inflow lost while above the density threshold.
    pub capacity_drop: f64,
}

impl Default for SimpleRampConfig {
    fn default() -> Self {
        Self {
            inflow: vec![],
            merge_start: 0.0,
            merge_length: 100.0,
            lane: None,
            speed_factor: 0.9,
            gap_acceptance: Default::default(),
            density_threshold: 0.05,
            capacity_drop: 0.3,
        }
    }
}

/// Loop detectors on a road.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectorConfig {
    /// Aggregation interval in s.
    pub sample_interval: f64,
    /// Cross-section positions in m.
    pub positions: Vec<f64>,
}

/// A knot of a flow-conserving bottleneck.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BottleneckPoint {
    pub position: f64,
    /// Factor on the time headway.
    pub alpha_t: f64,
    /// Factor on the desired speed.
    pub alpha_v0: f64,
}

/// A flow-conserving bottleneck.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BottleneckConfig {
    pub points: Vec<BottleneckPoint>,
}

/// A speed limit starting at a position.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeedLimitConfig {
    pub position: f64,
    /// Limit in m/s.
    pub limit: f64,
}

/// A variable message sign diverting traffic into a lane.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DiversionConfig {
    pub position: f64,
    pub valid_length: f64,
    /// The lane diverted traffic moves into; `None` is the rightmost lane.
    pub lane: Option<usize>,
    /// Probability that a passing driver follows the sign.
    pub compliance: f64,
}

/// A traffic light placed on a road.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrafficLightConfig {
    pub signal_id: String,
    pub road_id: String,
    /// Stop line position in m.
    pub position: f64,
}

/// A phase of a regulator's signal plan.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhaseConfig {
    /// The status of each controlled signal during this phase.
    pub statuses: Vec<(String, crate::LightStatus)>,
    pub min_duration: f64,
    pub max_duration: f64,
    /// A detector `(road id, index)` whose traffic extends the phase up to `max_duration`.
    /// Detectors are indexed in order of position along the road.
    pub extend_on: Option<(String, usize)>,
}

/// A controller for a group of traffic lights.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegulatorConfig {
    pub name: String,
    pub phases: Vec<PhaseConfig>,
    /// Time into the first phase at `t = 0`, in s.
    pub offset: f64,
}

/// Vehicles placed before the first step.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InitialConditions {
    pub vehicles: Vec<InitialVehicle>,
    pub densities: Vec<InitialDensity>,
}

/// A single vehicle placed before the first step.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InitialVehicle {
    pub road_id: String,
    pub lane: usize,
    /// Front position in m.
    pub position: f64,
    pub speed: f64,
    /// Vehicle type label; `None` samples the road composition.
    pub type_label: Option<String>,
}

/// A homogeneous initial density on a road.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InitialDensity {
    pub road_id: String,
    /// The lane to fill; `None` fills every lane.
    pub lane: Option<usize>,
    /// Vehicles per km and lane.
    pub density_per_km: f64,
    pub speed: f64,
}
