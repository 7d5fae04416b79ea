//! Error types for scenario set-up and for running the simulation.

use thiserror::Error;

/// A fault in the scenario configuration or the road topology.
///
/// These are never recoverable: the simulation refuses to run on a configuration which
/// produced one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("longitudinal model \"{0}\" is not implemented")]
    UnknownModel(String),

    #[error("cannot find roadId=\"{0}\" in road network")]
    UnknownRoad(String),

    #[error("signal \"{0}\" is not attached to any road")]
    UnknownSignal(String),

    #[error("vehicle type \"{0}\" is not defined")]
    UnknownVehicleType(String),

    #[error("traffic light \"{signal}\" on road \"{road}\" has not been initialized by any regulator")]
    UninitializedLight { signal: String, road: String },

    #[error("road \"{road}\" has {lanes} lanes, lane {lane} does not exist")]
    InvalidLane {
        road: String,
        lane: usize,
        lanes: usize,
    },

    #[error("road \"{0}\" has successors on every lane and cannot have a traffic sink")]
    NoSink(String),

    #[error("road network failed to load")]
    NetworkLoad,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A fault raised while the simulation is running.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("crash of vehicle {vehicle} on road \"{road}\" lane {lane} at t={time:.2}s (gap={gap:.3}m)")]
    Crash {
        road: String,
        lane: usize,
        vehicle: u64,
        time: f64,
        gap: f64,
    },

    #[error("operation not allowed while the simulation is {0:?}")]
    InvalidState(crate::SimulationState),
}
