//! The longitudinal (car-following) model family.
//!
//! Every model maps the local traffic situation of a vehicle, captured by a
//! [FollowInput], to an acceleration. Models are resolved by name once at
//! configuration time into the closed [LongitudinalModel] enum.

use crate::config::ModelSpec;
use crate::error::ConfigError;
use crate::rng::SimRng;

pub use acc::Acc;
pub use gipps::Gipps;
pub use idm::Idm;
pub use kca::Kca;
pub use newell::Newell;
pub use nsm::Nsm;
pub use ovm::{OptimalVelocity, OvmVariant};

mod acc;
mod gipps;
mod idm;
mod kca;
mod newell;
mod nsm;
mod ovm;

/// The smallest net gap fed into a model, in m.
pub(crate) const MIN_GAP: f64 = 0.01;

/// The local traffic situation of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FollowInput {
    /// Own speed in m/s.
    pub speed: f64,
    /// Net gap to the leader in m; infinite without a leader.
    pub gap: f64,
    /// The leader's speed in m/s.
    pub leader_speed: f64,
    /// The leader's acceleration in m/s^2.
    pub leader_acc: f64,
    /// The simulation time step in s.
    pub dt: f64,
    /// Factor on the time headway (or reaction time) of the model.
    pub alpha_t: f64,
    /// Factor on the desired speed of the model.
    pub alpha_v0: f64,
    /// Local speed limit in m/s.
    pub speed_limit: f64,
    /// The vehicle's maximum deceleration, a positive number in m/s^2.
    pub max_deceleration: f64,
}

impl FollowInput {
    /// The situation of a vehicle on a free road.
    pub fn free(speed: f64, dt: f64) -> Self {
        Self {
            speed,
            gap: f64::INFINITY,
            leader_speed: speed,
            leader_acc: 0.0,
            dt,
            alpha_t: 1.0,
            alpha_v0: 1.0,
            speed_limit: f64::INFINITY,
            max_deceleration: 9.0,
        }
    }

    /// The same situation behind a leader.
    pub fn behind(self, gap: f64, leader_speed: f64, leader_acc: f64) -> Self {
        Self {
            gap,
            leader_speed,
            leader_acc,
            ..self
        }
    }

    /// Whether there is a leader in sight.
    pub fn has_leader(&self) -> bool {
        self.gap.is_finite()
    }

    /// The gap clamped away from zero.
    pub(crate) fn safe_gap(&self) -> f64 {
        f64::max(self.gap, MIN_GAP)
    }

    /// Own speed minus the leader's speed.
    pub(crate) fn approach_rate(&self) -> f64 {
        self.speed - self.leader_speed
    }

    /// The effective desired speed given a model's nominal one.
    pub(crate) fn desired_speed(&self, v0: f64) -> f64 {
        f64::max(f64::min(v0 * self.alpha_v0, self.speed_limit), 0.01)
    }
}

/// A longitudinal model with its parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum LongitudinalModel {
    Idm(Idm),
    Acc(Acc),
    Ovm(OptimalVelocity),
    Gipps(Gipps),
    Newell(Newell),
    Nsm(Nsm),
    Kca(Kca),
}

impl LongitudinalModel {
    /// Resolves a named model specification.
    pub fn from_spec(spec: &ModelSpec) -> Result<Self, ConfigError> {
        let model = match spec.name.to_ascii_uppercase().as_str() {
            "IDM" => Self::Idm(Idm::from_spec(spec)),
            "ACC" => Self::Acc(Acc::from_spec(spec)),
            "OVM" | "VDIFF" | "OVM_VDIFF" => Self::Ovm(OptimalVelocity::from_spec(spec)),
            "GIPPS" => Self::Gipps(Gipps::from_spec(spec)),
            "NEWELL" => Self::Newell(Newell::from_spec(spec)),
            "NSM" => Self::Nsm(Nsm::from_spec(spec)),
            "KCA" => Self::Kca(Kca::from_spec(spec)),
            _ => return Err(ConfigError::UnknownModel(spec.name.clone())),
        };
        Ok(model)
    }

    /// The canonical model name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idm(_) => "IDM",
            Self::Acc(_) => "ACC",
            Self::Ovm(_) => "OVM_VDIFF",
            Self::Gipps(_) => "GIPPS",
            Self::Newell(_) => "NEWELL",
            Self::Nsm(_) => "NSM",
            Self::Kca(_) => "KCA",
        }
    }

    /// The nominal desired speed in m/s.
    pub fn desired_speed(&self) -> f64 {
        match self {
            Self::Idm(m) => m.v0,
            Self::Acc(m) => m.idm.v0,
            Self::Ovm(m) => m.v0,
            Self::Gipps(m) => m.v0,
            Self::Newell(m) => m.v0,
            Self::Nsm(m) => m.v0,
            Self::Kca(m) => m.v0,
        }
    }

    /// Whether evaluating the model draws from the random source.
    pub fn is_stochastic(&self) -> bool {
        matches!(self, Self::Nsm(_) | Self::Kca(_))
    }

    /// Computes the acceleration for the given situation, bounded below by the
    /// vehicle's maximum deceleration.
    pub fn acceleration(&self, input: &FollowInput, rng: &mut SimRng) -> f64 {
        let acc = match self {
            Self::Idm(m) => m.acceleration(input),
            Self::Acc(m) => m.acceleration(input),
            Self::Ovm(m) => m.acceleration(input),
            Self::Gipps(m) => m.acceleration(input),
            Self::Newell(m) => m.acceleration(input),
            Self::Nsm(m) => m.acceleration(input, rng),
            Self::Kca(m) => m.acceleration(input, rng),
        };
        f64::max(acc, -input.max_deceleration)
    }
}

/// Converts the speed an iterated-map model wants after `dt` into an acceleration.
pub(crate) fn speed_to_acc(speed: f64, new_speed: f64, dt: f64) -> f64 {
    (f64::max(new_speed, 0.0) - speed) / dt
}
