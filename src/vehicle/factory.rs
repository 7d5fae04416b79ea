use super::{Vehicle, VehicleKind};
use crate::config::{LaneChangeConfig, MemoryConfig, NoiseConfig, VehicleTypeConfig};
use crate::error::ConfigError;
use crate::model::LongitudinalModel;
use crate::rng::SimRng;
use crate::VehicleId;
use rand_distr::{Distribution, Normal};
use std::collections::HashMap;

/// The lower and upper bound of a sampled desired speed factor.
const SPEED_FACTOR_RANGE: (f64, f64) = (0.75, 1.25);

/// A resolved vehicle type.
#[derive(Clone, Debug)]
pub struct VehicleType {
    pub label: String,
    pub kind: VehicleKind,
    pub length: f64,
    pub max_deceleration: f64,
    pub model: LongitudinalModel,
    pub lane_change: Option<LaneChangeConfig>,
    pub noise: Option<NoiseConfig>,
    pub memory: Option<MemoryConfig>,
    speed_factor: Option<Normal<f64>>,
}

impl VehicleType {
    /// Resolves a vehicle type record, validating its values.
    pub fn from_config(config: &VehicleTypeConfig) -> Result<Self, ConfigError> {
        if !(config.length >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "vehicle type {} has length {}",
                config.label, config.length
            )));
        }
        if !(config.max_deceleration > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "vehicle type {} has maximum deceleration {}",
                config.label, config.max_deceleration
            )));
        }
        let speed_factor = match config.speed_factor_stddev {
            Some(stddev) if stddev > 0.0 => Some(Normal::new(1.0, stddev).map_err(|err| {
                ConfigError::Invalid(format!("vehicle type {}: {}", config.label, err))
            })?),
            _ => None,
        };
        Ok(Self {
            label: config.label.clone(),
            kind: if config.obstacle {
                VehicleKind::Obstacle
            } else {
                VehicleKind::Normal
            },
            length: config.length,
            max_deceleration: config.max_deceleration,
            model: LongitudinalModel::from_spec(&config.model)?,
            lane_change: if config.obstacle {
                None
            } else {
                config.lane_change
            },
            noise: config.noise,
            memory: config.memory,
            speed_factor,
        })
    }

    /// Samples an individual desired speed factor. Draws one number from the
    /// random source only if the type has a speed spread.
    fn sample_speed_factor(&self, rng: &mut SimRng) -> f64 {
        match &self.speed_factor {
            Some(dist) => {
                let (min, max) = SPEED_FACTOR_RANGE;
                dist.sample(rng.inner()).clamp(min, max)
            }
            None => 1.0,
        }
    }
}

/// Creates vehicles from the configured vehicle types.
#[derive(Clone, Debug, Default)]
pub struct VehicleFactory {
    types: Vec<VehicleType>,
    by_label: HashMap<String, usize>,
}

impl VehicleFactory {
    pub fn new(configs: &[VehicleTypeConfig]) -> Result<Self, ConfigError> {
        let mut factory = Self::default();
        for config in configs {
            if factory.by_label.contains_key(&config.label) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate vehicle type {}",
                    config.label
                )));
            }
            factory
                .by_label
                .insert(config.label.clone(), factory.types.len());
            factory.types.push(VehicleType::from_config(config)?);
        }
        Ok(factory)
    }

    /// Looks up a vehicle type by label.
    pub fn index_of(&self, label: &str) -> Result<usize, ConfigError> {
        self.by_label
            .get(label)
            .copied()
            .ok_or_else(|| ConfigError::UnknownVehicleType(label.into()))
    }

    /// Gets a vehicle type by index.
    pub fn get(&self, index: usize) -> &VehicleType {
        &self.types[index]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Creates a vehicle of the given type, sampling its speed factor.
    pub(crate) fn create(
        &self,
        id: VehicleId,
        number: u64,
        type_index: usize,
        time: f64,
        rng: &mut SimRng,
    ) -> Vehicle {
        let vtype = &self.types[type_index];
        let factor = vtype.sample_speed_factor(rng);
        Vehicle::new(id, number, type_index, vtype, factor, time)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::ModelSpec;
    use slotmap::SlotMap;

    fn car(stddev: Option<f64>) -> VehicleTypeConfig {
        VehicleTypeConfig {
            label: "car".into(),
            length: 5.0,
            max_deceleration: 9.0,
            obstacle: false,
            model: ModelSpec::new("IDM", []),
            lane_change: Some(Default::default()),
            noise: None,
            memory: None,
            speed_factor_stddev: stddev,
        }
    }

    #[test]
    fn speed_factor_is_clamped() {
        let factory = VehicleFactory::new(&[car(Some(5.0))]).unwrap();
        let mut rng = SimRng::with_seed(8);
        let mut ids = SlotMap::<VehicleId, ()>::with_key();
        for n in 0..200 {
            let veh = factory.create(ids.insert(()), n, 0, 0.0, &mut rng);
            assert!(veh.speed_factor() >= 0.75 && veh.speed_factor() <= 1.25);
        }
    }

    #[test]
    fn obstacles_do_not_change_lanes() {
        let mut config = VehicleTypeConfig::obstacle("block", 0.0);
        config.lane_change = Some(Default::default());
        let factory = VehicleFactory::new(&[car(None), config]).unwrap();
        assert_eq!(factory.index_of("block"), Ok(1));
        assert!(factory.get(1).lane_change.is_none());
        assert_eq!(factory.get(1).kind, VehicleKind::Obstacle);
    }

    #[test]
    fn rejects_bad_types() {
        assert_eq!(
            VehicleFactory::new(&[car(None), car(None)]).unwrap_err(),
            ConfigError::Invalid("duplicate vehicle type car".into())
        );
        let mut unknown = car(None);
        unknown.model = ModelSpec::new("Wiedemann", []);
        assert_eq!(
            VehicleFactory::new(&[unknown]).unwrap_err(),
            ConfigError::UnknownModel("Wiedemann".into())
        );
        assert_eq!(
            VehicleFactory::new(&[]).unwrap().index_of("truck"),
            Err(ConfigError::UnknownVehicleType("truck".into()))
        );
    }
}
