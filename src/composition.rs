use crate::config::CompositionEntry;
use crate::error::ConfigError;
use crate::rng::SimRng;
use crate::vehicle::VehicleFactory;
use rand::distributions::{Distribution, WeightedIndex};

/// A weighted mix of vehicle types that new vehicles are drawn from.
#[derive(Clone, Debug)]
pub struct TrafficComposition {
    types: Vec<usize>,
    weights: WeightedIndex<f64>,
}

impl TrafficComposition {
    /// Resolves a composition against the vehicle types of `factory`.
    pub fn new(entries: &[CompositionEntry], factory: &VehicleFactory) -> Result<Self, ConfigError> {
        let types = entries
            .iter()
            .map(|entry| factory.index_of(&entry.label))
            .collect::<Result<Vec<_>, _>>()?;
        let weights = WeightedIndex::new(entries.iter().map(|entry| entry.fraction))
            .map_err(|err| ConfigError::Invalid(format!("traffic composition: {}", err)))?;
        Ok(Self { types, weights })
    }

    /// Draws a vehicle type index. Draws one number from the random source.
    pub fn sample(&self, rng: &mut SimRng) -> usize {
        self.types[self.weights.sample(rng.inner())]
    }

    /// The vehicle type indices the composition draws from.
    pub fn types(&self) -> &[usize] {
        &self.types
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{ModelSpec, VehicleTypeConfig};

    fn factory() -> VehicleFactory {
        let mut car = VehicleTypeConfig::obstacle("car", 5.0);
        car.obstacle = false;
        car.model = ModelSpec::new("IDM", []);
        let mut truck = car.clone();
        truck.label = "truck".into();
        truck.length = 12.0;
        VehicleFactory::new(&[car, truck]).unwrap()
    }

    #[test]
    fn follows_fractions() {
        let factory = factory();
        let composition = TrafficComposition::new(
            &[CompositionEntry::new("car", 0.8), CompositionEntry::new("truck", 0.2)],
            &factory,
        )
        .unwrap();
        let mut rng = SimRng::with_seed(1);
        let trucks = (0..10_000)
            .filter(|_| composition.sample(&mut rng) == 1)
            .count();
        assert!((1700..2300).contains(&trucks), "{} trucks", trucks);
    }

    #[test]
    fn rejects_unknown_labels_and_zero_weights() {
        let factory = factory();
        assert_eq!(
            TrafficComposition::new(&[CompositionEntry::new("bus", 1.0)], &factory).unwrap_err(),
            ConfigError::UnknownVehicleType("bus".into())
        );
        assert!(TrafficComposition::new(&[CompositionEntry::new("car", 0.0)], &factory).is_err());
        assert!(TrafficComposition::new(&[], &factory).is_err());
    }
}
