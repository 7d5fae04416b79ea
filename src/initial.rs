//! Vehicles placed on the network before the first step.

use crate::config::{InitialConditions, InitialDensity, InitialVehicle};
use crate::error::ConfigError;
use crate::network::RoadNetwork;
use crate::rng::SimRng;
use crate::SegmentId;

/// Places every vehicle of the initial conditions.
pub(crate) fn apply(
    conditions: &InitialConditions,
    network: &mut RoadNetwork,
    rng: &mut SimRng,
) -> Result<(), ConfigError> {
    for record in &conditions.vehicles {
        place_vehicle(record, network, rng)?;
    }
    for record in &conditions.densities {
        fill_density(record, network, rng)?;
    }
    Ok(())
}

/// Resolves a type label, or draws from the road's composition without one.
fn vehicle_type(
    label: Option<&str>,
    segment: SegmentId,
    network: &RoadNetwork,
    rng: &mut SimRng,
) -> Result<usize, ConfigError> {
    if let Some(label) = label {
        return network.factory().index_of(label);
    }
    let seg = network.segment(segment);
    seg.composition()
        .or_else(|| network.composition())
        .map(|composition| composition.sample(rng))
        .ok_or_else(|| ConfigError::Invalid(format!("no traffic composition for road {}", seg.road_id())))
}

fn place_vehicle(
    record: &InitialVehicle,
    network: &mut RoadNetwork,
    rng: &mut SimRng,
) -> Result<(), ConfigError> {
    let segment = network.find_by_road_id(&record.road_id)?;
    let type_index = vehicle_type(record.type_label.as_deref(), segment, network, rng)?;
    network.add_vehicle(segment, record.lane, record.position, record.speed, type_index, rng)?;
    Ok(())
}

/// Fills one or all lanes of a road with equally spaced vehicles, the first half
/// a spacing before the end of the road.
fn fill_density(
    record: &InitialDensity,
    network: &mut RoadNetwork,
    rng: &mut SimRng,
) -> Result<(), ConfigError> {
    let segment = network.find_by_road_id(&record.road_id)?;
    if !(record.density_per_km > 0.0) {
        return Err(ConfigError::Invalid(format!(
            "initial density {} on road {}",
            record.density_per_km, record.road_id
        )));
    }
    let spacing = 1000.0 / record.density_per_km;
    let (length, lane_count) = {
        let seg = network.segment(segment);
        (seg.length(), seg.lane_count())
    };
    let lanes = match record.lane {
        Some(lane) => lane..lane + 1,
        None => 0..lane_count,
    };
    for lane in lanes {
        let mut pos = length - 0.5 * spacing;
        while pos >= 0.0 {
            let type_index = vehicle_type(None, segment, network, rng)?;
            if network.factory().get(type_index).length >= spacing {
                return Err(ConfigError::Invalid(format!(
                    "initial density {} on road {} leaves no room between vehicles",
                    record.density_per_km, record.road_id
                )));
            }
            network.add_vehicle(segment, lane, pos, record.speed, type_index, rng)?;
            pos -= spacing;
        }
    }
    Ok(())
}
