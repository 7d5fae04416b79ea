use super::InsertContext;
use crate::config::{InfeasiblePolicy, MicroInflowRecord};
use crate::error::ConfigError;
use crate::segment::Lane;
use crate::vehicle::VehicleFactory;

/// A resolved microscopic arrival.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MicroArrival {
    pub time: f64,
    pub lane: usize,
    /// The vehicle type; `None` draws from the road composition.
    pub type_index: Option<usize>,
    pub speed: f64,
}

/// Inserts explicit vehicles at their arrival times.
#[derive(Clone, Debug)]
pub struct MicroSource {
    arrivals: Vec<MicroArrival>,
    next: usize,
    policy: InfeasiblePolicy,
    inserted: u64,
    dropped: u64,
}

impl MicroSource {
    /// Resolves the arrival records of a road with `lanes` lanes.
    pub fn new(
        records: &[MicroInflowRecord],
        policy: InfeasiblePolicy,
        road_id: &str,
        lanes: usize,
        factory: &VehicleFactory,
    ) -> Result<Self, ConfigError> {
        let mut arrivals = records
            .iter()
            .map(|record| {
                if record.lane >= lanes {
                    return Err(ConfigError::InvalidLane {
                        road: road_id.into(),
                        lane: record.lane,
                        lanes,
                    });
                }
                let type_index = match &record.type_label {
                    Some(label) => Some(factory.index_of(label)?),
                    None => None,
                };
                Ok(MicroArrival {
                    time: record.time,
                    lane: record.lane,
                    type_index,
                    speed: record.speed,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        arrivals.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(Self {
            arrivals,
            next: 0,
            policy,
            inserted: 0,
            dropped: 0,
        })
    }

    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    /// The number of arrivals dropped as infeasible.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Whether any arrivals have yet to be consumed.
    pub fn is_pending(&self) -> bool {
        self.next < self.arrivals.len()
    }

    pub(crate) fn needs_composition(&self) -> bool {
        self.arrivals.iter().any(|a| a.type_index.is_none())
    }

    pub(crate) fn time_step(&mut self, lanes: &mut [Lane], ctx: &mut InsertContext) {
        while let Some(arrival) = self.arrivals.get(self.next).copied() {
            if arrival.time > ctx.time {
                break;
            }
            let type_index = match arrival.type_index.or_else(|| ctx.sample_type()) {
                Some(type_index) => type_index,
                None => break,
            };
            let (gap, _) = ctx.entry_gap(&lanes[arrival.lane]);
            if gap < 0.0 {
                match self.policy {
                    InfeasiblePolicy::Defer => break,
                    InfeasiblePolicy::Drop => {
                        log::warn!(
                            "dropped arrival at t={:.1}s on road {} lane {}: entry blocked",
                            arrival.time,
                            ctx.road_id,
                            arrival.lane
                        );
                        self.dropped += 1;
                        self.next += 1;
                        continue;
                    }
                }
            }
            ctx.spawn(lanes, arrival.lane, type_index, 0.0, arrival.speed);
            self.inserted += 1;
            self.next += 1;
        }
    }

    pub(crate) fn reset(&mut self) {
        self.next = 0;
        self.inserted = 0;
        self.dropped = 0;
    }
}
