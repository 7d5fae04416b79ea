use crate::config::SinkConfig;
use crate::vehicle::Vehicle;

/// Removes vehicles leaving a segment through a lane without successor.
#[derive(Clone, Debug, Default)]
pub struct Sink {
    config: SinkConfig,
    removed: u64,
    travel_time: f64,
}

impl Sink {
    pub fn new(config: SinkConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// The number of vehicles removed so far.
    pub fn removed(&self) -> u64 {
        self.removed
    }

    /// The summed travel time of the removed vehicles, in s.
    pub fn total_travel_time(&self) -> f64 {
        self.travel_time
    }

    /// The mean travel time of the removed vehicles, in s.
    pub fn mean_travel_time(&self) -> Option<f64> {
        (self.removed > 0).then(|| self.travel_time / self.removed as f64)
    }

    pub(crate) fn record(&mut self, vehicle: &Vehicle, road_id: &str, time: f64) {
        self.removed += 1;
        self.travel_time += time - vehicle.entry_time();
        if self.config.logging {
            log::info!(
                "vehicle {} left road {} at t={:.1}s with {:.1} m/s",
                vehicle.number(),
                road_id,
                time,
                vehicle.vel()
            );
        }
    }

    pub(crate) fn reset(&mut self) {
        self.removed = 0;
        self.travel_time = 0.0;
    }
}
