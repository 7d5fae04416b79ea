#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Aggregated measurements of one lane, or of a whole cross-section, over a
/// sampling interval.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectorSample {
    /// The number of vehicles that crossed.
    pub count: u64,
    /// Flow in vehicles per hour.
    pub flow_per_hour: f64,
    /// Arithmetic mean speed in m/s; zero without vehicles.
    pub mean_speed: f64,
    /// Harmonic mean speed in m/s; zero without vehicles.
    pub harmonic_speed: f64,
    /// Fraction of the interval the cross-section was occupied.
    pub occupancy: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct Accumulator {
    count: u64,
    speed_sum: f64,
    inverse_speed_sum: f64,
    occupied: f64,
}

impl Accumulator {
    fn record(&mut self, speed: f64, length: f64) {
        let speed = f64::max(speed, 0.01);
        self.count += 1;
        self.speed_sum += speed;
        self.inverse_speed_sum += 1.0 / speed;
        self.occupied += length / speed;
    }

    fn merge(&mut self, other: &Accumulator) {
        self.count += other.count;
        self.speed_sum += other.speed_sum;
        self.inverse_speed_sum += other.inverse_speed_sum;
        self.occupied += other.occupied;
    }

    fn sample(&self, interval: f64, lanes: usize) -> DetectorSample {
        if self.count == 0 {
            return DetectorSample::default();
        }
        let n = self.count as f64;
        DetectorSample {
            count: self.count,
            flow_per_hour: 3600.0 * n / interval,
            mean_speed: self.speed_sum / n,
            harmonic_speed: n / self.inverse_speed_sum,
            occupancy: f64::min(self.occupied / (interval * lanes as f64), 1.0),
        }
    }
}

/// A loop detector counting vehicles crossing a cross-section.
#[derive(Clone, Debug)]
pub struct LoopDetector {
    position: f64,
    interval: f64,
    next_sample: f64,
    lanes: Vec<Accumulator>,
    samples: Vec<DetectorSample>,
    total: DetectorSample,
}

impl LoopDetector {
    pub fn new(position: f64, interval: f64, lanes: usize) -> Self {
        Self {
            position,
            interval,
            next_sample: interval,
            lanes: vec![Accumulator::default(); lanes],
            samples: vec![DetectorSample::default(); lanes],
            total: DetectorSample::default(),
        }
    }

    /// The cross-section position in m.
    pub fn position(&self) -> f64 {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: f64) {
        self.position = position;
    }

    /// The aggregation interval in s.
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Records a vehicle crossing in the given lane.
    pub(crate) fn record(&mut self, lane: usize, speed: f64, length: f64) {
        if let Some(acc) = self.lanes.get_mut(lane) {
            acc.record(speed, length);
        }
    }

    /// Whether a vehicle moving from `prev` to `pos` crossed the cross-section.
    pub(crate) fn crossed(&self, prev: f64, pos: f64) -> bool {
        prev < self.position && pos >= self.position
    }

    /// Closes the sampling interval once `time` reaches its end.
    pub(crate) fn update(&mut self, time: f64) {
        if time + 1e-9 < self.next_sample {
            return;
        }
        self.next_sample += self.interval;
        let mut all = Accumulator::default();
        for (acc, sample) in self.lanes.iter_mut().zip(self.samples.iter_mut()) {
            *sample = acc.sample(self.interval, 1);
            all.merge(acc);
            *acc = Accumulator::default();
        }
        self.total = all.sample(self.interval, self.lanes.len());
        log::debug!(
            "detector at {:.1} m: {} vehicles, {:.0} veh/h",
            self.position,
            self.total.count,
            self.total.flow_per_hour
        );
    }

    /// The last completed sample of a lane.
    pub fn lane_sample(&self, lane: usize) -> Option<&DetectorSample> {
        self.samples.get(lane)
    }

    /// The last completed sample over all lanes.
    pub fn last_sample(&self) -> &DetectorSample {
        &self.total
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.position, self.interval, self.lanes.len());
    }
}
