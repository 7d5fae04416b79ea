use crate::config::InflowPoint;
use crate::math::PiecewiseLinear;

/// A macroscopic inflow schedule: flow per lane and entry speed over time.
///
/// Values are interpolated piecewise-linearly and held constant outside the
/// schedule's time range.
#[derive(Clone, Debug, Default)]
pub struct InflowTimeSeries {
    flow: PiecewiseLinear,
    speed: PiecewiseLinear,
}

impl InflowTimeSeries {
    pub fn new(points: &[InflowPoint]) -> Self {
        Self {
            flow: PiecewiseLinear::new(points.iter().map(|p| (p.time, p.flow_per_hour / 3600.0))),
            speed: PiecewiseLinear::new(points.iter().map(|p| (p.time, p.speed))),
        }
    }

    /// The flow per lane at `time`, in vehicles per second.
    pub fn flow(&self, time: f64) -> f64 {
        f64::max(self.flow.clamped(time, 0.0), 0.0)
    }

    /// The entry speed at `time`, in m/s.
    pub fn speed(&self, time: f64) -> f64 {
        f64::max(self.speed.clamped(time, 0.0), 0.0)
    }
}
