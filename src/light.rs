use crate::SegmentId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The state of a traffic light.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LightStatus {
    Green,
    /// Amber after green; vehicles stop if they still can.
    GreenRed,
    Red,
    /// Red and amber before green; vehicles still stop.
    RedGreen,
}

impl LightStatus {
    /// The status that follows in the standard cycle.
    pub fn next(self) -> Self {
        use LightStatus::*;
        match self {
            Green => GreenRed,
            GreenRed => Red,
            Red => RedGreen,
            RedGreen => Green,
        }
    }

    /// Whether vehicles must stop unconditionally.
    pub fn requires_stop(self) -> bool {
        matches!(self, LightStatus::Red | LightStatus::RedGreen)
    }
}

/// A traffic light at a stop line on a road segment.
#[derive(Clone, Debug)]
pub struct TrafficLight {
    /// The identifier used by regulators.
    signal_id: String,
    segment: SegmentId,
    /// The stop line position in m.
    position: f64,
    /// The current status; `None` until a regulator initialises the light.
    status: Option<LightStatus>,
    /// The time since the current status was entered, in s.
    since: f64,
}

impl TrafficLight {
    pub(crate) fn new(signal_id: &str, segment: SegmentId, position: f64) -> Self {
        Self {
            signal_id: signal_id.into(),
            segment,
            position,
            status: None,
            since: 0.0,
        }
    }

    pub fn signal_id(&self) -> &str {
        &self.signal_id
    }

    /// The segment the light stands on.
    pub fn segment_id(&self) -> SegmentId {
        self.segment
    }

    /// The stop line position in m.
    pub fn position(&self) -> f64 {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: f64) {
        self.position = position;
    }

    pub fn status(&self) -> Option<LightStatus> {
        self.status
    }

    /// The time spent in the current status, in s.
    pub fn time_in_status(&self) -> f64 {
        self.since
    }

    /// Switches the light. Setting the current status again keeps its timer.
    pub(crate) fn set_status(&mut self, status: LightStatus) {
        if self.status != Some(status) {
            self.status = Some(status);
            self.since = 0.0;
        }
    }

    /// Forgets the status, as before the first regulator event.
    pub(crate) fn reset(&mut self) {
        self.status = None;
        self.since = 0.0;
    }

    /// Advances the light's timer by `dt` seconds.
    pub(crate) fn step(&mut self, dt: f64) {
        if self.status.is_some() {
            self.since += dt;
        }
    }

    /// Whether a vehicle `distance` metres before the stop line at speed `vel`
    /// has to stop, given its maximum deceleration.
    pub fn must_stop(&self, distance: f64, vel: f64, max_decel: f64) -> bool {
        match self.status {
            Some(LightStatus::GreenRed) => {
                let needed = if distance > 0.0 {
                    0.5 * vel * vel / distance
                } else {
                    f64::INFINITY
                };
                needed <= max_decel
            }
            Some(status) => status.requires_stop(),
            None => false,
        }
    }
}
