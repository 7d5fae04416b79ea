//! Objects placed along a road segment.

pub use bottleneck::FlowConservingBottleneck;
pub use detector::{DetectorSample, LoopDetector};
pub use diversion::DiversionSign;
pub use speed_limit::SpeedLimit;

use crate::TrafficLightId;

mod bottleneck;
mod detector;
mod diversion;
mod speed_limit;

/// A position-anchored object attached to a segment.
#[derive(Clone, Debug)]
pub enum RoadObject {
    /// A traffic light, held by the network and referenced here.
    TrafficLight { id: TrafficLightId, position: f64 },
    Detector(LoopDetector),
    Bottleneck(FlowConservingBottleneck),
    SpeedLimit(SpeedLimit),
    Diversion(DiversionSign),
}

impl RoadObject {
    /// The position the object is anchored at, in m.
    pub fn position(&self) -> f64 {
        match self {
            RoadObject::TrafficLight { position, .. } => *position,
            RoadObject::Detector(det) => det.position(),
            RoadObject::Bottleneck(bn) => bn.position(),
            RoadObject::SpeedLimit(limit) => limit.position,
            RoadObject::Diversion(sign) => sign.position(),
        }
    }

    /// Fits the object onto a segment of the given length and lane count.
    pub(crate) fn finalize(&mut self, length: f64, lanes: usize) {
        match self {
            RoadObject::TrafficLight { position, .. } => *position = position.clamp(0.0, length),
            RoadObject::Detector(det) => det.set_position(det.position().clamp(0.0, length)),
            RoadObject::Bottleneck(_) => {}
            RoadObject::SpeedLimit(limit) => limit.position = limit.position.clamp(0.0, length),
            RoadObject::Diversion(sign) => sign.finalize(length, lanes),
        }
    }
}
