use crate::config::BottleneckPoint;
use crate::error::ConfigError;
use crate::math::PiecewiseLinear;

/// A flow-conserving bottleneck: position-dependent factors on the time headway
/// and the desired speed of the vehicles passing it.
#[derive(Clone, Debug)]
pub struct FlowConservingBottleneck {
    position: f64,
    alpha_t: PiecewiseLinear,
    alpha_v0: PiecewiseLinear,
}

impl FlowConservingBottleneck {
    /// Fails if two knots share a position.
    pub fn new(points: &[BottleneckPoint]) -> Result<Self, ConfigError> {
        let alpha_t = PiecewiseLinear::new(points.iter().map(|p| (p.position, p.alpha_t)));
        if !alpha_t.has_distinct_knots() {
            return Err(ConfigError::Invalid(format!(
                "bottleneck knots must have distinct positions, got {:?}",
                points.iter().map(|p| p.position).collect::<Vec<_>>()
            )));
        }
        Ok(Self {
            position: points
                .iter()
                .map(|p| p.position)
                .fold(f64::INFINITY, f64::min),
            alpha_t,
            alpha_v0: PiecewiseLinear::new(points.iter().map(|p| (p.position, p.alpha_v0))),
        })
    }

    /// The position of the first knot in m.
    pub fn position(&self) -> f64 {
        if self.position.is_finite() {
            self.position
        } else {
            0.0
        }
    }

    /// The time headway factor at `pos`, extrapolated linearly outside the knots.
    pub fn alpha_t(&self, pos: f64) -> f64 {
        self.alpha_t.extrapolate(pos, 1.0)
    }

    /// The desired speed factor at `pos`, extrapolated linearly outside the knots.
    pub fn alpha_v0(&self, pos: f64) -> f64 {
        self.alpha_v0.extrapolate(pos, 1.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn interpolates_factors() {
        let bottleneck = FlowConservingBottleneck::new(&[
            BottleneckPoint {
                position: 200.0,
                alpha_t: 1.0,
                alpha_v0: 1.0,
            },
            BottleneckPoint {
                position: 100.0,
                alpha_t: 1.0,
                alpha_v0: 1.0,
            },
            BottleneckPoint {
                position: 300.0,
                alpha_t: 1.5,
                alpha_v0: 0.6,
            },
        ])
        .unwrap();
        assert_approx_eq!(bottleneck.position(), 100.0);
        assert_approx_eq!(bottleneck.alpha_t(150.0), 1.0);
        assert_approx_eq!(bottleneck.alpha_t(250.0), 1.25);
        assert_approx_eq!(bottleneck.alpha_v0(250.0), 0.8);
    }

    #[test]
    fn rejects_repeated_position() {
        let knot = |position, alpha_t| BottleneckPoint {
            position,
            alpha_t,
            alpha_v0: 1.0,
        };
        let err = FlowConservingBottleneck::new(&[knot(100.0, 1.0), knot(200.0, 1.2), knot(100.0, 1.5)])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
