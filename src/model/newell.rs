use super::{speed_to_acc, FollowInput};
use crate::config::ModelSpec;

/// Newell's simplified car-following model.
///
/// A vehicle repeats its leader's trajectory shifted by the time lag `dt` and the
/// space offset `s0`: it drives at the speed that closes the gap down to `s0`
/// within one time step, capped at its desired speed.
#[derive(Clone, Debug, PartialEq)]
pub struct Newell {
    pub v0: f64,
    pub s0: f64,
}

impl Newell {
    pub(crate) fn from_spec(spec: &ModelSpec) -> Self {
        Self {
            v0: spec.get("v0", 30.0),
            s0: spec.get("s0", 2.0),
        }
    }

    pub(crate) fn acceleration(&self, input: &FollowInput) -> f64 {
        let lag = input.dt * input.alpha_t;
        let v0 = input.desired_speed(self.v0);
        let v_new = if input.has_leader() {
            f64::min(v0, (input.gap - self.s0) / lag)
        } else {
            v0
        };
        speed_to_acc(input.speed, v_new, input.dt)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn closes_gap_in_one_step() {
        let newell = Newell::from_spec(&ModelSpec::new("Newell", []));
        let input = FollowInput::free(5.0, 1.0).behind(12.0, 5.0, 0.0);
        // Wants 10 m/s so that the gap shrinks to s0 after one step.
        assert_approx_eq!(newell.acceleration(&input), 5.0);
    }
}
