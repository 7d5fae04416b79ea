use super::{speed_to_acc, FollowInput};
use crate::config::ModelSpec;

/// The Gipps model. The reaction time is the simulation time step.
#[derive(Clone, Debug, PartialEq)]
pub struct Gipps {
    pub v0: f64,
    pub a: f64,
    /// Deceleration assumed for both the vehicle and its leader, in m/s^2.
    pub b: f64,
    pub s0: f64,
}

impl Gipps {
    pub(crate) fn from_spec(spec: &ModelSpec) -> Self {
        Self {
            v0: spec.get("v0", 30.0),
            a: spec.get("a", 1.5),
            b: spec.get("b", 1.0),
            s0: spec.get("s0", 2.0),
        }
    }

    /// The highest speed after one reaction time from which the vehicle can still
    /// stop behind a leader braking at `b`.
    fn safe_speed(&self, input: &FollowInput, t: f64) -> f64 {
        let b = self.b;
        let vl = input.leader_speed;
        let s = input.gap - self.s0;
        let disc = b * b * t * t + vl * vl + 2.0 * b * s - b * input.speed * t;
        -b * t + f64::max(disc, 0.0).sqrt()
    }

    pub(crate) fn acceleration(&self, input: &FollowInput) -> f64 {
        let dt = input.dt;
        let t = dt * input.alpha_t;
        let v = input.speed;
        let v0 = input.desired_speed(self.v0);

        let ratio = f64::min(v / v0, 1.0);
        let v_free = v + 2.5 * self.a * t * (1.0 - ratio) * (0.025 + ratio).sqrt();
        let mut v_new = f64::min(v_free, v0);
        if input.has_leader() {
            v_new = f64::min(v_new, self.safe_speed(input, t));
        }
        speed_to_acc(v, v_new, dt)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stops_for_standing_leader() {
        let gipps = Gipps::from_spec(&ModelSpec::new("Gipps", []));
        let input = FollowInput::free(10.0, 0.5).behind(gipps.s0, 0.0, 0.0);
        let acc = gipps.acceleration(&input);
        // The safe speed at zero net distance is zero.
        assert!(10.0 + acc * 0.5 <= 1e-9);
    }
}
