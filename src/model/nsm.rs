use super::{speed_to_acc, FollowInput};
use crate::config::ModelSpec;
use crate::rng::SimRng;

/// The Nagel-Schreckenberg model in continuous space.
///
/// Speeds change in quanta of `a * dt`; after the deterministic rules a vehicle
/// randomly loses one quantum with probability `p_slowdown`, or `p_slow_to_start`
/// when standing.
#[derive(Clone, Debug, PartialEq)]
pub struct Nsm {
    pub v0: f64,
    pub a: f64,
    pub s0: f64,
    pub p_slowdown: f64,
    pub p_slow_to_start: f64,
}

impl Nsm {
    pub(crate) fn from_spec(spec: &ModelSpec) -> Self {
        let p_slowdown = spec.get("p_slowdown", 0.16);
        Self {
            v0: spec.get("v0", 30.0),
            a: spec.get("a", 1.5),
            s0: spec.get("s0", 0.0),
            p_slowdown,
            p_slow_to_start: spec.get("p_slow_to_start", p_slowdown),
        }
    }

    /// Draws exactly one random number per call.
    pub(crate) fn acceleration(&self, input: &FollowInput, rng: &mut SimRng) -> f64 {
        let dt = input.dt;
        let v = input.speed;
        let quantum = self.a * dt;

        let mut v_new = f64::min(v + quantum, input.desired_speed(self.v0));
        if input.has_leader() {
            v_new = f64::min(v_new, f64::max(input.gap - self.s0, 0.0) / dt);
        }

        let p = if v < 0.01 {
            self.p_slow_to_start
        } else {
            self.p_slowdown
        };
        if rng.chance(p) {
            v_new -= quantum;
        }
        speed_to_acc(v, v_new, dt)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn deterministic_limits() {
        let mut rng = SimRng::with_seed(5);
        let always = Nsm::from_spec(&ModelSpec::new("NSM", [("p_slowdown", 1.0)]));
        let never = Nsm::from_spec(&ModelSpec::new("NSM", [("p_slowdown", 0.0)]));
        let input = FollowInput::free(10.0, 1.0);
        assert_approx_eq!(never.acceleration(&input, &mut rng), 1.5);
        assert_approx_eq!(always.acceleration(&input, &mut rng), 0.0);
    }

    #[test]
    fn slowdowns_are_random_but_seeded() {
        let nsm = Nsm::from_spec(&ModelSpec::new("NSM", [("p_slowdown", 0.5)]));
        let input = FollowInput::free(10.0, 1.0);
        let run = |seed| {
            let mut rng = SimRng::with_seed(seed);
            (0..64)
                .map(|_| nsm.acceleration(&input, &mut rng))
                .collect::<Vec<_>>()
        };
        let accs = run(11);
        assert_eq!(accs, run(11));
        assert!(accs.iter().any(|a| *a > 1.0));
        assert!(accs.iter().any(|a| *a < 0.5));
    }
}
