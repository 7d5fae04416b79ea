use super::FollowInput;
use crate::config::ModelSpec;

/// The intelligent driver model.
#[derive(Clone, Debug, PartialEq)]
pub struct Idm {
    /// Desired speed in m/s.
    pub v0: f64,
    /// Desired time headway in s.
    pub t: f64,
    /// Minimum gap at standstill in m.
    pub s0: f64,
    /// Speed-dependent jam distance in m.
    pub s1: f64,
    /// Maximum acceleration in m/s^2.
    pub a: f64,
    /// Comfortable deceleration in m/s^2.
    pub b: f64,
    /// Acceleration exponent.
    pub delta: f64,
}

impl Default for Idm {
    fn default() -> Self {
        Self {
            v0: 33.3,
            t: 1.5,
            s0: 2.0,
            s1: 0.0,
            a: 1.0,
            b: 1.5,
            delta: 4.0,
        }
    }
}

impl Idm {
    pub(crate) fn from_spec(spec: &ModelSpec) -> Self {
        let d = Self::default();
        Self {
            v0: spec.get("v0", d.v0),
            t: spec.get("T", d.t),
            s0: spec.get("s0", d.s0),
            s1: spec.get("s1", d.s1),
            a: spec.get("a", d.a),
            b: spec.get("b", d.b),
            delta: spec.get("delta", d.delta),
        }
    }

    /// The desired dynamic gap `s*` for the given situation.
    pub fn desired_gap(&self, input: &FollowInput) -> f64 {
        let v = input.speed;
        let v0 = input.desired_speed(self.v0);
        let t = self.t * input.alpha_t;
        let interaction = v * t + v * input.approach_rate() / (2.0 * (self.a * self.b).sqrt());
        self.s0 + self.s1 * (v / v0).sqrt() + f64::max(interaction, 0.0)
    }

    /// The free-road acceleration term.
    pub(crate) fn free_acceleration(&self, input: &FollowInput) -> f64 {
        let v0 = input.desired_speed(self.v0);
        self.a * (1.0 - (input.speed / v0).powf(self.delta))
    }

    pub(crate) fn acceleration(&self, input: &FollowInput) -> f64 {
        let free = self.free_acceleration(input);
        if !input.has_leader() {
            return free;
        }
        let term = self.desired_gap(input) / input.safe_gap();
        free - self.a * term * term
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn idm() -> Idm {
        Idm {
            v0: 30.0,
            t: 1.5,
            s0: 2.0,
            a: 1.0,
            b: 1.5,
            ..Default::default()
        }
    }

    #[test]
    fn free_road_acceleration() {
        let idm = idm();
        assert_approx_eq!(idm.acceleration(&FollowInput::free(0.0, 0.1)), 1.0);
        assert_approx_eq!(idm.acceleration(&FollowInput::free(30.0, 0.1)), 0.0);
        assert!(idm.acceleration(&FollowInput::free(40.0, 0.1)) < 0.0);
    }

    #[test]
    fn equilibrium_at_desired_gap() {
        let idm = idm();
        let input = FollowInput::free(0.0, 0.1).behind(idm.s0, 0.0, 0.0);
        assert_approx_eq!(idm.acceleration(&input), 0.0);

        let input = FollowInput::free(0.0, 0.1).behind(idm.s0 + 1e-6, 0.0, 0.0);
        assert!(idm.acceleration(&input).abs() < 1e-5);
    }

    #[test]
    fn bounded_for_all_inputs() {
        let model = crate::model::LongitudinalModel::Idm(idm());
        let mut rng = crate::SimRng::with_seed(0);
        for speed in [0.0, 5.0, 15.0, 30.0, 45.0] {
            for gap in [0.0, 0.5, 2.0, 10.0, 50.0, 500.0] {
                for leader_speed in [0.0, 10.0, 30.0] {
                    let input = FollowInput::free(speed, 0.1).behind(gap, leader_speed, 0.0);
                    let acc = model.acceleration(&input, &mut rng);
                    assert!(acc.is_finite());
                    assert!(acc <= 1.0 + 1e-12);
                    assert!(acc >= -input.max_deceleration);
                }
            }
        }
    }

    #[test]
    fn approach_to_standstill_brakes_beyond_comfort() {
        let idm = idm();
        let (mut pos, mut vel, mut hardest) = (0.0, 20.0, 0.0);
        for _ in 0..1500 {
            let input = FollowInput::free(vel, 0.2).behind(500.0 - pos, 0.0, 0.0);
            let acc = idm.acceleration(&input);
            hardest = f64::min(hardest, acc);
            if vel + acc * 0.2 < 0.0 {
                pos -= 0.5 * vel * vel / acc;
                vel = 0.0;
            } else {
                pos += vel * 0.2 + 0.5 * acc * 0.04;
                vel += acc * 0.2;
            }
            assert!(pos < 500.0);
        }
        // Capping at the comfortable deceleration would run into the obstacle.
        assert!(hardest < -idm.b);
        assert!(hardest > -2.0);
        assert_approx_eq!(pos, 500.0 - idm.s0, 0.05);
    }

    #[test]
    fn bottleneck_factors_scale_parameters() {
        let idm = idm();
        let base = FollowInput::free(20.0, 0.1).behind(40.0, 20.0, 0.0);
        let longer_headway = FollowInput { alpha_t: 1.5, ..base };
        assert!(idm.acceleration(&longer_headway) < idm.acceleration(&base));

        let slower = FollowInput::free(20.0, 0.1);
        let slower = FollowInput { alpha_v0: 0.5, ..slower };
        assert!(idm.acceleration(&slower) < 0.0);
    }
}
