use super::{speed_to_acc, FollowInput};
use crate::config::ModelSpec;
use crate::rng::SimRng;

/// The Kerner-Klenov-Wolf cellular automaton model of three-phase traffic theory,
/// in continuous space.
///
/// Inside the synchronization gap `D = s0 + k * v * dt` a vehicle adapts its speed
/// to its leader instead of accelerating freely.
#[derive(Clone, Debug, PartialEq)]
pub struct Kca {
    pub v0: f64,
    pub a: f64,
    pub s0: f64,
    /// Synchronization gap factor.
    pub k: f64,
    /// Random deceleration probability when standing.
    pub pb0: f64,
    /// Random deceleration probability when moving.
    pub pb1: f64,
    /// Random acceleration probability below `vp`.
    pub pa1: f64,
    /// Random acceleration probability at or above `vp`.
    pub pa2: f64,
    /// Speed separating the random acceleration regimes in m/s.
    pub vp: f64,
}

impl Kca {
    pub(crate) fn from_spec(spec: &ModelSpec) -> Self {
        Self {
            v0: spec.get("v0", 30.0),
            a: spec.get("a", 0.5),
            s0: spec.get("s0", 7.5),
            k: spec.get("k", 2.55),
            pb0: spec.get("pb0", 0.425),
            pb1: spec.get("pb1", 0.04),
            pa1: spec.get("pa1", 0.2),
            pa2: spec.get("pa2", 0.052),
            vp: spec.get("vp", 14.0),
        }
    }

    /// The synchronization gap for the given speed.
    pub fn synchronization_gap(&self, speed: f64, dt: f64) -> f64 {
        self.s0 + self.k * speed * dt
    }

    /// Draws exactly one random number per call.
    pub(crate) fn acceleration(&self, input: &FollowInput, rng: &mut SimRng) -> f64 {
        let dt = input.dt;
        let v = input.speed;
        let step = self.a * dt;
        let v0 = input.desired_speed(self.v0);

        let (v_adapted, v_safe) = if input.has_leader() {
            let free = input.gap > self.synchronization_gap(v, dt * input.alpha_t);
            let adapted = if free {
                v + step
            } else {
                v + step * (input.leader_speed - v).signum()
            };
            let safe = f64::max(input.gap - self.s0, 0.0) / dt + input.leader_speed;
            (adapted, safe)
        } else {
            (v + step, f64::INFINITY)
        };
        let v_tilde = v_adapted.min(v0).min(v_safe);

        let pb = if v < 0.01 { self.pb0 } else { self.pb1 };
        let pa = if v < self.vp { self.pa1 } else { self.pa2 };
        let r = rng.uniform();
        let eta = if r < pb {
            -1.0
        } else if r < pb + pa {
            1.0
        } else {
            0.0
        };

        let v_new = (v_tilde + step * eta).min(v + step).min(v0).min(v_safe);
        speed_to_acc(v, v_new, dt)
    }
}
