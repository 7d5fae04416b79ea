use super::{FollowInput, Idm};
use crate::config::ModelSpec;

/// The adaptive cruise control model: the IDM blended with the constant
/// acceleration heuristic (CAH), which anticipates the leader's acceleration.
#[derive(Clone, Debug, PartialEq)]
pub struct Acc {
    pub idm: Idm,
    /// Weight of the CAH in the blend, in `[0, 1]`.
    pub coolness: f64,
}

impl Acc {
    pub(crate) fn from_spec(spec: &ModelSpec) -> Self {
        Self {
            idm: Idm::from_spec(spec),
            coolness: spec.get("coolness", 0.99),
        }
    }

    /// The acceleration under the constant acceleration heuristic.
    fn cah(&self, input: &FollowInput) -> f64 {
        let v = input.speed;
        let vl = input.leader_speed;
        let s = input.safe_gap();
        let al = f64::min(input.leader_acc, self.idm.a);
        let dv = v - vl;

        let denom = vl * vl - 2.0 * s * al;
        if vl * dv <= -2.0 * s * al && denom > f64::EPSILON {
            v * v * al / denom
        } else {
            let dv_pos = f64::max(dv, 0.0);
            al - dv_pos * dv_pos / (2.0 * s)
        }
    }

    pub(crate) fn acceleration(&self, input: &FollowInput) -> f64 {
        let a_idm = self.idm.acceleration(input);
        if !input.has_leader() {
            return a_idm;
        }
        let a_cah = self.cah(input);
        if a_idm >= a_cah {
            return a_idm;
        }
        let b = self.idm.b;
        let c = self.coolness;
        (1.0 - c) * a_idm + c * (a_cah + b * ((a_idm - a_cah) / b).tanh())
    }
}
