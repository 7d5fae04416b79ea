use super::FollowInput;
use crate::config::ModelSpec;

/// The shape of the optimal velocity function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OvmVariant {
    /// The Bando et al. hyperbolic tangent.
    Tanh,
    /// A triangular fundamental diagram.
    Triangular,
}

/// The optimal velocity model, extended by a velocity difference term (VDIFF).
///
/// With `lambda = 0` this reduces to the plain OVM.
#[derive(Clone, Debug, PartialEq)]
pub struct OptimalVelocity {
    pub v0: f64,
    /// Speed relaxation time in s.
    pub tau: f64,
    pub s0: f64,
    /// Transition width of the tanh variant in m, or the time gap of the triangular one in s.
    pub transition_width: f64,
    /// Form factor of the tanh variant.
    pub beta: f64,
    /// Sensitivity to the speed difference in 1/s.
    pub lambda: f64,
    pub variant: OvmVariant,
}

impl OptimalVelocity {
    pub(crate) fn from_spec(spec: &ModelSpec) -> Self {
        let variant = if spec.get("variant", 0.0) >= 1.0 {
            OvmVariant::Triangular
        } else {
            OvmVariant::Tanh
        };
        Self {
            v0: spec.get("v0", 30.0),
            tau: spec.get("tau", 0.65),
            s0: spec.get("s0", 2.0),
            transition_width: spec.get("transition_width", 15.0),
            beta: spec.get("beta", 1.5),
            lambda: spec.get("lambda", 0.4),
            variant,
        }
    }

    /// The speed this model settles at for the given gap.
    pub fn optimal_speed(&self, input: &FollowInput) -> f64 {
        let v0 = input.desired_speed(self.v0);
        if !input.has_leader() {
            return v0;
        }
        let s = input.gap - self.s0;
        let width = self.transition_width * input.alpha_t;
        let v_opt = match self.variant {
            OvmVariant::Tanh => {
                v0 * ((s / width - self.beta).tanh() + self.beta.tanh()) / (1.0 + self.beta.tanh())
            }
            OvmVariant::Triangular => f64::min(v0, s / width),
        };
        f64::max(v_opt, 0.0)
    }

    pub(crate) fn acceleration(&self, input: &FollowInput) -> f64 {
        let relax = (self.optimal_speed(input) - input.speed) / self.tau;
        if input.has_leader() {
            relax - self.lambda * input.approach_rate()
        } else {
            relax
        }
    }
}
