//! The MOBIL lane-changing decision.
//!
//! The network gathers the hypothetical accelerations of everyone affected by a
//! change; this module weighs them.

use crate::config::LaneChangeConfig;

/// The incentive added towards a lane a diverted driver must reach, in m/s^2.
pub const MANDATORY_INCENTIVE: f64 = 10.0;

/// The direction of a lane change. Lane 0 is the leftmost lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaneDirection {
    Left,
    Right,
}

impl LaneDirection {
    /// The direction from lane `from` to the adjacent lane `to`.
    pub fn between(from: usize, to: usize) -> Self {
        if to > from {
            Self::Right
        } else {
            Self::Left
        }
    }
}

/// Accelerations before and after a prospective lane change.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LaneChangeAccelerations {
    /// The changing vehicle in its current lane.
    pub own_before: f64,
    /// The changing vehicle in the target lane.
    pub own_after: f64,
    /// The follower in the target lane, before and after.
    pub new_follower: Option<(f64, f64)>,
    /// The follower in the current lane, before and after.
    pub old_follower: Option<(f64, f64)>,
}

/// Whether the target lane admits the vehicle at all.
pub fn is_safe(
    params: &LaneChangeConfig,
    front_gap: f64,
    back_gap: f64,
    new_follower_acc: Option<f64>,
) -> bool {
    front_gap >= params.min_gap
        && back_gap >= params.min_gap
        && new_follower_acc.map_or(true, |acc| acc >= -params.safe_deceleration)
}

/// The MOBIL incentive for a safe change.
///
/// `mandatory` is `Some(true)` when the change moves a diverted driver towards the
/// lane it must reach and `Some(false)` when it moves away from it.
pub fn incentive(
    params: &LaneChangeConfig,
    accs: &LaneChangeAccelerations,
    direction: LaneDirection,
    mandatory: Option<bool>,
) -> f64 {
    let delta = |pair: Option<(f64, f64)>| pair.map_or(0.0, |(before, after)| after - before);
    let own = accs.own_after - accs.own_before;
    let others = delta(accs.new_follower) + delta(accs.old_follower);
    let bias = match direction {
        LaneDirection::Right => params.bias_right,
        LaneDirection::Left => -params.bias_right,
    };
    let forced = match mandatory {
        Some(true) => MANDATORY_INCENTIVE,
        Some(false) => -MANDATORY_INCENTIVE,
        None => 0.0,
    };
    own + params.politeness * others + bias + forced
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn weighs_others_by_politeness() {
        let params = LaneChangeConfig {
            politeness: 0.5,
            bias_right: 0.0,
            ..Default::default()
        };
        let accs = LaneChangeAccelerations {
            own_before: -1.0,
            own_after: 1.0,
            new_follower: Some((0.5, -0.5)),
            old_follower: Some((-2.0, 0.0)),
        };
        let value = incentive(&params, &accs, LaneDirection::Left, None);
        assert_approx_eq!(value, 2.0 + 0.5 * (-1.0 + 2.0));
    }

    #[test]
    fn keep_right_bias() {
        let params = LaneChangeConfig::default();
        let accs = LaneChangeAccelerations::default();
        let right = incentive(&params, &accs, LaneDirection::Right, None);
        let left = incentive(&params, &accs, LaneDirection::Left, None);
        assert!(right > params.threshold - 1.0);
        assert!(right > left);
    }

    #[test]
    fn rejects_hard_braking_follower() {
        let params = LaneChangeConfig::default();
        assert!(is_safe(&params, 10.0, 10.0, Some(-1.0)));
        assert!(!is_safe(&params, 10.0, 10.0, Some(-5.0)));
        assert!(!is_safe(&params, 1.0, 10.0, None));
        assert!(!is_safe(&params, 10.0, 1.0, None));
    }

    #[test]
    fn direction_between_lanes() {
        assert_eq!(LaneDirection::between(0, 1), LaneDirection::Right);
        assert_eq!(LaneDirection::between(2, 1), LaneDirection::Left);
    }
}
