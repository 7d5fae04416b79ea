use crate::config::MemoryConfig;

/// Lagged estimates of the leader's gap and speed.
///
/// Each estimate relaxes towards the observed value with time constant `tau`.
/// Losing sight of the leader resets the memory.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Memory {
    tau: f64,
    estimate: Option<(f64, f64)>,
}

impl Memory {
    pub fn new(params: MemoryConfig) -> Self {
        Self {
            tau: params.tau,
            estimate: None,
        }
    }

    /// The current `(gap, leader speed)` estimate.
    pub fn estimate(&self) -> Option<(f64, f64)> {
        self.estimate
    }

    /// Updates the estimates with an observation and returns them.
    pub(crate) fn perceive(&mut self, gap: f64, leader_speed: f64, dt: f64) -> (f64, f64) {
        if !gap.is_finite() {
            self.estimate = None;
            return (gap, leader_speed);
        }
        let weight = if self.tau > 0.0 {
            f64::min(dt / self.tau, 1.0)
        } else {
            1.0
        };
        let (est_gap, est_speed) = match self.estimate {
            Some((g, v)) => (g + weight * (gap - g), v + weight * (leader_speed - v)),
            None => (gap, leader_speed),
        };
        self.estimate = Some((est_gap, est_speed));
        (est_gap, est_speed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn relaxes_towards_observation() {
        let mut memory = Memory::new(MemoryConfig { tau: 1.0 });
        assert_eq!(memory.perceive(50.0, 10.0, 0.25), (50.0, 10.0));
        let (gap, speed) = memory.perceive(30.0, 6.0, 0.25);
        assert_approx_eq!(gap, 45.0);
        assert_approx_eq!(speed, 9.0);
    }

    #[test]
    fn resets_without_leader() {
        let mut memory = Memory::new(MemoryConfig { tau: 1.0 });
        memory.perceive(50.0, 10.0, 0.25);
        memory.perceive(f64::INFINITY, 0.0, 0.25);
        assert_eq!(memory.estimate(), None);
    }
}
