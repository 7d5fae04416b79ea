use crate::config::NoiseConfig;
use crate::rng::SimRng;

/// A bounded, time-correlated acceleration fluctuation.
///
/// The process relaxes towards zero with the configured relaxation time and is
/// driven by uniform increments scaled so the stationary spread equals `strength`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Noise {
    params: NoiseConfig,
    value: f64,
}

impl Noise {
    pub fn new(params: NoiseConfig) -> Self {
        Self { params, value: 0.0 }
    }

    /// The current fluctuation in m/s^2.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// The largest magnitude the fluctuation can take.
    pub fn bound(&self) -> f64 {
        self.params.strength * 3f64.sqrt()
    }

    /// Advances the process by `dt`, drawing exactly one random number.
    pub(crate) fn advance(&mut self, dt: f64, rng: &mut SimRng) -> f64 {
        let tau = f64::max(self.params.relaxation_time, dt);
        let decay = (-dt / tau).exp();
        let drive = (1.0 - decay * decay).sqrt() * self.bound() * (2.0 * rng.uniform() - 1.0);
        let bound = self.bound();
        self.value = (self.value * decay + drive).clamp(-bound, bound);
        self.value
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stays_bounded() {
        let mut noise = Noise::new(NoiseConfig {
            strength: 0.5,
            relaxation_time: 2.0,
        });
        let mut rng = SimRng::with_seed(4);
        for _ in 0..1000 {
            let value = noise.advance(0.2, &mut rng);
            assert!(value.abs() <= noise.bound());
        }
    }

    #[test]
    fn zero_strength_is_silent() {
        let mut noise = Noise::new(NoiseConfig {
            strength: 0.0,
            relaxation_time: 1.0,
        });
        let mut rng = SimRng::with_seed(4);
        assert_eq!(noise.advance(0.2, &mut rng), 0.0);
    }
}
