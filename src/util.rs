//! Miscellaneous utility structs and functions.

use std::fmt::Debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An interval on the real number line.
#[derive(Copy, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    /// Creates a new interval.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Creates an interval starting at `start` with the given length.
    pub fn starting_at(start: f64, length: f64) -> Self {
        Self::new(start, start + length)
    }

    /// Returns true if this interval contains the value.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Gets the magnitude of the interval.
    pub fn length(&self) -> f64 {
        self.max - self.min
    }

    /// Returns the interval truncated so it ends no later than `max`.
    pub fn clamp_max(&self, max: f64) -> Self {
        Self {
            min: f64::min(self.min, max),
            max: f64::min(self.max, max),
        }
    }

    /// Returns the centre/mid-point of the interval.
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.min + self.max)
    }
}

impl Debug for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval({:?}, {:?})", &self.min, &self.max)
    }
}

#[cfg(test)]
mod test {
    use super::Interval;

    #[test]
    fn clamped_interval() {
        let range = Interval::starting_at(80.0, 50.0);
        assert!(range.contains(100.0));
        assert!(!range.contains(131.0));

        let clamped = range.clamp_max(100.0);
        assert_eq!(clamped, Interval::new(80.0, 100.0));
        assert_eq!(clamped.length(), 20.0);
        assert_eq!(clamped.midpoint(), 90.0);
    }
}
