use crate::util::Interval;

/// A variable message sign asking drivers within its range to move into a lane.
#[derive(Clone, Debug)]
pub struct DiversionSign {
    range: Interval,
    /// The target lane; `None` until resolved to the rightmost lane.
    lane: Option<usize>,
    compliance: f64,
}

impl DiversionSign {
    pub fn new(position: f64, valid_length: f64, lane: Option<usize>, compliance: f64) -> Self {
        Self {
            range: Interval::starting_at(position, valid_length),
            lane,
            compliance: compliance.clamp(0.0, 1.0),
        }
    }

    pub fn position(&self) -> f64 {
        self.range.min
    }

    /// The stretch of road in which the sign applies.
    pub fn range(&self) -> Interval {
        self.range
    }

    /// The lane diverted drivers move into.
    pub fn lane(&self) -> Option<usize> {
        self.lane
    }

    /// The probability that a driver follows the sign.
    pub fn compliance(&self) -> f64 {
        self.compliance
    }

    /// Fits the sign onto a segment of the given length and lane count.
    pub(crate) fn finalize(&mut self, length: f64, lanes: usize) {
        let min = self.range.min.clamp(0.0, length);
        self.range = Interval::new(min, f64::max(min, self.range.max)).clamp_max(length);
        let rightmost = lanes.saturating_sub(1);
        self.lane = Some(self.lane.map_or(rightmost, |lane| lane.min(rightmost)));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn finalize_clamps_range_and_lane() {
        let mut sign = DiversionSign::new(800.0, 500.0, None, 1.5);
        sign.finalize(1000.0, 3);
        assert_eq!(sign.range(), Interval::new(800.0, 1000.0));
        assert_eq!(sign.lane(), Some(2));
        assert_eq!(sign.compliance(), 1.0);
    }
}
