//! Piecewise-linear tables.

/// A function defined by knots `(x, y)` with strictly increasing `x`,
/// evaluated by linear interpolation between the bracketing knots.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PiecewiseLinear {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl PiecewiseLinear {
    /// Creates a table from knots. The knots are sorted by `x`.
    pub fn new(knots: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut knots = knots.into_iter().collect::<Vec<_>>();
        knots.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (xs, ys) = knots.into_iter().unzip();
        Self { xs, ys }
    }

    /// Whether the table has no knots.
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// The number of knots.
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// Whether no two knots share an `x`.
    pub fn has_distinct_knots(&self) -> bool {
        self.xs.windows(2).all(|w| w[0] < w[1])
    }

    /// Evaluates the table, extrapolating linearly with the slope of the
    /// first/last segment beyond the knot range. An empty table yields `empty`.
    pub fn extrapolate(&self, x: f64, empty: f64) -> f64 {
        match self.xs.len() {
            0 => empty,
            1 => self.ys[0],
            n => {
                let i = self.segment(x).min(n - 2);
                self.lerp(i, x)
            }
        }
    }

    /// Evaluates the table, holding the end values constant beyond the knot range.
    /// An empty table yields `empty`.
    pub fn clamped(&self, x: f64, empty: f64) -> f64 {
        let n = self.xs.len();
        if n == 0 {
            empty
        } else if x <= self.xs[0] {
            self.ys[0]
        } else if x >= self.xs[n - 1] {
            self.ys[n - 1]
        } else {
            self.lerp(self.segment(x), x)
        }
    }

    /// Index of the segment `[x_i, x_{i+1}]` used for `x`; 0 below the range.
    fn segment(&self, x: f64) -> usize {
        self.xs.partition_point(|xi| *xi <= x).saturating_sub(1)
    }

    fn lerp(&self, i: usize, x: f64) -> f64 {
        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        // A repeated knot is a step.
        if x1 <= x0 {
            return if x < x0 { y0 } else { y1 };
        }
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}
