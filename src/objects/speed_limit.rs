/// A speed limit that applies from its position up to the next speed limit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeedLimit {
    pub position: f64,
    /// The limit in m/s; infinite lifts an earlier limit.
    pub limit: f64,
}
