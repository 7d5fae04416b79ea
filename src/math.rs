//! Mathematical structs and functions.

pub use interp::PiecewiseLinear;

mod interp;
