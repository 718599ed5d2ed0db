//! Device status computation: thresholds, liveness, resolution, aggregation.
//!
//! Everything in this module is pure and synchronous. The clock is always
//! an explicit `now` parameter and recoverable failure lives entirely in
//! the fetch layer, so these functions are total for well-typed input.

mod aggregate;
mod liveness;
mod models;
mod resolver;
mod thresholds;

pub use aggregate::*;
pub use liveness::*;
pub use models::*;
pub use resolver::*;
pub use thresholds::*;
