//! Parsing and formatting helpers for CPU quantities and duration strings
//!
//! Both helpers are pure functions over strings; they back the validation of
//! fixed policy configuration and of every value returned by the prediction
//! service.

mod duration;
mod quantity;

pub use duration::{format_duration, parse_duration, DurationParseError};
pub use quantity::{CpuQuantity, QuantityParseError};
