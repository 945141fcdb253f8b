//! Output sinks for canonical records.
//!
//! - [`json`]: writes the whole batch to one pretty-printed JSON file
//!
//! Document-store persistence is handled outside this binary.

pub mod json;
