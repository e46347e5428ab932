//! Features Module - Flow Feature Extraction Engine
//!
//! Turns an ordered packet list into a fixed-schema, named numeric vector.
//!
//! - `layout.rs`: schema tables, versions, layout hashes
//! - `vector.rs`: `FeatureVector` + column contract validation
//! - `engineer.rs`: the extraction rules
//! - `stats.rs`: population statistics helpers

pub mod layout;
pub mod vector;
pub mod engineer;
pub mod stats;


// Re-export common types
pub use layout::{FeatureSchema, LayoutInfo};
pub use vector::{FeatureVector, FeatureContractError, validate};
pub use engineer::FeatureEngine;
