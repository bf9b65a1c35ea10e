//! Line-oriented transform stages
//!
//! 1. UppercaseStage - Uppercase every line
//! 2. PrefixStage - Insert a fixed prefix in front of every line

pub mod prefix;
pub mod uppercase;

// Re-export stages
pub use prefix::{PrefixStage, DEFAULT_PREFIX};
pub use uppercase::UppercaseStage;
