//! Typed records for the collections that are not schema-driven.
//!
//! Field names serialize in camelCase to match the JSON files on disk.

mod procurement;
mod relation;
mod relation_type;

pub use procurement::*;
pub use relation::*;
pub use relation_type::*;
