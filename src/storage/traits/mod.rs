//! Storage traits.

mod dedup;

pub use dedup::{DedupStore, InsertOutcome};
