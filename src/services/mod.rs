//! Business logic services.
//!
//! Services orchestrate the parsers, the policy filter and the dedup store
//! and provide the high-level operations hosts call.

pub mod deduplication;
mod ledger;
mod pipeline;

pub use deduplication::{
    ContentHasher, DecisionEngine, DedupConfig, FINGERPRINT_VERSION, FingerprintGenerator,
};
pub use ledger::{InMemoryLedger, JsonLinesSink, LedgerEntry, LedgerSink};
pub use pipeline::{LedgerPipeline, PipelineOutcome};
