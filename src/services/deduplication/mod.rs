//! Two-phase deduplication.
//!
//! A payment usually produces several notifications within seconds: a push
//! from the wallet, a second one from its mini-program, a bank SMS relay.
//! Deduplication happens in two phases:
//!
//! 1. **Provisional** (before parsing): a raw-text window check and a
//!    fingerprint built from the owning parser's cheap guess.
//! 2. **Authoritative** (after parsing): the final fingerprint of the parsed
//!    candidate, inserted atomically by [`DecisionEngine::record_processed`].
//!
//! A failed parse never writes anything, so a legitimate retry is never
//! blocked by an earlier rejection.
//!
//! # Example
//!
//! ```rust,ignore
//! use notiledger::services::deduplication::DecisionEngine;
//!
//! let engine = DecisionEngine::new(store, parsers, settings);
//! match engine.evaluate(&event)? {
//!     ProcessDecision::Process(fingerprint) => { /* parse and commit */ },
//!     ProcessDecision::Skip(reason) => println!("skipped: {reason}"),
//!     ProcessDecision::Error(message) => eprintln!("error: {message}"),
//! }
//! ```

mod config;
mod engine;
mod fingerprint;
mod hasher;

pub use config::{
    DEFAULT_BURST_CEILING, DEFAULT_WINDOW_SECS, DedupConfig, MAX_WINDOW_SECS, MIN_WINDOW_SECS,
    clamp_window,
};
pub use engine::DecisionEngine;
pub use fingerprint::{FINGERPRINT_VERSION, FingerprintGenerator};
pub use hasher::{ContentHasher, SHORT_HASH_LEN};
