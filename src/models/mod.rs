//! Data models for notiledger.
//!
//! This module contains the event, candidate, record and decision types
//! shared by every stage of the pipeline.

mod decision;
mod event;
mod payment;
mod record;

pub use decision::{ProcessDecision, SkipReason, Stage};
pub use event::RawNotificationEvent;
pub use payment::{PaymentCandidate, PaymentDirection, PaymentSourceType};
pub use record::{DedupRecord, DedupStats, SourceStats};
