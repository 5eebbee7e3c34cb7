//! Storage layer for Alignment Core.
//!
//! Completed runs go to an append-only JSONL ledger; audit progress for
//! recent runs is tracked in memory.

mod ledger;
mod tracker;

pub use ledger::{AuditLedger, JsonlLedger};
pub use tracker::AuditTracker;

#[cfg(test)]
pub use ledger::MemoryLedger;
