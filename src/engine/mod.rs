//! Alignment engine for Alignment Core.
//!
//! This module contains the four-stage pipeline:
//! - Intellect: Drafts an answer plus a self-reflection
//! - Will: Approves the draft or swaps in a suppression notice
//! - Conscience: Grades the released answer against every value
//! - Spirit: Aggregates the grades into a single 1-5 score
//! - Alignment Pipeline: Orchestrates the stages and the audit ledger

mod completion;
mod conscience;
mod coordinator;
mod intellect;
mod spirit;
mod will;

pub use completion::*;
pub use conscience::*;
pub use coordinator::*;
pub use intellect::*;
pub use spirit::*;
pub use will::*;

#[cfg(test)]
pub(crate) use completion::testing;
