//! Domain types for Alignment Core.
//!
//! This module contains the pipeline's entities and value objects.

mod audit;
mod evaluation;
mod run;
mod value_set;

pub use audit::*;
pub use evaluation::*;
pub use run::*;
pub use value_set::*;
