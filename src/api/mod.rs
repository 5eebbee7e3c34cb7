//! HTTP API layer for Alignment Core.
//!
//! Provides REST endpoints for pipeline runs, audit polling and value sets.

pub mod handlers;
mod routes;
mod types;

pub use routes::build_router;
