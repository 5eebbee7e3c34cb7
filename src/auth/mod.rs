//! Authentication module for Alignment Core.
//!
//! Callers of the run endpoints present an API key, either as `X-API-Key`
//! or as `Authorization: Bearer <key>`. Health and docs stay public.

mod api_key;
mod middleware;

pub use api_key::*;
pub use middleware::*;
