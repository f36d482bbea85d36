//! Command-line interface module.
//!
//! Thin surface over the library core: listing the capability registry,
//! resolving deployment plans, and invoking deployed endpoints.

pub mod commands;
pub mod handlers;

pub use commands::Commands;
pub use handlers::{handle_invoke, handle_models, handle_plan};
