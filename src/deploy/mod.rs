//! Deployment-side helpers: naming and engine launch commands.
//!
//! Provisioning itself (stacks, buckets, images) lives outside this crate;
//! these helpers produce the strings that layer consumes.

pub mod command;
pub mod naming;
