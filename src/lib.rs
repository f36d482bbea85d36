//! modelport core library.
//!
//! Deploys ML inference backends onto managed compute targets and exposes a
//! uniform invocation surface. The two load-bearing pieces are the
//! compatibility resolver ([`resolver`]) over the capability registry
//! ([`registry`]), and the streaming invocation adapter ([`invoke`]): a
//! frame decoder that reassembles delimiter-framed JSON records from
//! arbitrarily chunked byte streams, per-engine backend adapters, and the
//! client that drives one call.

pub mod cli;
pub mod config;
pub mod constants;
pub mod deploy;
pub mod error;
pub mod invoke;
pub mod registry;
pub mod resolver;

// Re-export commonly used types
pub use error::{InvokeError, RegistryError, ResolveError};
pub use invoke::{
    BackendAdapter, ChatMessage, ChatRequest, CompletionOutcome, Conversation, DeltaKind,
    EndpointAddress, FrameDecoder, InvocationClient, StreamEvent,
};
pub use registry::{CapabilityGraph, CapabilityTuple, Model, TupleQuery};
pub use resolver::{ExecutableConfig, ResolveRequest, Resolver};
