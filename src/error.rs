//! Error types for the modelport core.
//!
//! All failures are typed values returned to the caller. Resolution errors
//! are never retried (resolution is deterministic); invocation errors carry
//! enough context for the caller to decide on a retry policy of its own.
//! This crate performs no hidden retries.

use std::fmt;
use std::time::Duration;

/// The four selection axes of a deployment tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Engine,
    Instance,
    Service,
    Framework,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Engine => write!(f, "engine"),
            Axis::Instance => write!(f, "instance"),
            Axis::Service => write!(f, "service"),
            Axis::Framework => write!(f, "framework"),
        }
    }
}

/// Error types for capability registry loading and registration.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry file error: {0}")]
    File(String),

    #[error("model {model_id} references an unregistered {axis}: {value}")]
    UnregisteredAxisValue {
        model_id: String,
        axis: Axis,
        value: String,
    },

    #[error("model {0} declares no admissible deployment tuples")]
    EmptyTupleSet(String),

    #[error("duplicate model id: {0}")]
    DuplicateModel(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Error types for compatibility resolution.
///
/// Resolution is a pure function over the capability graph and the caller's
/// constraints; every variant here is terminal for the request.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The requested model id is absent from the capability graph.
    #[error("model not supported: {0}")]
    UnknownModel(String),

    /// An unconstrained axis admits more than one value; the caller must
    /// disambiguate. Carries the candidate list for that purpose.
    #[error("ambiguous {axis} selection for model {model_id}; candidates: {}", candidates.join(", "))]
    AmbiguousSelection {
        model_id: String,
        axis: Axis,
        candidates: Vec<String>,
    },

    /// The requested combination is not a member of the model's admissible
    /// tuple set, even if each axis value appears in some tuple.
    #[error("incompatible combination for model {model_id}: {requested}")]
    IncompatibleCombination {
        model_id: String,
        requested: String,
    },

    /// An extra-parameter overlay did not fit the shape of the record it
    /// was applied to.
    #[error("invalid {target} parameter overlay: {reason}")]
    InvalidOverlay { target: String, reason: String },
}

/// Error types for endpoint invocation.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// One record in a stream failed structured decode. Localized: the
    /// stream continues past it and the error is reported alongside the
    /// records that follow.
    #[error("undecodable record: {reason} (record: {record})")]
    Decode { reason: String, record: String },

    /// A fully decoded record or body did not match the engine's expected
    /// shape. Fatal for the call; never retried here.
    #[error("{engine} response did not match the expected shape: {message}")]
    BackendProtocol { engine: String, message: String },

    /// Connection-level failure (reset, refused, DNS, non-2xx status).
    #[error("transport error: {0}")]
    Transport(String),

    /// The externally supplied timeout elapsed before the call (connection
    /// setup plus full stream drain) completed.
    #[error("call did not complete within {0:?}")]
    Timeout(Duration),

    /// The request could not be serialized for the wire.
    #[error("request serialization failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for InvokeError {
    fn from(err: reqwest::Error) -> Self {
        InvokeError::Transport(err.to_string())
    }
}
