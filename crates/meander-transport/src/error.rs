//! Transport-level errors

/// Errors surfaced by a [`SwfTransport`](crate::SwfTransport) implementation.
///
/// The engine only distinguishes "the type already exists" (part of the
/// registration protocol) from everything else; all remaining variants are
/// treated as transient and retried or swallowed by the caller.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TransportError {
    /// The workflow or activity type is already registered.
    #[error("type already exists: {name} v{version}")]
    TypeAlreadyExists {
        /// Type name
        name: String,

        /// Type version
        version: String,
    },

    /// The service rejected the request.
    #[error("service fault {code}: {message}")]
    Service {
        /// Service fault code, e.g. `UnknownResourceFault`
        code: String,

        /// Human-readable message
        message: String,
    },

    /// The request never reached the service.
    #[error("connection error: {0}")]
    Connection(String),
}

impl TransportError {
    /// Whether this is the already-registered response from a register call.
    pub fn is_type_already_exists(&self) -> bool {
        matches!(self, Self::TypeAlreadyExists { .. })
    }
}
