//! Error types for dmap-share.

use thiserror::Error;

use crate::codec::ContentCode;

/// Main error type for all dmap-share operations.
///
/// Codec-level variants are fatal only to the single decode call that
/// produced them; session and protocol variants map to the HTTP-level
/// response class the serving layer should emit. None of these may take
/// down the serving process for one bad request.
#[derive(Debug, Error)]
pub enum DmapError {
    /// I/O error from the transport collaborator.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Decode was handed a zero-length buffer.
    #[error("empty input")]
    EmptyInput,

    /// A node's declared length exceeds the bytes remaining in the buffer.
    #[error("truncated input: node declares {declared} bytes but only {remaining} remain")]
    TruncatedInput { declared: usize, remaining: usize },

    /// A fixed-width numeric field carried a wire length that disagrees
    /// with its registered width. Never raised for strings, blobs, or
    /// containers.
    #[error("malformed length for {code}: expected {expected} bytes, wire says {actual}")]
    MalformedLength {
        code: ContentCode,
        expected: usize,
        actual: usize,
    },

    /// Validation token did not match the recomputed value.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Session id is unknown or already closed.
    #[error("invalid session id {0}")]
    SessionInvalid(u32),

    /// Session existed but timed out.
    #[error("session {0} expired")]
    SessionExpired(u32),

    /// Structurally wrong reply or request sequencing violation.
    /// The connection closes; there is no silent retry.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using DmapError.
pub type Result<T> = std::result::Result<T, DmapError>;
