//! Error taxonomy.
//!
//! One variant per kind named in the specification's error-handling design,
//! not per underlying library. Lower layers (parser, client) only ever
//! construct these; mapping a kind to a JSON-RPC error code is the server
//! crate's job, not this one's.

use std::fmt;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The error kinds a bridge operation can fail with.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid or conflicting configuration, detected at startup.
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable description.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// `$metadata` could not be retrieved over HTTP.
    #[error("failed to fetch metadata from {url}: {message}")]
    MetadataFetch {
        /// The metadata endpoint that was requested.
        url: String,
        /// Human-readable description.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// `$metadata` was retrieved but failed to parse as CSDL.
    #[error("failed to parse metadata ({schema}{element}): {message}")]
    MetadataParse {
        /// Which `<Schema>` block the error occurred in, if known.
        schema: String,
        /// Which element within the schema, if known (empty if not).
        element: String,
        /// Human-readable description.
        message: String,
    },

    /// A connection-level or timeout failure reaching the remote service.
    #[error("network error: {message}")]
    Network {
        /// Human-readable description.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The remote service rejected credentials (HTTP 401).
    #[error("authentication failed: {message}")]
    AuthFailure {
        /// Human-readable description.
        message: String,
    },

    /// A CSRF-protected mutation failed after the single permitted refresh.
    #[error("CSRF validation failed after token refresh: {message}")]
    CsrfFailure {
        /// Human-readable description.
        message: String,
    },

    /// The remote OData service returned a 4xx error (other than 401/403/408/429).
    #[error("OData error {code}: {message}")]
    ODataClient {
        /// OData error code from the response envelope, if present.
        code: String,
        /// Human-readable description/message from the envelope.
        message: String,
        /// Raw response body, kept for diagnostics when the envelope didn't parse.
        raw_body: Option<String>,
    },

    /// The remote OData service returned a 5xx error after retries were exhausted.
    #[error("OData server error {code}: {message}")]
    ODataServer {
        /// OData error code from the response envelope, if present.
        code: String,
        /// Human-readable description/message from the envelope.
        message: String,
    },

    /// Malformed JSON-RPC request (not valid JSON, missing required fields, etc).
    #[error("protocol error: {message}")]
    Protocol {
        /// Human-readable description.
        message: String,
    },

    /// An unknown tool or method name was requested.
    #[error("unknown {kind}: {name}")]
    NotFound {
        /// What kind of thing was missing (`"tool"`, `"method"`, `"entity set"`, ...).
        kind: String,
        /// The name that was requested.
        name: String,
    },

    /// An invariant violation or programming error; never expected in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable description.
        message: String,
    },
}

impl Error {
    /// Build a [`Error::Config`] with no source.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Build a [`Error::Network`] with no source.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Build a [`Error::Internal`].
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classify whether this error should be treated as a client-caused (4xx-shaped)
    /// failure versus a server/internal (5xx-shaped) one, for JSON-RPC error-code mapping.
    #[must_use]
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Error::ODataClient { .. } | Error::Protocol { .. } | Error::NotFound { .. })
    }
}

/// Context extension mirroring the teacher's `ErrorContext` convenience trait:
/// wraps an arbitrary `Result<T, E>` into a [`Error::Internal`] (or a caller-chosen
/// variant) while preserving the source chain.
pub trait ErrorContext<T> {
    /// Attach `message` as context, producing an [`Error::Internal`] on failure.
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Internal {
            message: format!("{}: {e}", DisplayMessage(message.into())),
        })
    }
}

struct DisplayMessage(String);
impl fmt::Display for DisplayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
