//! Error types for the client.

use crate::orchestrator::CreatedDataset;
use ddh_codec::CodecError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the node API.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The server response could not be parsed into the expected shape.
    #[error("{operation} failed for {id}: {body}")]
    Api {
        /// Operation that was attempted.
        operation: String,
        /// Caller-supplied or external identifier of the affected record.
        id: String,
        /// Raw response body.
        body: String,
    },

    /// A resource was created but its file could not be attached.
    #[error("upload to resource {resource_nid} failed for {id}: {body}")]
    AttachFile {
        /// Node id of the already-created resource.
        resource_nid: String,
        /// External identifier of the record being processed.
        id: String,
        /// Raw response body.
        body: String,
    },

    /// A dataset was created but one of its resources failed.
    ///
    /// `created` lists the dataset and the resources attached before the
    /// failure; nothing is rolled back.
    #[error("dataset {} created with {} resource(s) before failure: {source}", .created.nid, .created.resources.len())]
    PartialDataset {
        /// What was created before the failure.
        created: Box<CreatedDataset>,
        /// The failure.
        source: Box<ClientError>,
    },

    /// The caller's record has an unusable shape.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Field preparation error (taxonomy or date).
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Local I/O error (reading an upload).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates an API error.
    pub fn api(
        operation: impl Into<String>,
        id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::Api {
            operation: operation.into(),
            id: id.into(),
            body: body.into(),
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Returns true for transport-level failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }

    /// Returns the partially created dataset, if this error carries one.
    pub fn partial_dataset(&self) -> Option<&CreatedDataset> {
        match self {
            ClientError::PartialDataset { created, .. } => Some(created.as_ref()),
            _ => None,
        }
    }

    /// Returns the identifier named by the underlying API error.
    pub fn api_id(&self) -> Option<&str> {
        match self {
            ClientError::Api { id, .. } | ClientError::AttachFile { id, .. } => Some(id.as_str()),
            ClientError::PartialDataset { source, .. } => source.api_id(),
            _ => None,
        }
    }
}
