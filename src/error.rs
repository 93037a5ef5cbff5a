//! Error types for the Multy provider.

use thiserror::Error;

/// Errors that can occur while serving the provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A resource operation arrived before the provider was configured.
    #[error(
        "Provider not configured: the provider was not configured before apply, \
         likely because its configuration depends on a value that is only known \
         after another resource is created"
    )]
    NotConfigured,

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// The per-call credentials could not be encoded.
    #[error("Error encoding credentials: {0}")]
    Credentials(String),

    /// The remote service returned a failure status.
    #[error("{message}")]
    Remote {
        /// The gRPC status code.
        code: tonic::Code,
        /// The status message without transport framing.
        message: String,
    },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A reply from the remote service could not be decoded.
    #[error("Error decoding response: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::UnknownResource(msg)
            | Self::Credentials(msg)
            | Self::Unimplemented(msg) => msg.clone(),
            Self::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// The remote status code, if this error came from the remote service.
    pub fn code(&self) -> Option<tonic::Code> {
        match self {
            Self::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if the remote service reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        self.code() == Some(tonic::Code::NotFound)
    }

    /// Returns true for the degenerate failure carrying the `Ok` code.
    pub fn is_ok_code(&self) -> bool {
        self.code() == Some(tonic::Code::Ok)
    }
}

impl From<tonic::Status> for ProviderError {
    fn from(status: tonic::Status) -> Self {
        Self::Remote {
            code: status.code(),
            message: status.message().to_string(),
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::NotConfigured => {
                tonic::Status::failed_precondition(ProviderError::NotConfigured.to_string())
            },
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Credentials(msg) => {
                tonic::Status::internal(format!("Error encoding credentials: {}", msg))
            },
            ProviderError::Remote { code, message } => tonic::Status::new(code, message),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::Decode(err) => {
                tonic::Status::internal(format!("Error decoding response: {}", err))
            },
            ProviderError::Unimplemented(msg) => tonic::Status::unimplemented(msg),
        }
    }
}
