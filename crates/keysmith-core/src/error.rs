//! Error types for keysmith.

use thiserror::Error;

/// Result type alias using keysmith's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for codec, sniffer, inspector and provider operations.
#[derive(Error, Debug)]
pub enum Error {
    /// An encoder was handed a key family it cannot render.
    #[error("Unsupported key type for {format} export")]
    UnsupportedKeyType {
        /// Target format (or JWK `kty`) that could not be handled.
        format: String,
    },

    /// The sniffer exhausted every branch without recognizing the input.
    #[error("Unsupported key format. Provide a valid PEM, JWK, PGP, SSH, Base64, or Hex key")]
    UnsupportedKeyFormat,

    /// The cryptographic provider refused the parameters or material.
    #[error("Provider rejected key: {0}")]
    ProviderRejected(String),

    /// A container's integrity check (MAC or checkint) did not match.
    #[error("Integrity check failed: {0}")]
    IntegrityMismatch(String),

    /// Framing was recognized but the payload does not decode.
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// The key's algorithm does not support the requested operation.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Invalid caller input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A PGP key was involved but no PGP provider is configured.
    #[error("PGP support is not available")]
    PgpUnavailable,

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for [`Error::UnsupportedKeyType`].
    pub fn unsupported_key_type(format: impl Into<String>) -> Self {
        Error::UnsupportedKeyType {
            format: format.into(),
        }
    }

    /// Shorthand for [`Error::MalformedContainer`].
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedContainer(msg.into())
    }

    /// Whether this error means the input was recognized but refused, as
    /// opposed to not recognized at all.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::ProviderRejected(_) | Error::IntegrityMismatch(_) | Error::MalformedContainer(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
