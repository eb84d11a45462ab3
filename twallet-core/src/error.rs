use thiserror::Error;

/// Error outputs from `twallet-core`
#[derive(Debug, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum TwalletError {
    /// The presented input is not valid for the requested operation
    #[error("invalid_input_{attribute}: {reason}")]
    InvalidInput {
        /// The attribute that was rejected
        attribute: String,
        /// Why it was rejected
        reason: String,
    },
    /// The request payload could not be serialized
    #[error("encoding_error: {error}")]
    Encoding {
        /// Serializer failure
        error: String,
    },
    /// The HTTP exchange itself failed (connection, DNS, timeout)
    #[error("transport_error ({url}): {error}")]
    Transport {
        /// Requested URL
        url: String,
        /// Transport failure
        error: String,
    },
    /// The response body could not be decoded into the expected shape
    #[error("decode_error ({url}): {error}")]
    Decode {
        /// Requested URL
        url: String,
        /// Raw decoder failure reason
        error: String,
    },
    /// The service answered with a status code other than the expected one
    #[error("unexpected response code {status} ({url}): {detail}")]
    UnexpectedStatus {
        /// Requested URL
        url: String,
        /// HTTP status returned by the service
        status: u16,
        /// The server's `detail` message, or the whole decoded envelope when absent
        detail: String,
    },
    /// A background activation session could not be started
    #[error("runtime_error: {error}")]
    Runtime {
        /// Why the session could not be spawned
        error: String,
    },
}

impl TwalletError {
    pub(crate) fn invalid_input(attribute: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            attribute: attribute.to_string(),
            reason: reason.into(),
        }
    }
}
