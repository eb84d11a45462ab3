//! Wire codec for the issuer service.
//!
//! Every response body is first decoded into a permissive [`Envelope`], which is all
//! that is needed to report a failure. Only a successful response is decoded a second
//! time into its strict result type, see [`decode_typed`].
use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::TwalletError;
use crate::http_request::RawResponse;

/// A response body decoded as an untyped JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope(Map<String, Value>);

impl Envelope {
    /// Decodes a response body. The body must be a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`TwalletError::Decode`] if the body is not a JSON object.
    pub fn decode(url: &str, bytes: &[u8]) -> Result<Self, TwalletError> {
        serde_json::from_slice::<Map<String, Value>>(bytes)
            .map(Self)
            .map_err(|err| TwalletError::Decode {
                url: url.to_string(),
                error: format!("failed to decode response body: {err}"),
            })
    }

    /// Returns a member of the envelope.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a member as a string, treating `null` as absent.
    ///
    /// # Errors
    ///
    /// Returns [`TwalletError::Decode`] if the member is present but not a string.
    pub fn get_str(&self, url: &str, key: &str) -> Result<Option<&str>, TwalletError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value)),
            Some(other) => Err(TwalletError::Decode {
                url: url.to_string(),
                error: format!("expected `{key}` to be a string, got {other}"),
            }),
        }
    }

    /// The human readable reason of a failed request: the server's `detail`
    /// member verbatim, or the whole envelope when the server sent none.
    #[must_use]
    pub fn detail(&self) -> String {
        match self.0.get("detail") {
            Some(Value::String(detail)) => detail.clone(),
            Some(detail) if !detail.is_null() => detail.to_string(),
            _ => self.to_string(),
        }
    }

    /// Consumes the envelope, returning the underlying JSON object.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

/// Serializes an outbound payload.
pub(crate) fn encode<T: Serialize>(payload: &T) -> Result<Vec<u8>, TwalletError> {
    serde_json::to_vec(payload).map_err(|err| TwalletError::Encoding {
        error: format!("failed to marshal request payload: {err}"),
    })
}

/// Decodes the envelope of `response` and checks its status code.
///
/// Decoding happens first, so a malformed body is reported as such even when the
/// status code is also unexpected.
pub(crate) fn expect_status(
    operation: &str,
    response: &RawResponse,
    expected: u16,
) -> Result<Envelope, TwalletError> {
    let envelope = Envelope::decode(&response.url, &response.body)?;
    if response.status != expected {
        log::error!(
            "{operation} status={} responseBody={envelope}",
            response.status
        );
        return Err(TwalletError::UnexpectedStatus {
            url: response.url.clone(),
            status: response.status,
            detail: envelope.detail(),
        });
    }
    log::debug!("{operation} response={envelope}");
    Ok(envelope)
}

/// Strictly decodes the body of a successful response.
pub(crate) fn decode_typed<T: DeserializeOwned>(
    response: &RawResponse,
) -> Result<T, TwalletError> {
    serde_json::from_slice(&response.body).map_err(|err| TwalletError::Decode {
        url: response.url.clone(),
        error: format!("failed to unmarshal response body: {err}"),
    })
}

/// Deserializes `null` as the type's default value. Used together with
/// `#[serde(default)]` for members the service may omit or null out.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
