//! Response envelope, raw transport result, and the decoder seam.

use crate::error::{GraphqlClientError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Undecoded result of one transport round trip.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Full response body. Always fully read, even when discarded, so the
    /// pooled connection can be reused.
    pub body: String,
    /// Round-trip duration in milliseconds.
    pub duration_ms: u64,
}

/// A decoded GraphQL response: typed data, typed errors, and duration.
///
/// GraphQL-level errors inside a successful HTTP response are not failures;
/// partial data and errors are returned together.
#[derive(Debug, Clone)]
pub struct GraphqlResponse<T, U> {
    /// Decoded data payload, when present.
    pub data: Option<T>,
    /// Decoded GraphQL-level errors, when present.
    pub errors: Option<Vec<U>>,
    /// Round-trip (or cache-fill) duration in milliseconds.
    pub duration_ms: u64,
}

impl<T, U> GraphqlResponse<T, U> {
    /// Whether the response carries GraphQL-level errors.
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// The standard GraphQL response envelope, decoded to JSON values.
/// Typed conversion happens per call with the caller's target types.
#[derive(Debug, Clone, Deserialize)]
pub struct DecodedEnvelope {
    /// The `data` member, when present.
    #[serde(default)]
    pub data: Option<Value>,
    /// The `errors` member, when present.
    #[serde(default)]
    pub errors: Option<Vec<Value>>,
}

impl DecodedEnvelope {
    /// Convert the envelope into a typed response.
    pub fn into_typed<T, U>(self, duration_ms: u64) -> Result<GraphqlResponse<T, U>>
    where
        T: DeserializeOwned,
        U: DeserializeOwned,
    {
        let data = match self.data {
            Some(Value::Null) | None => None,
            Some(value) => Some(
                serde_json::from_value(value)
                    .map_err(|e| GraphqlClientError::decode(format!("data: {e}")))?,
            ),
        };

        let errors = match self.errors {
            None => None,
            Some(values) => Some(
                values
                    .into_iter()
                    .map(|value| {
                        serde_json::from_value(value)
                            .map_err(|e| GraphqlClientError::decode(format!("errors: {e}")))
                    })
                    .collect::<Result<Vec<U>>>()?,
            ),
        };

        Ok(GraphqlResponse {
            data,
            errors,
            duration_ms,
        })
    }
}

/// Pluggable decoder turning a raw body into the GraphQL envelope.
/// Overridable per request through [`crate::RequestOptions`].
pub trait ResponseDecoder: Send + Sync {
    /// Decode the response body.
    fn decode(&self, body: &str) -> Result<DecodedEnvelope>;
}

/// Default decoder: parses the body as the standard JSON envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecoder;

impl ResponseDecoder for DefaultDecoder {
    fn decode(&self, body: &str) -> Result<DecodedEnvelope> {
        serde_json::from_str(body).map_err(|e| GraphqlClientError::decode(e.to_string()))
    }
}
