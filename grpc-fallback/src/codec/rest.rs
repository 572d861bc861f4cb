use super::transcode::transcode;
use super::{Codec, FetchParameters, RpcMessage, ServiceAddress};
use crate::{MethodDescriptor, Status};
use bytes::Bytes;
use http::{header::CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, trace};

const CONTENT_TYPE_JSON: &str = "application/json";

/// A [`Codec`] that transcodes requests into JSON REST calls using the
/// method's `google.api.http` rule, and reads failures as a JSON error
/// object.
#[derive(Debug, Clone, Default)]
pub struct RestCodec {
    _priv: (),
}

impl RestCodec {
    /// Create a REST codec.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Codec for RestCodec {
    fn encode<M: RpcMessage>(
        &self,
        method: &MethodDescriptor,
        address: &ServiceAddress,
        request: &M,
    ) -> Result<FetchParameters, Status> {
        let rule = method.http().ok_or_else(|| {
            Status::unimplemented(format!("{} has no HTTP mapping", method.full_name()))
        })?;

        let request = match serde_json::to_value(request) {
            Ok(Value::Object(object)) => object,
            Ok(other) => {
                return Err(Status::invalid_argument(format!(
                    "request of {} must encode to a JSON object, got {}",
                    method.full_name(),
                    json_kind(&other)
                )))
            }
            Err(err) => {
                return Err(Status::invalid_argument(format!(
                    "failed to encode request of {}: {err}",
                    method.full_name()
                )))
            }
        };

        let transcoded = transcode(&request, rule).ok_or_else(|| {
            Status::invalid_argument(format!(
                "request of {} does not match any HTTP binding",
                method.full_name()
            ))
        })?;
        trace!(
            "{} transcoded to {} {}",
            method.full_name(),
            transcoded.method,
            transcoded.path
        );

        let mut url = format!(
            "{}/{}",
            address.base_url(),
            transcoded.path.trim_start_matches('/')
        );
        let query = transcoded.query_string();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }

        let body = match &transcoded.body {
            Some(body) => serde_json::to_vec(body)
                .map(Bytes::from)
                .map_err(|err| Status::internal(format!("failed to encode body: {err}")))?,
            None => Bytes::new(),
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));

        Ok(FetchParameters {
            method: transcoded.method,
            url,
            headers,
            body,
        })
    }

    fn decode<M: RpcMessage>(
        &self,
        method: &MethodDescriptor,
        ok: bool,
        body: &[u8],
    ) -> Result<M, Status> {
        if ok {
            return decode_json(method, body);
        }

        let text = String::from_utf8_lossy(body);
        match serde_json::from_str::<Value>(&text) {
            Ok(error) => Err(Status::from_json_error(&error)),
            Err(err) => {
                debug!("{}: error body is not JSON: {}", method.full_name(), err);
                Err(Status::unresolved(text.into_owned()))
            }
        }
    }
}

/// Decode a successful JSON response, or one element of a stream.
pub(crate) fn decode_json<M: RpcMessage>(
    method: &MethodDescriptor,
    body: &[u8],
) -> Result<M, Status> {
    let text = std::str::from_utf8(body).map_err(|err| {
        Status::internal(format!(
            "response of {} is not valid UTF-8: {err}",
            method.full_name()
        ))
    })?;

    let value = serde_json::from_str::<Value>(text).map_err(|err| {
        Status::internal(format!(
            "response of {} is not valid JSON: {err}",
            method.full_name()
        ))
    })?;

    if value.is_null() {
        return Err(Status::internal(format!(
            "response of {} decoded to no message",
            method.full_name()
        )));
    }

    serde_json::from_value(value).map_err(|err| {
        Status::internal(format!(
            "failed to decode response of {}: {err}",
            method.full_name()
        ))
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
