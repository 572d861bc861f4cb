use crate::pb;
use bytes::Bytes;
use futures_util::future::Aborted;
use http::HeaderMap;
use prost::Message as _;
use serde::Deserialize;
use std::{collections::HashMap, error::Error, fmt, sync::Arc};
use tracing::{debug, trace, warn};

/// A gRPC status describing the result of an RPC call.
///
/// Every failed call made through a [`ServiceStub`](crate::ServiceStub) is
/// reported as a `Status`, whether the service sent an error, the transport
/// failed, or a message could not be encoded or decoded.
///
/// ```rust
/// # use grpc_fallback::{Status, Code};
/// let status1 = Status::new(Code::InvalidArgument, "name is invalid");
/// let status2 = Status::invalid_argument("name is invalid");
///
/// assert_eq!(status1.code(), Code::InvalidArgument);
/// assert_eq!(status1.code(), status2.code());
/// ```
#[derive(Clone)]
pub struct Status {
    /// The gRPC status code.
    code: Code,
    /// A relevant error message.
    message: String,
    /// Structured error details decoded from the error body.
    details: Vec<ErrorDetail>,
    /// The HTTP status of the response that carried this error, if any.
    http_status: Option<u16>,
    /// Headers of the response that carried this error.
    metadata: HeaderMap,
    /// Optional underlying error.
    source: Option<Arc<dyn Error + Send + Sync + 'static>>,
    /// The error body named no code, so `code` is only a placeholder until
    /// the HTTP status is known.
    unresolved: bool,
}

/// The canonical error codes of `google.rpc.Code`.
///
/// The discriminant is the numeric value found in a `google.rpc.Status`.
/// REST error bodies name the code instead, see [`Code::name`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Code {
    /// Not an error. HTTP 200.
    Ok = 0,
    /// The caller cancelled the call. HTTP 499.
    Cancelled = 1,
    /// The error could not be classified. HTTP 500.
    Unknown = 2,
    /// The request was malformed. HTTP 400.
    InvalidArgument = 3,
    /// The call did not finish within its timeout. HTTP 504.
    DeadlineExceeded = 4,
    /// HTTP 404.
    NotFound = 5,
    /// HTTP 409.
    AlreadyExists = 6,
    /// HTTP 403.
    PermissionDenied = 7,
    /// A quota or rate limit was hit. HTTP 429.
    ResourceExhausted = 8,
    /// HTTP 400.
    FailedPrecondition = 9,
    /// A concurrency conflict. HTTP 409.
    Aborted = 10,
    /// HTTP 400.
    OutOfRange = 11,
    /// The method is not served. HTTP 501.
    Unimplemented = 12,
    /// HTTP 500.
    Internal = 13,
    /// The service could not be reached, or refused the call. HTTP 503.
    Unavailable = 14,
    /// HTTP 500.
    DataLoss = 15,
    /// Credentials are missing or invalid. HTTP 401.
    Unauthenticated = 16,
}

/// One structured entry of an error's `details` list.
#[derive(Clone, Debug, PartialEq)]
pub enum ErrorDetail {
    /// A `google.rpc.ErrorInfo`.
    ErrorInfo(pb::ErrorInfo),
    /// A `google.rpc.BadRequest`, listing field validation failures.
    BadRequest(pb::BadRequest),
    /// Any other detail type, kept in its wire form. For proto responses
    /// `value` holds the encoded message, for REST responses its JSON text.
    Other {
        /// The `type_url` (or `@type` for JSON) of the detail.
        type_url: String,
        /// The undecoded detail.
        value: Bytes,
    },
}

impl Code {
    const ALL: [Code; 17] = [
        Code::Ok,
        Code::Cancelled,
        Code::Unknown,
        Code::InvalidArgument,
        Code::DeadlineExceeded,
        Code::NotFound,
        Code::AlreadyExists,
        Code::PermissionDenied,
        Code::ResourceExhausted,
        Code::FailedPrecondition,
        Code::Aborted,
        Code::OutOfRange,
        Code::Unimplemented,
        Code::Internal,
        Code::Unavailable,
        Code::DataLoss,
        Code::Unauthenticated,
    ];

    /// The name of the code as spelled in `google/rpc/code.proto`, e.g.
    /// `PERMISSION_DENIED`.
    pub fn name(&self) -> &'static str {
        match self {
            Code::Ok => "OK",
            Code::Cancelled => "CANCELLED",
            Code::Unknown => "UNKNOWN",
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Code::NotFound => "NOT_FOUND",
            Code::AlreadyExists => "ALREADY_EXISTS",
            Code::PermissionDenied => "PERMISSION_DENIED",
            Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Code::FailedPrecondition => "FAILED_PRECONDITION",
            Code::Aborted => "ABORTED",
            Code::OutOfRange => "OUT_OF_RANGE",
            Code::Unimplemented => "UNIMPLEMENTED",
            Code::Internal => "INTERNAL",
            Code::Unavailable => "UNAVAILABLE",
            Code::DataLoss => "DATA_LOSS",
            Code::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Status {
    /// A status with `code` and `message` and nothing else attached.
    pub fn new(code: Code, message: impl Into<String>) -> Status {
        Status {
            code,
            message: message.into(),
            details: Vec::new(),
            http_status: None,
            metadata: HeaderMap::new(),
            source: None,
            unresolved: false,
        }
    }

    /// Shorthand for [`Code::Cancelled`].
    pub fn cancelled(message: impl Into<String>) -> Status {
        Status::new(Code::Cancelled, message)
    }

    /// Shorthand for [`Code::Unknown`].
    pub fn unknown(message: impl Into<String>) -> Status {
        Status::new(Code::Unknown, message)
    }

    /// Shorthand for [`Code::InvalidArgument`], used for requests that
    /// cannot be encoded or transcoded.
    pub fn invalid_argument(message: impl Into<String>) -> Status {
        Status::new(Code::InvalidArgument, message)
    }

    /// Shorthand for [`Code::DeadlineExceeded`].
    pub fn deadline_exceeded(message: impl Into<String>) -> Status {
        Status::new(Code::DeadlineExceeded, message)
    }

    /// Shorthand for [`Code::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Status {
        Status::new(Code::NotFound, message)
    }

    /// Shorthand for [`Code::PermissionDenied`].
    pub fn permission_denied(message: impl Into<String>) -> Status {
        Status::new(Code::PermissionDenied, message)
    }

    /// Shorthand for [`Code::Unimplemented`], also used for methods a
    /// protocol cannot carry.
    pub fn unimplemented(message: impl Into<String>) -> Status {
        Status::new(Code::Unimplemented, message)
    }

    /// Shorthand for [`Code::Internal`], used for responses that cannot be
    /// decoded.
    pub fn internal(message: impl Into<String>) -> Status {
        Status::new(Code::Internal, message)
    }

    /// Shorthand for [`Code::Unavailable`].
    pub fn unavailable(message: impl Into<String>) -> Status {
        Status::new(Code::Unavailable, message)
    }

    /// Shorthand for [`Code::Unauthenticated`].
    pub fn unauthenticated(message: impl Into<String>) -> Status {
        Status::new(Code::Unauthenticated, message)
    }

    /// An `Unknown` status for an error body that named no code. The HTTP
    /// status of the response decides the code later on.
    pub(crate) fn unresolved(message: impl Into<String>) -> Status {
        Status {
            unresolved: true,
            ..Status::unknown(message)
        }
    }

    /// The `Status` reported when a call was aborted because its caller
    /// cancelled it.
    pub(crate) fn aborted_by_cancel() -> Status {
        let mut status = Status::cancelled("call cancelled by the caller");
        status.source = Some(Arc::new(Aborted));
        status
    }

    /// Create a `Status` for a failure reported by the HTTP transport.
    ///
    /// A `Status` already present in the source chain is preserved, timeouts
    /// map to `DeadlineExceeded`, and everything else is `Unavailable`.
    pub fn from_transport_error(err: crate::BoxError) -> Status {
        let err = match err.downcast::<Status>() {
            Ok(status) => return *status,
            Err(err) => err,
        };

        if let Some(status) = find_status_in_source_chain(&*err) {
            return status;
        }

        let code = if err.is::<tokio::time::error::Elapsed>() {
            Code::DeadlineExceeded
        } else {
            Code::Unavailable
        };
        debug!("transport error: {err}");
        let mut status = Status::new(code, err.to_string());
        status.source = Some(err.into());
        status
    }

    /// Build a `Status` from a decoded `google.rpc.Status`, as sent in the
    /// body of a failed proto-over-HTTP response.
    pub fn from_rpc_status(rpc: pb::Status) -> Status {
        let details = rpc
            .details
            .into_iter()
            .map(ErrorDetail::from_any)
            .collect();

        Status {
            details,
            ..Status::new(Code::from(rpc.code), rpc.message)
        }
    }

    /// Build a `Status` from the JSON error body of a failed REST response.
    ///
    /// The body has the shape `{"error": {"code": 403, "message": "...",
    /// "status": "PERMISSION_DENIED", "details": [...]}}`. The textual
    /// `status` wins over the numeric HTTP `code` when both are present.
    pub fn from_json_error(body: &serde_json::Value) -> Status {
        let error = match RestErrorBody::deserialize(body) {
            Ok(RestErrorBody { error }) => error,
            Err(err) => {
                warn!("Error deserializing REST error body: {err}");
                return Status::unresolved(format!("malformed error response: {body}"));
            }
        };

        let code = error
            .status
            .as_deref()
            .and_then(Code::from_name)
            .or_else(|| error.code.map(Code::from_http_status));

        let details = error
            .details
            .into_iter()
            .map(ErrorDetail::from_json)
            .collect();

        Status {
            details,
            http_status: error.code,
            unresolved: code.is_none(),
            ..Status::new(code.unwrap_or(Code::Unknown), error.message)
        }
    }

    /// The status code.
    pub fn code(&self) -> Code {
        self.code
    }

    /// The error message, possibly empty.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Every detail of the error body, in order.
    pub fn details(&self) -> &[ErrorDetail] {
        &self.details
    }

    /// The first `ErrorInfo` among the details, if any.
    pub fn error_info(&self) -> Option<&pb::ErrorInfo> {
        self.details.iter().find_map(|detail| match detail {
            ErrorDetail::ErrorInfo(info) => Some(info),
            _ => None,
        })
    }

    /// The `reason` of the embedded `ErrorInfo`, if any.
    pub fn reason(&self) -> Option<&str> {
        self.error_info().map(|info| info.reason.as_str())
    }

    /// The `domain` of the embedded `ErrorInfo`, if any.
    pub fn domain(&self) -> Option<&str> {
        self.error_info().map(|info| info.domain.as_str())
    }

    /// The `metadata` of the embedded `ErrorInfo`, if any.
    pub fn error_metadata(&self) -> Option<&HashMap<String, String>> {
        self.error_info().map(|info| &info.metadata)
    }

    /// The HTTP status code of the response that carried this error.
    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    /// Get a reference to the response headers that came with this error.
    pub fn metadata(&self) -> &HeaderMap {
        &self.metadata
    }

    /// Get a mutable reference to the response headers.
    pub fn metadata_mut(&mut self) -> &mut HeaderMap {
        &mut self.metadata
    }

    /// Returns `true` if this status was produced by aborting an in-flight
    /// call, as opposed to a failure reported by the network or the service.
    pub fn is_abort(&self) -> bool {
        self.code == Code::Cancelled
            && self
                .source
                .as_ref()
                .is_some_and(|source| source.is::<Aborted>())
    }

    /// Attach the error that caused this status.
    pub fn set_source(&mut self, source: Arc<dyn Error + Send + Sync + 'static>) -> &mut Status {
        self.source = Some(source);
        self
    }

    /// Attach the HTTP status and headers of the failed response. A code the
    /// body did not provide, or an `Ok` decoded from an empty body, is
    /// replaced by the one mapped from the HTTP status.
    pub(crate) fn with_response_parts(mut self, status: http::StatusCode, headers: HeaderMap) -> Self {
        if self.unresolved || self.code == Code::Ok {
            self.code = Code::from_http_status(status.as_u16());
            self.unresolved = false;
            trace!("error code {} taken from HTTP {}", self.code, status);
        }
        self.http_status.get_or_insert(status.as_u16());
        self.metadata = headers;
        self
    }
}

fn find_status_in_source_chain(err: &(dyn Error + 'static)) -> Option<Status> {
    let mut source = Some(err);

    while let Some(err) = source {
        if let Some(status) = err.downcast_ref::<Status>() {
            return Some(status.clone());
        }

        if err.is::<tokio::time::error::Elapsed>() {
            return Some(Status::deadline_exceeded(err.to_string()));
        }

        source = err.source();
    }

    None
}

#[derive(Deserialize)]
struct RestErrorBody {
    error: RestError,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RestError {
    code: Option<u16>,
    message: String,
    status: Option<String>,
    details: Vec<serde_json::Value>,
}

impl ErrorDetail {
    fn from_any(any: prost_types::Any) -> ErrorDetail {
        let decoded = if any.type_url.ends_with("google.rpc.ErrorInfo") {
            pb::ErrorInfo::decode(&any.value[..]).map(ErrorDetail::ErrorInfo)
        } else if any.type_url.ends_with("google.rpc.BadRequest") {
            pb::BadRequest::decode(&any.value[..]).map(ErrorDetail::BadRequest)
        } else {
            return ErrorDetail::Other {
                type_url: any.type_url,
                value: any.value.into(),
            };
        };

        decoded.unwrap_or_else(|err| {
            debug!("Error decoding status detail {}: {}", any.type_url, err);
            ErrorDetail::Other {
                type_url: any.type_url,
                value: any.value.into(),
            }
        })
    }

    fn from_json(value: serde_json::Value) -> ErrorDetail {
        let type_url = value
            .get("@type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let decoded = if type_url.ends_with("google.rpc.ErrorInfo") {
            pb::ErrorInfo::deserialize(&value).map(ErrorDetail::ErrorInfo)
        } else if type_url.ends_with("google.rpc.BadRequest") {
            pb::BadRequest::deserialize(&value).map(ErrorDetail::BadRequest)
        } else {
            return ErrorDetail::Other {
                type_url,
                value: value.to_string().into(),
            };
        };

        decoded.unwrap_or_else(|err| {
            debug!("Error decoding status detail {}: {}", type_url, err);
            ErrorDetail::Other {
                type_url,
                value: value.to_string().into(),
            }
        })
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("Status");

        builder.field("code", &self.code);

        if !self.message.is_empty() {
            builder.field("message", &self.message);
        }

        if !self.details.is_empty() {
            builder.field("details", &self.details);
        }

        if let Some(http_status) = self.http_status {
            builder.field("http_status", &http_status);
        }

        if !self.metadata.is_empty() {
            builder.field("metadata", &self.metadata);
        }

        builder.field("source", &self.source);

        builder.finish()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl Error for Status {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|err| (&**err) as _)
    }
}

impl Code {
    /// The code with the numeric value `i`. Values outside the known range
    /// are `Unknown`.
    pub fn from_i32(i: i32) -> Code {
        usize::try_from(i)
            .ok()
            .and_then(|i| Code::ALL.get(i).copied())
            .unwrap_or(Code::Unknown)
    }

    /// Map an HTTP status code onto the closest gRPC code.
    ///
    /// Used when a REST error body only carries its HTTP status, following
    /// the mapping in `google/rpc/code.proto`.
    pub fn from_http_status(status: u16) -> Code {
        match status {
            400 => Code::InvalidArgument,
            401 => Code::Unauthenticated,
            403 => Code::PermissionDenied,
            404 => Code::NotFound,
            409 => Code::Aborted,
            416 => Code::OutOfRange,
            429 => Code::ResourceExhausted,
            499 => Code::Cancelled,
            501 => Code::Unimplemented,
            503 => Code::Unavailable,
            504 => Code::DeadlineExceeded,
            200..=299 => Code::Ok,
            400..=499 => Code::FailedPrecondition,
            500..=599 => Code::Internal,
            _ => {
                trace!("unmapped HTTP status {status}");
                Code::Unknown
            }
        }
    }

    /// Parse the canonical `SCREAMING_SNAKE_CASE` name of a code, as found in
    /// the `status` field of a REST error body.
    pub fn from_name(name: &str) -> Option<Code> {
        Code::ALL.into_iter().find(|code| code.name() == name)
    }
}

impl From<i32> for Code {
    fn from(i: i32) -> Self {
        Code::from_i32(i)
    }
}

impl From<Code> for i32 {
    fn from(code: Code) -> i32 {
        code as i32
    }
}
