use http::HeaderMap;
use std::time::Duration;

/// Options applied to every call of one [`ServiceStub`](super::ServiceStub).
///
/// ```rust
/// # use grpc_fallback::client::StubOptions;
/// let options = StubOptions::new()
///     .service_path("localhost")
///     .port(7469)
///     .scheme("http");
/// ```
#[derive(Clone, Debug, Default)]
pub struct StubOptions {
    pub(crate) service_path: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) scheme: Option<String>,
    pub(crate) headers: HeaderMap,
}

impl StubOptions {
    /// Options that use the service's default host and the client's scheme
    /// and port.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the host declared by the service.
    pub fn service_path(self, host: impl Into<String>) -> Self {
        StubOptions {
            service_path: Some(host.into()),
            ..self
        }
    }

    /// Override the port.
    pub fn port(self, port: u16) -> Self {
        StubOptions {
            port: Some(port),
            ..self
        }
    }

    /// Override the URL scheme.
    pub fn scheme(self, scheme: impl Into<String>) -> Self {
        StubOptions {
            scheme: Some(scheme.into()),
            ..self
        }
    }

    /// Headers sent with every call of the stub.
    pub fn headers(self, headers: HeaderMap) -> Self {
        StubOptions { headers, ..self }
    }
}

/// Per call options.
#[derive(Clone, Debug, Default)]
pub struct CallOptions {
    timeout: Option<Duration>,
    headers: HeaderMap,
}

impl CallOptions {
    /// Options without a timeout or extra headers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the call with `DeadlineExceeded` if it takes longer than
    /// `timeout`, credential resolution included.
    pub fn timeout(self, timeout: Duration) -> Self {
        CallOptions {
            timeout: Some(timeout),
            ..self
        }
    }

    /// Extra headers for this call. They are added to, never replace, the
    /// headers of the stub and of the credentials.
    pub fn headers(self, headers: HeaderMap) -> Self {
        CallOptions { headers, ..self }
    }

    /// The timeout, if any.
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The extra headers.
    pub fn get_headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A mutable reference to the extra headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }
}
