use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client, Error, ResponseFuture},
    rt::TokioExecutor,
};
use std::{
    task::{Context, Poll},
    time::Duration,
};
use tower_service::Service;

/// The default [`HttpTransport`](super::HttpTransport), a pooled HTTP/1.1 and
/// HTTP/2 client backed by `hyper-util`.
///
/// Connections are made over plain TCP. To reach `https` endpoints, provide a
/// TLS capable transport through
/// [`GrpcClientBuilder::transport`](crate::client::GrpcClientBuilder::transport).
#[derive(Clone, Debug)]
pub struct HyperTransport {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HyperTransport {
    /// Create a transport with default connection settings.
    pub fn new() -> Self {
        Self::with_connector(HttpConnector::new())
    }

    /// Create a transport that gives up connecting after `timeout`.
    pub fn with_connect_timeout(timeout: Duration) -> Self {
        let mut http = HttpConnector::new();
        http.set_connect_timeout(Some(timeout));
        Self::with_connector(http)
    }

    fn with_connector(mut http: HttpConnector) -> Self {
        http.enforce_http(false);
        http.set_nodelay(true);

        HyperTransport {
            client: Client::builder(TokioExecutor::new()).build(http),
        }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<http::Request<Bytes>> for HyperTransport {
    type Response = http::Response<Incoming>;
    type Error = Error;
    type Future = ResponseFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<Bytes>) -> Self::Future {
        self.client.request(request.map(Full::new))
    }
}
