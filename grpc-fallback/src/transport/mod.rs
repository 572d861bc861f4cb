//! The HTTP capability used by stubs to send requests.
//!
//! Any [`tower_service::Service`] that takes an `http::Request<Bytes>` and
//! returns an `http::Response` with a `Bytes` body is an [`HttpTransport`].
//! The transport is picked once, when the [`GrpcClient`](crate::GrpcClient)
//! is built; stubs clone it for every call.

#[cfg(feature = "transport")]
mod hyper;

#[cfg(feature = "transport")]
pub use self::hyper::HyperTransport;

use crate::{body, BoxBody, BoxError, Status};
use bytes::Bytes;
use http_body::Body;
use pin_project::pin_project;
use std::{
    future::Future,
    pin::Pin,
    task::{ready, Context, Poll},
};
use tower_service::Service;

/// Sends encoded requests over HTTP.
///
/// This trait is implemented for every suitable [`Service`]; it exists to
/// name the bounds the stubs need in one place.
pub trait HttpTransport: Clone + Send + Sync + 'static {
    /// The future response value.
    type Future: Future<Output = Result<http::Response<BoxBody>, Status>> + Send + 'static;

    /// Returns `Ready` when the transport is able to send a request.
    ///
    /// Reference [`Service::poll_ready`].
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Status>>;

    /// Send the request.
    ///
    /// Reference [`Service::call`].
    fn call(&mut self, request: http::Request<Bytes>) -> Self::Future;
}

impl<T, B> HttpTransport for T
where
    T: Service<http::Request<Bytes>, Response = http::Response<B>> + Clone + Send + Sync + 'static,
    T::Error: Into<BoxError>,
    T::Future: Send + 'static,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    type Future = ResponseFuture<T::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Status>> {
        Service::poll_ready(self, cx).map_err(|err| Status::from_transport_error(err.into()))
    }

    fn call(&mut self, request: http::Request<Bytes>) -> Self::Future {
        ResponseFuture {
            inner: Service::call(self, request),
        }
    }
}

/// Response future of a [`Service`] used as an [`HttpTransport`].
#[pin_project]
#[derive(Debug)]
pub struct ResponseFuture<F> {
    #[pin]
    inner: F,
}

impl<F, B, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<http::Response<B>, E>>,
    E: Into<BoxError>,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    type Output = Result<http::Response<BoxBody>, Status>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let response = ready!(self.project().inner.poll(cx))
            .map_err(|err| Status::from_transport_error(err.into()))?;
        Poll::Ready(Ok(response.map(body::boxed)))
    }
}

/// Wait for `transport` to be ready, then send `request`.
pub(crate) async fn send<T: HttpTransport>(
    mut transport: T,
    request: http::Request<Bytes>,
) -> Result<http::Response<BoxBody>, Status> {
    futures_util::future::poll_fn(|cx| transport.poll_ready(cx)).await?;
    transport.call(request).await
}
