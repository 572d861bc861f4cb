use super::{Call, CallOptions, Cancelable};
use crate::{
    auth::CredentialSupplier,
    body,
    codec::{Codec, FetchParameters, RpcMessage, ServiceAddress, Streaming, WireCodec},
    descriptor::MethodKind,
    paginate::ApiCall,
    transport::{self, HttpTransport},
    BoxBody, Code, MethodDescriptor, Response, ServiceDescriptor, Status,
};
use bytes::Bytes;
use futures_util::future::{self, BoxFuture, FutureExt, TryFutureExt};
use http::HeaderMap;
use std::{fmt, future::Future, marker::PhantomData, sync::Arc, time::Duration};
use tracing::{debug, trace};

/// A unary call in flight. Resolves to the decoded response.
pub type UnaryCall<M> = Call<Response<M>>;

/// A server streaming call in flight. Resolves to the response stream once
/// the response headers have arrived.
pub type StreamingCall<M> = Call<Streaming<M>>;

/// Calls the methods of one service.
///
/// Stubs are created by [`GrpcClient::create_stub`](super::GrpcClient::create_stub)
/// and are cheap to clone. Methods are plain data, looked up by name with
/// [`method`](ServiceStub::method), so no method of the service can collide
/// with the stub's own API.
pub struct ServiceStub<T, C = WireCodec> {
    inner: Arc<Inner<T, C>>,
}

struct Inner<T, C> {
    transport: T,
    codec: C,
    credentials: Arc<dyn CredentialSupplier>,
    address: ServiceAddress,
    headers: HeaderMap,
    descriptor: Arc<ServiceDescriptor>,
}

impl<T, C> ServiceStub<T, C>
where
    T: HttpTransport,
    C: Codec,
{
    pub(crate) fn new(
        descriptor: Arc<ServiceDescriptor>,
        transport: T,
        codec: C,
        credentials: Arc<dyn CredentialSupplier>,
        address: ServiceAddress,
        headers: HeaderMap,
    ) -> Self {
        ServiceStub {
            inner: Arc::new(Inner {
                transport,
                codec,
                credentials,
                address,
                headers,
                descriptor,
            }),
        }
    }

    /// The service this stub calls.
    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.inner.descriptor
    }

    /// Where requests are sent.
    pub fn address(&self) -> &ServiceAddress {
        &self.inner.address
    }

    /// The wire codec of this stub.
    pub fn codec(&self) -> &C {
        &self.inner.codec
    }

    /// Look up a method of the service by its schema name.
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.inner.descriptor.method(name)
    }

    /// Does nothing. HTTP calls hold no connection of their own; the method
    /// exists to mirror native gRPC stubs.
    pub fn close(&self) {
        trace!("close called on stub for {}", self.inner.descriptor.name());
    }

    /// Start a unary call.
    ///
    /// The request is encoded before this returns: an error here means no
    /// network call was made. Everything that happens later, credential
    /// resolution included, is reported by the returned future.
    pub fn unary<Req, Resp>(
        &self,
        method: &MethodDescriptor,
        request: Req,
        options: &CallOptions,
    ) -> Result<UnaryCall<Resp>, Status>
    where
        Req: RpcMessage,
        Resp: RpcMessage,
    {
        self.unary_with_metadata(method, request, options, HeaderMap::new())
    }

    /// Start a unary call with extra request metadata.
    ///
    /// `metadata` and the headers of `options` are both added to the stub's
    /// headers; neither replaces the other.
    pub fn unary_with_metadata<Req, Resp>(
        &self,
        method: &MethodDescriptor,
        request: Req,
        options: &CallOptions,
        metadata: HeaderMap,
    ) -> Result<UnaryCall<Resp>, Status>
    where
        Req: RpcMessage,
        Resp: RpcMessage,
    {
        check_kind(method, MethodKind::Unary)?;
        let request = self.prepare(method, &request, options, &metadata)?;

        let credentials = self.inner.credentials.clone();
        let transport = self.inner.transport.clone();
        let codec = self.inner.codec.clone();
        let method = method.clone();

        let future = async move {
            let response = dispatch(credentials, transport, request).await?;
            let (parts, body) = response.into_parts();
            let bytes = body::collect(body).await?;

            match codec.decode::<Resp>(&method, parts.status.is_success(), &bytes) {
                Ok(message) => Ok(Response::from_parts(parts.headers, message)),
                Err(status) => {
                    debug!("{} failed: {}", method.full_name(), status);
                    Err(status.with_response_parts(parts.status, parts.headers))
                }
            }
        };

        let (canceler, registration) = Cancelable::pair();
        let future = with_timeout(options.get_timeout(), future).boxed();
        Ok(Call::new(future, registration, canceler))
    }

    /// Start a server streaming call.
    ///
    /// The returned future resolves once the response headers arrive. A
    /// successful response becomes a [`Streaming`] of decoded messages; any
    /// other response is read in full and decoded as a single error, and
    /// nothing is streamed. The timeout of `options` only covers the wait
    /// for the response headers.
    pub fn server_streaming<Req, Resp>(
        &self,
        method: &MethodDescriptor,
        request: Req,
        options: &CallOptions,
    ) -> Result<StreamingCall<Resp>, Status>
    where
        Req: RpcMessage,
        Resp: RpcMessage,
    {
        check_kind(method, MethodKind::ServerStreaming)?;
        let request = self.prepare(method, &request, options, &HeaderMap::new())?;

        let credentials = self.inner.credentials.clone();
        let transport = self.inner.transport.clone();
        let codec = self.inner.codec.clone();
        let method = method.clone();
        let (canceler, registration) = Cancelable::pair();
        let stream_canceler = canceler.clone();

        let future = async move {
            let response = dispatch(credentials, transport, request).await?;
            let (parts, body) = response.into_parts();

            if !parts.status.is_success() {
                let bytes = body::collect(body).await?;
                let status = match codec.decode::<Resp>(&method, false, &bytes) {
                    Err(status) => status,
                    Ok(_) => Status::new(
                        Code::from_http_status(parts.status.as_u16()),
                        format!("HTTP {}", parts.status),
                    ),
                };
                debug!("{} failed: {}", method.full_name(), status);
                return Err(status.with_response_parts(parts.status, parts.headers));
            }

            let decoder = Box::new(move |element: &[u8]| {
                codec.decode_stream_element::<Resp>(&method, element)
            });
            Ok(Streaming::new(body, decoder, stream_canceler))
        };

        let future = with_timeout(options.get_timeout(), future).boxed();
        Ok(Call::new(future, registration, canceler))
    }

    /// Start a unary call and report its outcome to `callback`.
    ///
    /// The call runs on the current tokio runtime. `callback` runs at most
    /// once. If the call is cancelled before it completes, `callback` is
    /// dropped without being called. Encoding errors are returned directly
    /// and `callback` is never called, as is a `FailedPrecondition` when
    /// there is no tokio runtime to run the call on.
    pub fn invoke<Req, Resp, F>(
        &self,
        method: &MethodDescriptor,
        request: Req,
        options: &CallOptions,
        metadata: HeaderMap,
        callback: F,
    ) -> Result<Cancelable, Status>
    where
        Req: RpcMessage,
        Resp: RpcMessage,
        F: FnOnce(Result<Resp, Status>) + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|err| {
            let mut status = Status::new(
                Code::FailedPrecondition,
                format!("{} was invoked outside a tokio runtime", method.full_name()),
            );
            status.set_source(Arc::new(err));
            status
        })?;
        let call = self.unary_with_metadata::<Req, Resp>(method, request, options, metadata)?;
        let canceler = call.canceler();
        let cancelled = canceler.clone();
        let name = method.full_name();

        runtime.spawn(async move {
            let result = call.await;
            if let Err(status) = &result {
                if status.is_abort() && cancelled.is_cancelled() {
                    trace!("{name} cancelled, not reporting the abort");
                    return;
                }
            }
            callback(result.map(Response::into_inner));
        });

        Ok(canceler)
    }

    /// Bind `method` into an [`ApiCall`], as used by
    /// [`PagedCall`](crate::paginate::PagedCall).
    pub fn api_call<Req, Resp>(&self, method: &MethodDescriptor) -> UnaryMethod<T, C, Req, Resp> {
        UnaryMethod {
            stub: self.clone(),
            method: method.clone(),
            _marker: PhantomData,
        }
    }

    fn prepare<Req: RpcMessage>(
        &self,
        method: &MethodDescriptor,
        request: &Req,
        options: &CallOptions,
        metadata: &HeaderMap,
    ) -> Result<http::Request<Bytes>, Status> {
        let mut params = self.inner.codec.encode(method, &self.inner.address, request)?;

        append_all(&mut params.headers, &self.inner.headers);
        append_all(&mut params.headers, options.get_headers());
        append_all(&mut params.headers, metadata);

        if params.is_bodyless() && !params.body.is_empty() {
            trace!("dropping body of {} request to {}", params.method, params.url);
            params.body = Bytes::new();
        }

        let FetchParameters {
            method: verb,
            url,
            headers,
            body,
        } = params;

        let mut request = http::Request::builder()
            .method(verb)
            .uri(url)
            .body(body)
            .map_err(|err| Status::invalid_argument(format!("invalid request: {err}")))?;
        *request.headers_mut() = headers;
        Ok(request)
    }
}

/// Resolve credential headers, layer the call headers on top, and send.
async fn dispatch<T: HttpTransport>(
    credentials: Arc<dyn CredentialSupplier>,
    transport: T,
    mut request: http::Request<Bytes>,
) -> Result<http::Response<BoxBody>, Status> {
    let mut headers = credentials.request_headers().await.map_err(|err| {
        let mut status = Status::unauthenticated(format!("failed to resolve credentials: {err}"));
        status.set_source(Arc::from(err));
        status
    })?;

    append_all(&mut headers, request.headers());
    *request.headers_mut() = headers;

    trace!("sending {} {}", request.method(), request.uri());
    transport::send(transport, request).await
}

async fn with_timeout<F, R>(timeout: Option<Duration>, future: F) -> Result<R, Status>
where
    F: Future<Output = Result<R, Status>>,
{
    match timeout {
        Some(duration) => tokio::time::timeout(duration, future)
            .await
            .map_err(|_| Status::deadline_exceeded(format!("call exceeded its timeout of {duration:?}")))?,
        None => future.await,
    }
}

fn append_all(target: &mut HeaderMap, source: &HeaderMap) {
    for (name, value) in source {
        target.append(name, value.clone());
    }
}

fn check_kind(method: &MethodDescriptor, expected: MethodKind) -> Result<(), Status> {
    match method.kind() {
        kind if kind == expected => Ok(()),
        kind @ (MethodKind::ClientStreaming | MethodKind::BidiStreaming) => Err(Status::unimplemented(
            format!("{} is a {kind:?} method, which cannot be called over HTTP", method.full_name()),
        )),
        kind => Err(Status::invalid_argument(format!(
            "{} is a {kind:?} method, not {expected:?}",
            method.full_name()
        ))),
    }
}

impl<T, C> Clone for ServiceStub<T, C> {
    fn clone(&self) -> Self {
        ServiceStub {
            inner: self.inner.clone(),
        }
    }
}

impl<T, C: fmt::Debug> fmt::Debug for ServiceStub<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceStub")
            .field("service", &self.inner.descriptor.name())
            .field("address", &self.inner.address)
            .field("codec", &self.inner.codec)
            .finish()
    }
}

/// One unary method of a stub, usable as an [`ApiCall`].
pub struct UnaryMethod<T, C, Req, Resp> {
    stub: ServiceStub<T, C>,
    method: MethodDescriptor,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<T, C, Req, Resp> ApiCall<Req, Resp> for UnaryMethod<T, C, Req, Resp>
where
    T: HttpTransport,
    C: Codec,
    Req: RpcMessage,
    Resp: RpcMessage,
{
    fn call(&self, request: Req, options: &CallOptions) -> BoxFuture<'static, Result<Resp, Status>> {
        match self.stub.unary::<Req, Resp>(&self.method, request, options) {
            Ok(call) => call.map_ok(Response::into_inner).boxed(),
            Err(status) => future::ready(Err(status)).boxed(),
        }
    }
}

impl<T, C, Req, Resp> Clone for UnaryMethod<T, C, Req, Resp> {
    fn clone(&self) -> Self {
        UnaryMethod {
            stub: self.stub.clone(),
            method: self.method.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, C, Req, Resp> fmt::Debug for UnaryMethod<T, C, Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryMethod")
            .field("method", &self.method.full_name())
            .finish()
    }
}
