use grpc_fallback::{
    client::StubOptions, transport::HyperTransport, GrpcClient, HttpRule, MethodDescriptor,
    Protocol, ServiceDescriptor, ServiceStub,
};
use std::sync::Arc;

pub mod pb {
    use grpc_fallback::paginate::{PagedRequest, PagedResponse};
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct EchoRequest {
        #[prost(string, tag = "1")]
        pub content: String,
        #[prost(int32, tag = "2")]
        pub severity: i32,
    }

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct EchoResponse {
        #[prost(string, tag = "1")]
        pub content: String,
    }

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct GetUserRequest {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(string, tag = "2")]
        pub view: String,
    }

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct User {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(string, tag = "2")]
        pub display_name: String,
    }

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct PagedExpandRequest {
        #[prost(string, tag = "1")]
        pub content: String,
        #[prost(int32, tag = "2")]
        pub page_size: i32,
        #[prost(string, tag = "3")]
        pub page_token: String,
    }

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct PagedExpandResponse {
        #[prost(message, repeated, tag = "1")]
        pub responses: Vec<EchoResponse>,
        #[prost(string, tag = "2")]
        pub next_page_token: String,
    }

    impl PagedRequest for PagedExpandRequest {
        fn set_page_token(&mut self, token: String) {
            self.page_token = token;
        }

        fn set_page_size(&mut self, size: i32) {
            self.page_size = size;
        }
    }

    impl PagedResponse for PagedExpandResponse {
        type Resource = EchoResponse;

        fn next_page_token(&self) -> &str {
            &self.next_page_token
        }

        fn into_resources(self) -> Vec<EchoResponse> {
            self.responses
        }
    }
}

pub mod mock {
    use bytes::Bytes;
    use futures_util::stream;
    use http::{HeaderMap, Method, StatusCode, Uri};
    use http_body_util::{combinators::BoxBody, BodyExt, Full, StreamBody};
    use hyper::{
        body::{Frame, Incoming},
        server::conn::http1,
        service::service_fn,
    };
    use hyper_util::rt::TokioIo;
    use std::{
        convert::Infallible,
        net::SocketAddr,
        sync::{Arc, Mutex},
    };
    use tokio::{net::TcpListener, task::JoinHandle};

    pub type MockBody = BoxBody<Bytes, Infallible>;

    /// A request as received by [`MockServer`].
    #[derive(Clone, Debug)]
    pub struct Recorded {
        pub method: Method,
        pub uri: Uri,
        pub headers: HeaderMap,
        pub body: Bytes,
    }

    impl Recorded {
        pub fn json(&self) -> serde_json::Value {
            serde_json::from_slice(&self.body).unwrap()
        }
    }

    /// An HTTP/1.1 server on a random local port answering every request
    /// with `handler`. Stops when dropped.
    pub struct MockServer {
        addr: SocketAddr,
        requests: Arc<Mutex<Vec<Recorded>>>,
        handle: JoinHandle<()>,
    }

    impl MockServer {
        pub async fn start<F>(handler: F) -> MockServer
        where
            F: Fn(&Recorded) -> http::Response<MockBody> + Send + Sync + 'static,
        {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let handler = Arc::new(handler);

            let recorded = requests.clone();
            let handle = tokio::spawn(async move {
                loop {
                    let (io, _) = match listener.accept().await {
                        Ok(conn) => conn,
                        Err(_) => continue,
                    };
                    let handler = handler.clone();
                    let recorded = recorded.clone();

                    tokio::spawn(async move {
                        let service = service_fn(move |request: http::Request<Incoming>| {
                            let handler = handler.clone();
                            let recorded = recorded.clone();
                            async move {
                                let (parts, body) = request.into_parts();
                                let body = body.collect().await?.to_bytes();
                                let request = Recorded {
                                    method: parts.method,
                                    uri: parts.uri,
                                    headers: parts.headers,
                                    body,
                                };
                                let response = handler(&request);
                                recorded.lock().unwrap().push(request);
                                Ok::<_, hyper::Error>(response)
                            }
                        });
                        let _ = http1::Builder::new()
                            .serve_connection(TokioIo::new(io), service)
                            .await;
                    });
                }
            });

            MockServer {
                addr,
                requests,
                handle,
            }
        }

        pub fn port(&self) -> u16 {
            self.addr.port()
        }

        pub fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }

        pub fn last_request(&self) -> Recorded {
            self.requests().pop().expect("no request received")
        }
    }

    impl Drop for MockServer {
        fn drop(&mut self) {
            self.handle.abort();
        }
    }

    pub fn respond(status: StatusCode, body: impl Into<Bytes>) -> http::Response<MockBody> {
        http::Response::builder()
            .status(status)
            .body(Full::new(body.into()).boxed())
            .unwrap()
    }

    pub fn json(status: StatusCode, value: serde_json::Value) -> http::Response<MockBody> {
        let mut response = respond(status, value.to_string());
        response.headers_mut().insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        response
    }

    /// A body sent as one frame per chunk.
    pub fn chunked(chunks: &[&'static str]) -> http::Response<MockBody> {
        let frames = chunks
            .iter()
            .map(|chunk| Ok(Frame::data(Bytes::from_static(chunk.as_bytes()))))
            .collect::<Vec<_>>();
        http::Response::new(StreamBody::new(stream::iter(frames)).boxed())
    }

    /// A body that sends `chunk` and then never finishes.
    pub fn stalled(chunk: &'static str) -> http::Response<MockBody> {
        let first = stream::iter([Ok(Frame::data(Bytes::from_static(chunk.as_bytes())))]);
        let frames = futures_util::StreamExt::chain(first, stream::pending());
        http::Response::new(StreamBody::new(frames).boxed())
    }
}

pub const ECHO: &str = "google.showcase.v1beta1.Echo";
pub const IDENTITY: &str = "google.showcase.v1beta1.Identity";

pub fn echo_service() -> Arc<ServiceDescriptor> {
    Arc::new(
        ServiceDescriptor::new(ECHO)
            .with_method(
                MethodDescriptor::unary(ECHO, "Echo")
                    .with_http(HttpRule::post("/v1beta1/echo:echo").with_body("*")),
            )
            .with_method(
                MethodDescriptor::server_streaming(ECHO, "Expand")
                    .with_http(HttpRule::post("/v1beta1/echo:expand").with_body("*")),
            )
            .with_method(
                MethodDescriptor::unary(ECHO, "PagedExpand")
                    .with_http(HttpRule::post("/v1beta1/echo:pagedExpand").with_body("*")),
            ),
    )
}

pub fn identity_service() -> Arc<ServiceDescriptor> {
    Arc::new(
        ServiceDescriptor::new(IDENTITY).with_method(
            MethodDescriptor::unary(IDENTITY, "GetUser")
                .with_http(HttpRule::get("/v1beta1/{name=users/*}")),
        ),
    )
}

pub fn method(service: &ServiceDescriptor, name: &str) -> MethodDescriptor {
    service.method(name).cloned().expect("unknown method")
}

pub fn client(protocol: Protocol) -> GrpcClient<HyperTransport> {
    GrpcClient::builder()
        .protocol(protocol)
        .scheme("http")
        .build()
        .unwrap()
}

pub fn stub(
    client: &GrpcClient<HyperTransport>,
    service: Arc<ServiceDescriptor>,
    port: u16,
) -> ServiceStub<HyperTransport> {
    client
        .create_stub(service, StubOptions::new().service_path("127.0.0.1").port(port))
        .unwrap()
}

pub fn trace_init() {
    let _ = tracing_subscriber::fmt::try_init();
}
