use grpc_fallback::{
    auth::StaticCredentials,
    client::{CallOptions, StubOptions},
    GrpcClient, Protocol, VERSION,
};
use http::{
    header::{AUTHORIZATION, USER_AGENT},
    HeaderMap, HeaderValue, StatusCode,
};
use integration_tests::{
    echo_service, method,
    mock::{self, MockServer},
    pb::{EchoRequest, EchoResponse},
    trace_init,
};
use serde_json::json;

fn header_map(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        headers.append(*name, HeaderValue::from_static(value));
    }
    headers
}

#[tokio::test]
async fn headers_are_layered() {
    trace_init();

    let server = MockServer::start(|_| mock::json(StatusCode::OK, json!({ "content": "ok" }))).await;

    let client = GrpcClient::builder()
        .protocol(Protocol::Rest)
        .scheme("http")
        .credentials(StaticCredentials::new(header_map(&[
            ("authorization", "Bearer token"),
            ("x-goog-user-project", "showcase"),
        ])))
        .user_agent("showcase-client/1.0")
        .unwrap()
        .build()
        .unwrap();

    let service = echo_service();
    let stub = client
        .create_stub(
            service.clone(),
            StubOptions::new()
                .service_path("127.0.0.1")
                .port(server.port())
                .headers(header_map(&[("x-stub", "stub")])),
        )
        .unwrap();

    let options = CallOptions::new().headers(header_map(&[("x-goog-request-params", "name=a")]));
    let metadata = header_map(&[("x-goog-request-params", "parent=b")]);

    stub.unary_with_metadata::<_, EchoResponse>(
        &method(&service, "Echo"),
        EchoRequest::default(),
        &options,
        metadata,
    )
    .unwrap()
    .await
    .unwrap();

    let headers = server.last_request().headers;
    assert_eq!(headers[AUTHORIZATION], "Bearer token");
    assert_eq!(headers["x-goog-user-project"], "showcase");
    assert_eq!(headers[USER_AGENT], "showcase-client/1.0");
    assert_eq!(headers["x-stub"], "stub");
    assert_eq!(
        headers["x-goog-api-client"],
        format!("grpc-fallback/{VERSION} rest/{VERSION}").as_str()
    );

    let params = headers
        .get_all("x-goog-request-params")
        .iter()
        .map(|value| value.to_str().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(params, vec!["name=a", "parent=b"]);
}
