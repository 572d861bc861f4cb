use futures_util::StreamExt;
use grpc_fallback::{client::CallOptions, Code, Protocol};
use http::StatusCode;
use integration_tests::{
    client, echo_service, method,
    mock::{self, MockServer},
    pb::{EchoRequest, EchoResponse},
    stub, trace_init,
};
use serde_json::json;

#[tokio::test]
async fn expand_across_chunks() {
    trace_init();

    let server = MockServer::start(|_| {
        mock::chunked(&[
            "[{\"content\":\"The\"},{\"con",
            "tent\":\"rain in\"}",
            ",{\"content\":\"Spain\"}",
            "]",
        ])
    })
    .await;

    for protocol in [Protocol::Proto, Protocol::Rest] {
        let service = echo_service();
        let stub = stub(&client(protocol), service.clone(), server.port());
        let request = EchoRequest {
            content: "The rain in Spain".into(),
            ..Default::default()
        };

        let stream = stub
            .server_streaming::<_, EchoResponse>(&method(&service, "Expand"), request, &CallOptions::new())
            .unwrap()
            .await
            .unwrap();

        let words = stream
            .map(|message| message.unwrap().content)
            .collect::<Vec<_>>()
            .await;

        assert_eq!(words, vec!["The", "rain in", "Spain"], "{protocol}");
    }
}

#[tokio::test]
async fn failed_expand_is_a_single_error() {
    trace_init();

    let server = MockServer::start(|_| {
        mock::json(
            StatusCode::BAD_REQUEST,
            json!({ "error": { "code": 400, "message": "content is required", "status": "INVALID_ARGUMENT" } }),
        )
    })
    .await;

    let service = echo_service();
    let stub = stub(&client(Protocol::Rest), service.clone(), server.port());

    let status = stub
        .server_streaming::<_, EchoResponse>(
            &method(&service, "Expand"),
            EchoRequest::default(),
            &CallOptions::new(),
        )
        .unwrap()
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(status.message(), "content is required");
}

#[tokio::test]
async fn truncated_expand_ends_with_error() {
    trace_init();

    let server = MockServer::start(|_| mock::chunked(&["[{\"content\":\"one\"},{\"cont"])).await;

    let service = echo_service();
    let stub = stub(&client(Protocol::Rest), service.clone(), server.port());

    let mut stream = stub
        .server_streaming::<_, EchoResponse>(
            &method(&service, "Expand"),
            EchoRequest::default(),
            &CallOptions::new(),
        )
        .unwrap()
        .await
        .unwrap();

    assert_eq!(stream.message().await.unwrap().unwrap().content, "one");
    let status = stream.message().await.unwrap_err();
    assert_eq!(status.code(), Code::Internal);
}
