use grpc_fallback::{client::CallOptions, pb, Code, ErrorDetail, Protocol};
use http::StatusCode;
use integration_tests::{
    client, echo_service, method,
    mock::{self, MockServer},
    pb::{EchoRequest, EchoResponse},
    stub, trace_init,
};
use prost::Message;
use serde_json::json;

#[tokio::test]
async fn rest_error_with_error_info() {
    trace_init();

    let server = MockServer::start(|_| {
        mock::json(
            StatusCode::FORBIDDEN,
            json!({
                "error": {
                    "code": 403,
                    "message": "Method doesn't allow unregistered callers",
                    "status": "PERMISSION_DENIED",
                    "details": [{
                        "@type": "type.googleapis.com/google.rpc.ErrorInfo",
                        "reason": "API_KEY_INVALID",
                        "domain": "googleapis.com",
                        "metadata": { "service": "showcase.googleapis.com" }
                    }]
                }
            }),
        )
    })
    .await;

    let service = echo_service();
    let stub = stub(&client(Protocol::Rest), service.clone(), server.port());

    let status = stub
        .unary::<_, EchoResponse>(&method(&service, "Echo"), EchoRequest::default(), &CallOptions::new())
        .unwrap()
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::PermissionDenied);
    assert_eq!(status.message(), "Method doesn't allow unregistered callers");
    assert_eq!(status.reason(), Some("API_KEY_INVALID"));
    assert_eq!(status.domain(), Some("googleapis.com"));
    assert_eq!(
        status
            .error_metadata()
            .and_then(|metadata| metadata.get("service"))
            .map(String::as_str),
        Some("showcase.googleapis.com")
    );
    assert_eq!(status.http_status(), Some(403));
}

#[tokio::test]
async fn proto_error_is_a_rpc_status() {
    trace_init();

    let server = MockServer::start(|_| {
        let info = pb::ErrorInfo {
            reason: "RATE_LIMITED".into(),
            domain: "showcase.googleapis.com".into(),
            ..Default::default()
        };
        let status = pb::Status {
            code: Code::ResourceExhausted as i32,
            message: "Too many requests".into(),
            details: vec![prost_types_any(pb::ErrorInfo::TYPE_URL, info.encode_to_vec())],
        };
        mock::respond(StatusCode::TOO_MANY_REQUESTS, status.encode_to_vec())
    })
    .await;

    let service = echo_service();
    let stub = stub(&client(Protocol::Proto), service.clone(), server.port());

    let status = stub
        .unary::<_, EchoResponse>(&method(&service, "Echo"), EchoRequest::default(), &CallOptions::new())
        .unwrap()
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::ResourceExhausted);
    assert_eq!(status.message(), "Too many requests");
    assert!(matches!(status.details(), [ErrorDetail::ErrorInfo(_)]));
    assert_eq!(status.reason(), Some("RATE_LIMITED"));
}

#[tokio::test]
async fn html_error_page_takes_code_from_http_status() {
    trace_init();

    let server = MockServer::start(|_| {
        mock::respond(
            StatusCode::SERVICE_UNAVAILABLE,
            "<html>upstream unavailable</html>",
        )
    })
    .await;

    let service = echo_service();
    let stub = stub(&client(Protocol::Rest), service.clone(), server.port());

    let status = stub
        .unary::<_, EchoResponse>(&method(&service, "Echo"), EchoRequest::default(), &CallOptions::new())
        .unwrap()
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Unavailable);
    assert_eq!(status.http_status(), Some(503));
    assert!(status.message().contains("upstream unavailable"));
}

#[tokio::test]
async fn unwrapped_json_error_takes_code_from_http_status() {
    trace_init();

    let server = MockServer::start(|_| {
        mock::json(StatusCode::FORBIDDEN, json!({ "message": "forbidden" }))
    })
    .await;

    let service = echo_service();
    let stub = stub(&client(Protocol::Rest), service.clone(), server.port());

    let status = stub
        .unary::<_, EchoResponse>(&method(&service, "Echo"), EchoRequest::default(), &CallOptions::new())
        .unwrap()
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::PermissionDenied);
    assert_eq!(status.http_status(), Some(403));
}

#[tokio::test]
async fn empty_proto_error_body_takes_code_from_http_status() {
    trace_init();

    let server = MockServer::start(|_| mock::respond(StatusCode::GATEWAY_TIMEOUT, "")).await;

    let service = echo_service();
    let stub = stub(&client(Protocol::Proto), service.clone(), server.port());

    let status = stub
        .unary::<_, EchoResponse>(&method(&service, "Echo"), EchoRequest::default(), &CallOptions::new())
        .unwrap()
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::DeadlineExceeded);
    assert_eq!(status.http_status(), Some(504));
}

#[tokio::test]
async fn connection_refused_is_unavailable() {
    trace_init();

    // Bind then drop to find a port nothing listens on.
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let service = echo_service();
    let stub = stub(&client(Protocol::Rest), service.clone(), port);

    let status = stub
        .unary::<_, EchoResponse>(&method(&service, "Echo"), EchoRequest::default(), &CallOptions::new())
        .unwrap()
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Unavailable);
}

fn prost_types_any(type_url: &str, value: Vec<u8>) -> prost_types::Any {
    prost_types::Any {
        type_url: type_url.to_owned(),
        value,
    }
}
