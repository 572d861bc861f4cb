use grpc_fallback::{client::CallOptions, Protocol};
use http::{header::CONTENT_TYPE, Method, StatusCode};
use integration_tests::{
    client, echo_service, identity_service, method,
    mock::{self, MockServer},
    pb::{EchoRequest, EchoResponse, GetUserRequest, User},
    stub, trace_init, ECHO,
};
use prost::Message;
use serde_json::json;

#[tokio::test]
async fn proto_echo() {
    trace_init();

    let server = MockServer::start(|request| {
        let echoed = EchoRequest::decode(request.body.clone()).unwrap();
        let response = EchoResponse {
            content: echoed.content,
        };
        mock::respond(StatusCode::OK, response.encode_to_vec())
    })
    .await;

    let service = echo_service();
    let stub = stub(&client(Protocol::Proto), service.clone(), server.port());
    let request = EchoRequest {
        content: "hello world".into(),
        severity: 1,
    };

    let response = stub
        .unary::<_, EchoResponse>(&method(&service, "Echo"), request, &CallOptions::new())
        .unwrap()
        .await
        .unwrap();

    assert_eq!(response.get_ref().content, "hello world");

    let received = server.last_request();
    assert_eq!(received.method, Method::POST);
    assert_eq!(received.uri.path(), format!("/$rpc/{ECHO}/Echo"));
    assert_eq!(received.headers[CONTENT_TYPE], "application/x-protobuf");
}

#[tokio::test]
async fn rest_echo() {
    trace_init();

    let server = MockServer::start(|request| {
        let body = request.json();
        mock::json(StatusCode::OK, json!({ "content": body["content"] }))
    })
    .await;

    let service = echo_service();
    let stub = stub(&client(Protocol::Rest), service.clone(), server.port());
    let request = EchoRequest {
        content: "hello world".into(),
        severity: 2,
    };

    let response = stub
        .unary::<_, EchoResponse>(&method(&service, "Echo"), request, &CallOptions::new())
        .unwrap()
        .await
        .unwrap();

    assert_eq!(response.into_inner().content, "hello world");

    let received = server.last_request();
    assert_eq!(received.method, Method::POST);
    assert_eq!(received.uri.path(), "/v1beta1/echo:echo");
    assert_eq!(received.headers[CONTENT_TYPE], "application/json");
    assert_eq!(
        received.json(),
        json!({ "content": "hello world", "severity": 2 })
    );
}

#[tokio::test]
async fn rest_get_sends_no_body() {
    trace_init();

    let server = MockServer::start(|_| {
        mock::json(
            StatusCode::OK,
            json!({ "name": "users/42", "displayName": "Ada" }),
        )
    })
    .await;

    let service = identity_service();
    let stub = stub(&client(Protocol::Rest), service.clone(), server.port());
    let request = GetUserRequest {
        name: "users/42".into(),
        view: "FULL".into(),
    };

    let user = stub
        .unary::<_, User>(&method(&service, "GetUser"), request, &CallOptions::new())
        .unwrap()
        .await
        .unwrap()
        .into_inner();

    assert_eq!(user.display_name, "Ada");

    let received = server.last_request();
    assert_eq!(received.method, Method::GET);
    assert_eq!(received.uri.path(), "/v1beta1/users/42");
    assert_eq!(received.uri.query(), Some("view=FULL"));
    assert!(received.body.is_empty());
}

#[tokio::test]
async fn invoke_reports_to_callback() {
    trace_init();

    let server = MockServer::start(|_| mock::json(StatusCode::OK, json!({ "content": "hi" }))).await;

    let service = echo_service();
    let stub = stub(&client(Protocol::Rest), service.clone(), server.port());
    let (tx, rx) = tokio::sync::oneshot::channel();

    stub.invoke::<_, EchoResponse, _>(
        &method(&service, "Echo"),
        EchoRequest::default(),
        &CallOptions::new(),
        Default::default(),
        move |result| {
            let _ = tx.send(result);
        },
    )
    .unwrap();

    let response = rx.await.unwrap().unwrap();
    assert_eq!(response.content, "hi");
}
