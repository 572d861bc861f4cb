use futures_util::StreamExt;
use grpc_fallback::{client::CallOptions, Code, Protocol};
use integration_tests::{
    client, echo_service, method,
    mock::{self, MockServer},
    pb::{EchoRequest, EchoResponse},
    stub, trace_init,
};
use std::time::Duration;
use tokio::sync::oneshot;

#[tokio::test]
async fn cancel_aborts_pending_call() {
    trace_init();

    let server = MockServer::start(|_| mock::stalled("{\"content\":")).await;
    let service = echo_service();
    let stub = stub(&client(Protocol::Rest), service.clone(), server.port());

    let call = stub
        .unary::<_, EchoResponse>(&method(&service, "Echo"), EchoRequest::default(), &CallOptions::new())
        .unwrap();
    let canceler = call.canceler();

    let handle = tokio::spawn(call);
    tokio::time::sleep(Duration::from_millis(50)).await;
    canceler.cancel();
    canceler.cancel();

    let status = handle.await.unwrap().unwrap_err();
    assert_eq!(status.code(), Code::Cancelled);
    assert!(status.is_abort());
    assert!(canceler.is_cancelled());
}

#[tokio::test]
async fn cancelled_invoke_never_calls_back() {
    trace_init();

    let server = MockServer::start(|_| mock::stalled("{")).await;
    let service = echo_service();
    let stub = stub(&client(Protocol::Rest), service.clone(), server.port());
    let (tx, rx) = oneshot::channel::<()>();

    let canceler = stub
        .invoke::<_, EchoResponse, _>(
            &method(&service, "Echo"),
            EchoRequest::default(),
            &CallOptions::new(),
            Default::default(),
            move |_| {
                let _ = tx.send(());
            },
        )
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    canceler.cancel();

    // The callback is dropped unused, closing the channel.
    assert!(rx.await.is_err());
}

#[tokio::test]
async fn cancel_ends_stream_quietly() {
    trace_init();

    let server = MockServer::start(|_| mock::stalled("[{\"content\":\"first\"},")).await;
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

    assert_eq!(stream.next().await.unwrap().unwrap().content, "first");

    stream.cancel();

    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn timeout_is_deadline_exceeded() {
    trace_init();

    let server = MockServer::start(|_| mock::stalled("{")).await;
    let service = echo_service();
    let stub = stub(&client(Protocol::Rest), service.clone(), server.port());
    let options = CallOptions::new().timeout(Duration::from_millis(100));

    let status = stub
        .unary::<_, EchoResponse>(&method(&service, "Echo"), EchoRequest::default(), &options)
        .unwrap()
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::DeadlineExceeded);
    assert!(!status.is_abort());
}
