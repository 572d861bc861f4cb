use futures_util::TryStreamExt;
use grpc_fallback::{
    paginate::{CallSettings, PageDescriptor, PagedCall, PagedResult},
    Protocol,
};
use http::StatusCode;
use integration_tests::{
    client, echo_service, method,
    mock::{self, MockServer, Recorded},
    pb::{PagedExpandRequest, PagedExpandResponse},
    stub, trace_init,
};
use serde_json::json;

/// Splits the request content into words and serves them `pageSize` at a
/// time. The page token is the index of the first word of the page.
fn paged_expand(request: &Recorded) -> http::Response<mock::MockBody> {
    let body = request.json();
    let words = body["content"]
        .as_str()
        .unwrap_or_default()
        .split(' ')
        .map(str::to_owned)
        .collect::<Vec<_>>();
    let size = body["pageSize"].as_u64().filter(|size| *size > 0).unwrap_or(5) as usize;
    let start = body["pageToken"]
        .as_str()
        .filter(|token| !token.is_empty())
        .map(|token| token.parse::<usize>().unwrap())
        .unwrap_or(0);
    let end = (start + size).min(words.len());

    let responses = words[start..end]
        .iter()
        .map(|word| json!({ "content": word }))
        .collect::<Vec<_>>();
    let next_page_token = if end < words.len() {
        end.to_string()
    } else {
        String::new()
    };

    mock::json(
        StatusCode::OK,
        json!({ "responses": responses, "nextPageToken": next_page_token }),
    )
}

const FIFTEEN_WORDS: &str = "It was the best of times it was the worst of times said the man";

fn request() -> PagedExpandRequest {
    PagedExpandRequest {
        content: FIFTEEN_WORDS.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn collects_all_pages() {
    trace_init();

    let server = MockServer::start(paged_expand).await;
    let service = echo_service();
    let stub = stub(&client(Protocol::Rest), service.clone(), server.port());
    let paged = PagedCall::new(
        stub.api_call::<PagedExpandRequest, PagedExpandResponse>(&method(&service, "PagedExpand")),
        PageDescriptor::standard("responses"),
    );

    let result = paged
        .call(request(), &CallSettings::new().page_size(3))
        .await
        .unwrap();

    let words = match result {
        PagedResult::All(responses) => responses
            .into_iter()
            .map(|response| response.content)
            .collect::<Vec<_>>()
            .join(" "),
        PagedResult::Page { .. } => panic!("expected all resources"),
    };
    assert_eq!(words, FIFTEEN_WORDS);

    let tokens = server
        .requests()
        .iter()
        .map(|request| request.json()["pageToken"].as_str().unwrap_or_default().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(tokens, vec!["", "3", "6", "9", "12"]);
}

#[tokio::test]
async fn max_results_limits_requests() {
    trace_init();

    let server = MockServer::start(paged_expand).await;
    let service = echo_service();
    let stub = stub(&client(Protocol::Rest), service.clone(), server.port());
    let paged = PagedCall::new(
        stub.api_call::<PagedExpandRequest, PagedExpandResponse>(&method(&service, "PagedExpand")),
        PageDescriptor::standard("responses"),
    );

    let result = paged
        .call(request(), &CallSettings::new().page_size(3).max_results(8))
        .await
        .unwrap();

    match result {
        PagedResult::All(responses) => assert_eq!(responses.len(), 8),
        PagedResult::Page { .. } => panic!("expected all resources"),
    }
    assert_eq!(server.requests().len(), 3);
}

#[tokio::test]
async fn manual_paging_follows_next_request() {
    trace_init();

    let server = MockServer::start(paged_expand).await;
    let service = echo_service();
    let stub = stub(&client(Protocol::Rest), service.clone(), server.port());
    let paged = PagedCall::new(
        stub.api_call::<PagedExpandRequest, PagedExpandResponse>(&method(&service, "PagedExpand")),
        PageDescriptor::standard("responses"),
    );
    let settings = CallSettings::new().auto_paginate(false).page_size(10);

    let mut next = Some(request());
    let mut pages = 0;
    while let Some(request) = next.take() {
        match paged.call(request, &settings).await.unwrap() {
            PagedResult::Page {
                next_request,
                response,
            } => {
                pages += 1;
                assert!(!response.responses.is_empty());
                next = next_request;
            }
            PagedResult::All(_) => panic!("expected a single page"),
        }
    }

    assert_eq!(pages, 2);
}

#[tokio::test]
async fn streams_resources_lazily() {
    trace_init();

    let server = MockServer::start(paged_expand).await;
    let service = echo_service();
    let stub = stub(&client(Protocol::Rest), service.clone(), server.port());
    let paged = PagedCall::new(
        stub.api_call::<PagedExpandRequest, PagedExpandResponse>(&method(&service, "PagedExpand")),
        PageDescriptor::standard("responses"),
    );

    let stream = paged.stream(request(), CallSettings::new().page_size(4));
    assert!(server.requests().is_empty());

    let words = stream
        .map_ok(|response| response.content)
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(words.len(), 15);
    assert_eq!(server.requests().len(), 4);
}
