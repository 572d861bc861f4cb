use super::{ApiCall, CallSettings, PagedCall, PagedRequest, PagedResponse};
use crate::Status;
use futures_core::Stream;
use futures_util::{
    future,
    stream::{self, BoxStream, StreamExt},
};
use std::{
    fmt,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tracing::trace;

/// The responses of a list method, one per page.
pub type Pages<Resp> = BoxStream<'static, Result<Resp, Status>>;

impl<A, Req, Resp> PagedCall<A, Req, Resp>
where
    A: ApiCall<Req, Resp> + 'static,
    Req: PagedRequest + Send + 'static,
    Resp: PagedResponse + Send + 'static,
    Resp::Resource: Send + 'static,
{
    /// Stream the responses page by page.
    ///
    /// Nothing is sent until the stream is polled, and the request for a
    /// page is only sent once the previous page has been taken from the
    /// stream. The stream ends after the last page or after the first error.
    /// `auto_paginate` and `max_results` are ignored.
    pub fn pages(&self, request: Req, settings: CallSettings) -> Pages<Resp> {
        let first = self.first_request(request, &settings);
        let api_call = self.api_call.clone();
        let descriptor = Arc::new(self.descriptor.clone());
        let options = settings.options;

        stream::unfold(Some(first), move |next| {
            let api_call = api_call.clone();
            let descriptor = descriptor.clone();
            let options = options.clone();

            async move {
                let request = next?;
                match api_call.call(request.clone(), &options).await {
                    Ok(response) => {
                        let next = descriptor.next_request(&request, &response);
                        Some((Ok(response), next))
                    }
                    Err(status) => Some((Err(status), None)),
                }
            }
        })
        .boxed()
    }

    /// Stream the resources of every page.
    ///
    /// Pages are fetched lazily as resources are consumed, and the stream
    /// ends once `max_results` resources were produced without fetching
    /// another page. An error ends the stream after it is yielded.
    pub fn stream(&self, request: Req, settings: CallSettings) -> PageStream<Resp::Resource> {
        let max_results = settings.max_results;
        let descriptor = Arc::new(self.descriptor.clone());

        let resources = self
            .pages(request, settings)
            .flat_map(move |page| match page {
                Ok(response) => {
                    stream::iter(descriptor.resources(response).into_iter().map(Ok)).left_stream()
                }
                Err(status) => stream::once(future::ready(Err(status))).right_stream(),
            });

        let inner = match max_results {
            Some(max) => resources.take(max).boxed(),
            None => resources.boxed(),
        };

        PageStream {
            inner,
            ended: false,
        }
    }
}

/// A stream of the resources of a list method, from
/// [`PagedCall::stream`].
pub struct PageStream<R> {
    inner: BoxStream<'static, Result<R, Status>>,
    ended: bool,
}

impl<R: Send + 'static> PageStream<R> {
    /// Stop the stream. No further pages are requested and no further
    /// resources are yielded.
    pub fn end(&mut self) {
        if !self.ended {
            trace!("page stream ended early");
            self.ended = true;
            self.inner = stream::empty().boxed();
        }
    }

    /// Whether [`end`](PageStream::end) was called.
    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl<R> Stream for PageStream<R> {
    type Item = Result<R, Status>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.ended {
            return Poll::Ready(None);
        }
        self.inner.poll_next_unpin(cx)
    }
}

impl<R> fmt::Debug for PageStream<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageStream")
            .field("ended", &self.ended)
            .finish()
    }
}
