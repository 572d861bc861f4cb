//! Page token driven iteration over list methods.
//!
//! List methods take a page token (and usually a page size) in their request
//! and return a page of resources together with the token of the next page.
//! [`PagedCall`] wraps any unary [`ApiCall`] of such a method and either
//! collects every resource, returns one page with the request for the next,
//! or lazily streams resources page by page.
//!
//! Pages are always requested one after the other: the request for a page is
//! only sent once the previous response has been handled.

mod stream;

pub use self::stream::{PageStream, Pages};

use crate::{client::CallOptions, Status};
use futures_util::future::{BoxFuture, FutureExt};
use std::{fmt, future::Future, marker::PhantomData, sync::Arc};
use tracing::trace;

/// A request message of a list method.
pub trait PagedRequest: Clone {
    /// Set the token of the page to fetch.
    fn set_page_token(&mut self, token: String);

    /// Set the maximum number of resources per page. Requests without a page
    /// size field keep the default, which ignores the value.
    fn set_page_size(&mut self, size: i32) {
        let _ = size;
    }
}

/// A response message of a list method.
pub trait PagedResponse {
    /// The type of the listed resources.
    type Resource;

    /// The token of the next page. Empty on the last page.
    fn next_page_token(&self) -> &str;

    /// Take the resources of this page.
    fn into_resources(self) -> Vec<Self::Resource>;
}

/// Where the pagination state of one method lives.
///
/// The field names are the names of the fields in the method's messages;
/// they are used in logs and decide whether a page size can be sent. The
/// values themselves are read and written through [`PagedRequest`] and
/// [`PagedResponse`]. A descriptor is built once per method and shared by
/// all its calls.
pub struct PageDescriptor<Req, Resp> {
    request_page_token_field: &'static str,
    response_page_token_field: &'static str,
    request_page_size_field: Option<&'static str>,
    resource_field: &'static str,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> PageDescriptor<Req, Resp>
where
    Req: PagedRequest,
    Resp: PagedResponse,
{
    /// Describe a method by its field names.
    pub fn new(
        request_page_token_field: &'static str,
        response_page_token_field: &'static str,
        resource_field: &'static str,
    ) -> Self {
        PageDescriptor {
            request_page_token_field,
            response_page_token_field,
            request_page_size_field: None,
            resource_field,
            _marker: PhantomData,
        }
    }

    /// The usual `pageToken`, `nextPageToken` and `pageSize` fields, with the
    /// resources in `resource_field`.
    pub fn standard(resource_field: &'static str) -> Self {
        Self::new("pageToken", "nextPageToken", resource_field).with_page_size_field("pageSize")
    }

    /// Name the request field holding the page size.
    pub fn with_page_size_field(self, field: &'static str) -> Self {
        PageDescriptor {
            request_page_size_field: Some(field),
            ..self
        }
    }

    /// The request field holding the page token.
    pub fn request_page_token_field(&self) -> &'static str {
        self.request_page_token_field
    }

    /// The response field holding the next page token.
    pub fn response_page_token_field(&self) -> &'static str {
        self.response_page_token_field
    }

    /// The request field holding the page size, if the method has one.
    pub fn request_page_size_field(&self) -> Option<&'static str> {
        self.request_page_size_field
    }

    /// The response field holding the resources.
    pub fn resource_field(&self) -> &'static str {
        self.resource_field
    }

    /// Set the page token of `request`.
    pub fn set_page_token(&self, request: &mut Req, token: String) {
        request.set_page_token(token);
    }

    /// Set the page size of `request`, if the method has a page size field.
    pub fn set_page_size(&self, request: &mut Req, size: i32) {
        match self.request_page_size_field {
            Some(_) => request.set_page_size(size),
            None => trace!("no page size field, ignoring page size {size}"),
        }
    }

    /// The next page token of `response`, or `None` on the last page.
    pub fn next_page_token<'a>(&self, response: &'a Resp) -> Option<&'a str> {
        Some(response.next_page_token()).filter(|token| !token.is_empty())
    }

    /// Take the resources of `response`.
    pub fn resources(&self, response: Resp) -> Vec<Resp::Resource> {
        response.into_resources()
    }

    /// The request for the page after `response`, built from the request
    /// that fetched it.
    pub fn next_request(&self, request: &Req, response: &Resp) -> Option<Req> {
        let token = self.next_page_token(response)?;
        trace!(
            "next page: {} = {:?} from {}",
            self.request_page_token_field,
            token,
            self.response_page_token_field
        );
        let mut next = request.clone();
        next.set_page_token(token.to_owned());
        Some(next)
    }
}

impl<Req, Resp> Clone for PageDescriptor<Req, Resp> {
    fn clone(&self) -> Self {
        PageDescriptor {
            request_page_token_field: self.request_page_token_field,
            response_page_token_field: self.response_page_token_field,
            request_page_size_field: self.request_page_size_field,
            resource_field: self.resource_field,
            _marker: PhantomData,
        }
    }
}

impl<Req, Resp> fmt::Debug for PageDescriptor<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageDescriptor")
            .field("request_page_token_field", &self.request_page_token_field)
            .field("response_page_token_field", &self.response_page_token_field)
            .field("request_page_size_field", &self.request_page_size_field)
            .field("resource_field", &self.resource_field)
            .finish()
    }
}

/// Settings of one paginated call.
#[derive(Clone, Debug)]
pub struct CallSettings {
    options: CallOptions,
    auto_paginate: bool,
    page_token: Option<String>,
    page_size: Option<i32>,
    max_results: Option<usize>,
}

impl Default for CallSettings {
    fn default() -> Self {
        CallSettings {
            options: CallOptions::default(),
            auto_paginate: true,
            page_token: None,
            page_size: None,
            max_results: None,
        }
    }
}

impl CallSettings {
    /// Settings that fetch every page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for every page request.
    pub fn options(self, options: CallOptions) -> Self {
        CallSettings { options, ..self }
    }

    /// Whether to fetch all pages (the default) or a single one.
    pub fn auto_paginate(self, auto_paginate: bool) -> Self {
        CallSettings {
            auto_paginate,
            ..self
        }
    }

    /// Start at the page with this token. Only the first request uses it.
    pub fn page_token(self, token: impl Into<String>) -> Self {
        CallSettings {
            page_token: Some(token.into()),
            ..self
        }
    }

    /// Ask for pages of at most `size` resources.
    pub fn page_size(self, size: i32) -> Self {
        CallSettings {
            page_size: Some(size),
            ..self
        }
    }

    /// Stop after `max` resources, even if more pages exist.
    pub fn max_results(self, max: usize) -> Self {
        CallSettings {
            max_results: Some(max),
            ..self
        }
    }

    /// The options for every page request.
    pub fn get_options(&self) -> &CallOptions {
        &self.options
    }

    /// Whether all pages are fetched.
    pub fn is_auto_paginate(&self) -> bool {
        self.auto_paginate
    }

    /// The limit on the number of resources, if any.
    pub fn get_max_results(&self) -> Option<usize> {
        self.max_results
    }
}

/// A unary call, as wrapped by [`PagedCall`].
///
/// Implemented for [`UnaryMethod`](crate::client::UnaryMethod) and for
/// closures taking the request and the options.
pub trait ApiCall<Req, Resp>: Send + Sync {
    /// Send `request` and resolve to its response.
    fn call(&self, request: Req, options: &CallOptions) -> BoxFuture<'static, Result<Resp, Status>>;
}

impl<F, Fut, Req, Resp> ApiCall<Req, Resp> for F
where
    F: Fn(Req, CallOptions) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
{
    fn call(&self, request: Req, options: &CallOptions) -> BoxFuture<'static, Result<Resp, Status>> {
        self(request, options.clone()).boxed()
    }
}

/// The outcome of [`PagedCall::call`].
pub enum PagedResult<Req, Resp: PagedResponse> {
    /// A single page, when auto pagination is off.
    Page {
        /// The response of the page.
        response: Resp,
        /// The request for the following page, or `None` on the last page.
        next_request: Option<Req>,
    },
    /// Every resource of every page, up to the `max_results` limit.
    All(Vec<Resp::Resource>),
}

impl<Req, Resp> fmt::Debug for PagedResult<Req, Resp>
where
    Req: fmt::Debug,
    Resp: PagedResponse + fmt::Debug,
    Resp::Resource: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PagedResult::Page {
                response,
                next_request,
            } => f
                .debug_struct("Page")
                .field("response", response)
                .field("next_request", next_request)
                .finish(),
            PagedResult::All(resources) => f.debug_tuple("All").field(resources).finish(),
        }
    }
}

/// Runs a list method page by page.
///
/// ```rust
/// # use grpc_fallback::{Status, client::CallOptions};
/// # use grpc_fallback::paginate::*;
/// # #[derive(Clone, Default)] struct ListRequest { page_token: String }
/// # impl PagedRequest for ListRequest {
/// #     fn set_page_token(&mut self, token: String) { self.page_token = token }
/// # }
/// # struct ListResponse { items: Vec<u32>, next_page_token: String }
/// # impl PagedResponse for ListResponse {
/// #     type Resource = u32;
/// #     fn next_page_token(&self) -> &str { &self.next_page_token }
/// #     fn into_resources(self) -> Vec<u32> { self.items }
/// # }
/// # async fn run() -> Result<(), Status> {
/// let list = |request: ListRequest, _: CallOptions| async move {
///     let next_page_token = if request.page_token.is_empty() { "2" } else { "" };
///     Ok::<_, Status>(ListResponse { items: vec![1], next_page_token: next_page_token.into() })
/// };
/// let paged = PagedCall::new(list, PageDescriptor::new("pageToken", "nextPageToken", "items"));
///
/// match paged.call(ListRequest::default(), &CallSettings::new()).await? {
///     PagedResult::All(items) => assert_eq!(items, vec![1, 1]),
///     PagedResult::Page { .. } => unreachable!(),
/// }
/// # Ok(())
/// # }
/// ```
pub struct PagedCall<A, Req, Resp> {
    api_call: Arc<A>,
    descriptor: PageDescriptor<Req, Resp>,
}

impl<A, Req, Resp> PagedCall<A, Req, Resp>
where
    A: ApiCall<Req, Resp> + 'static,
    Req: PagedRequest + Send + 'static,
    Resp: PagedResponse + Send + 'static,
    Resp::Resource: Send + 'static,
{
    /// Wrap `api_call`, a list method described by `descriptor`.
    pub fn new(api_call: A, descriptor: PageDescriptor<Req, Resp>) -> Self {
        PagedCall {
            api_call: Arc::new(api_call),
            descriptor,
        }
    }

    /// The descriptor of the wrapped method.
    pub fn descriptor(&self) -> &PageDescriptor<Req, Resp> {
        &self.descriptor
    }

    /// Call the method.
    ///
    /// With auto pagination (the default), pages are fetched until one has
    /// no next page token or `max_results` resources were collected, and
    /// all resources are returned. An error on any page fails the whole
    /// call. Without auto pagination, a single page is fetched and returned
    /// with the request for the next one.
    pub async fn call(&self, request: Req, settings: &CallSettings) -> Result<PagedResult<Req, Resp>, Status> {
        let mut request = self.first_request(request, settings);

        if !settings.auto_paginate {
            let response = self.api_call.call(request.clone(), &settings.options).await?;
            let next_request = self.descriptor.next_request(&request, &response);
            return Ok(PagedResult::Page {
                response,
                next_request,
            });
        }

        let mut resources = Vec::new();
        if settings.max_results == Some(0) {
            return Ok(PagedResult::All(resources));
        }

        let mut page = 0;
        loop {
            page += 1;
            let response = self.api_call.call(request.clone(), &settings.options).await?;
            let next_token = self.descriptor.next_page_token(&response).map(str::to_owned);
            resources.extend(self.descriptor.resources(response));
            trace!("page {page} brings the total to {} resources", resources.len());

            if let Some(max) = settings.max_results {
                if resources.len() >= max {
                    resources.truncate(max);
                    break;
                }
            }

            match next_token {
                Some(token) => self.descriptor.set_page_token(&mut request, token),
                None => break,
            }
        }

        Ok(PagedResult::All(resources))
    }

    fn first_request(&self, mut request: Req, settings: &CallSettings) -> Req {
        if let Some(token) = &settings.page_token {
            self.descriptor.set_page_token(&mut request, token.clone());
        }
        if let Some(size) = settings.page_size {
            self.descriptor.set_page_size(&mut request, size);
        }
        request
    }
}

impl<A, Req, Resp> Clone for PagedCall<A, Req, Resp> {
    fn clone(&self) -> Self {
        PagedCall {
            api_call: self.api_call.clone(),
            descriptor: self.descriptor.clone(),
        }
    }
}

impl<A, Req, Resp> fmt::Debug for PagedCall<A, Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagedCall")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}
