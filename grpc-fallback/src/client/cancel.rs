use crate::Status;
use futures_util::future::{AbortHandle, AbortRegistration, Abortable, Aborted, BoxFuture};
use pin_project::pin_project;
use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::{ready, Context, Poll},
};
use tracing::debug;

/// A handle to cancel an in-flight call.
///
/// Handles are cheap to clone and all clones refer to the same call. Only the
/// first [`cancel`](Cancelable::cancel) has an effect; later calls do nothing.
#[derive(Clone)]
pub struct Cancelable {
    inner: Arc<Inner>,
}

struct Inner {
    requested: AtomicBool,
    abort: AbortHandle,
}

impl Cancelable {
    pub(crate) fn pair() -> (Self, AbortRegistration) {
        let (abort, registration) = AbortHandle::new_pair();
        let cancelable = Cancelable {
            inner: Arc::new(Inner {
                requested: AtomicBool::new(false),
                abort,
            }),
        };
        (cancelable, registration)
    }

    /// Cancel the call.
    ///
    /// A call that has not completed yet resolves to a `Cancelled` status
    /// for which [`Status::is_abort`] is `true`, and a stream ends without
    /// yielding further items.
    pub fn cancel(&self) {
        if self.inner.requested.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("call cancelled by the caller");
        self.inner.abort.abort();
    }

    /// Returns `true` if [`cancel`](Cancelable::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Cancelable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancelable")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// An in-flight call that can be cancelled.
///
/// See [`UnaryCall`](super::UnaryCall) and
/// [`StreamingCall`](super::StreamingCall).
#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Call<T> {
    #[pin]
    inner: Abortable<BoxFuture<'static, Result<T, Status>>>,
    canceler: Cancelable,
}

impl<T> Call<T> {
    pub(crate) fn new(
        future: BoxFuture<'static, Result<T, Status>>,
        registration: AbortRegistration,
        canceler: Cancelable,
    ) -> Self {
        Call {
            inner: Abortable::new(future, registration),
            canceler,
        }
    }

    /// A handle that cancels this call.
    pub fn canceler(&self) -> Cancelable {
        self.canceler.clone()
    }

    /// Cancel this call.
    pub fn cancel(&self) {
        self.canceler.cancel();
    }
}

impl<T> Future for Call<T> {
    type Output = Result<T, Status>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match ready!(self.project().inner.poll(cx)) {
            Ok(result) => Poll::Ready(result),
            Err(Aborted) => Poll::Ready(Err(Status::aborted_by_cancel())),
        }
    }
}

impl<T> fmt::Debug for Call<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("canceler", &self.canceler)
            .finish()
    }
}
