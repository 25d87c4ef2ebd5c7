//! Body decorator used while forwarding an origin response that will be
//! stored.
//!
//! [`TeeBody`] forwards frames to the caller unchanged while
//! accumulating a copy; when the stream reaches EOF cleanly the
//! accumulated bytes are handed to a finisher that returns the store
//! write as a future. That future is polled to completion before
//! `TeeBody` itself signals EOF, so a caller that awaits the body to
//! completion (as [`crate::engine::HttpCache::round_trip`]'s own test
//! suite and any well-behaved caller does) observes the store write as
//! already finished — matching §5's "the Set happens only on the
//! caller's close/EOF" ordering exactly, rather than racing a detached
//! background task. If the caller drops the body before EOF, or a frame
//! errors, the finisher is never invoked and nothing is stored.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use http_body::{Body, Frame};
use pin_project_lite::pin_project;

use crate::executor::{BoxError, ExecutorBody};

/// The store write a [`TeeFinisher`] performs, as a boxed future so
/// `TeeBody` can poll it to completion without a generic parameter.
pub type TeeFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Invoked exactly once, with the fully accumulated body, when a
/// [`TeeBody`] reaches EOF without an intervening error. Returns the
/// future that performs the store write; `TeeBody` polls it to
/// completion before reporting its own EOF.
///
/// `Sync` is required (even though the closure only ever runs once) so
/// that `TeeBody` itself stays `Sync`, which [`crate::executor::ExecutorBody`]
/// demands of anything boxed into it.
pub type TeeFinisher = Box<dyn FnOnce(Bytes) -> TeeFuture + Send + Sync>;

pin_project! {
    /// Wraps an [`ExecutorBody`], tee-ing its frames into an accumulator
    /// that is only committed via `finisher` on clean EOF.
    pub struct TeeBody {
        #[pin]
        inner: ExecutorBody,
        accumulator: Vec<u8>,
        finisher: Option<TeeFinisher>,
        failed: bool,
        finishing: Option<TeeFuture>,
    }
}

impl TeeBody {
    /// Wraps `inner`; `finisher` runs once, on clean EOF, with the full
    /// accumulated body, and its returned future is driven to completion
    /// before this body reports EOF to its own caller.
    pub fn new(inner: ExecutorBody, finisher: TeeFinisher) -> Self {
        Self { inner, accumulator: Vec::new(), finisher: Some(finisher), failed: false, finishing: None }
    }
}

impl Body for TeeBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();

        if let Some(finishing) = this.finishing.as_mut() {
            return match finishing.as_mut().poll(cx) {
                Poll::Ready(()) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            };
        }

        match this.inner.as_mut().poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.accumulator.extend_from_slice(data);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(err))) => {
                *this.failed = true;
                this.finisher.take();
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                if *this.failed {
                    return Poll::Ready(None);
                }
                let Some(finisher) = this.finisher.take() else {
                    return Poll::Ready(None);
                };
                let bytes = Bytes::from(std::mem::take(this.accumulator));
                let mut future = finisher(bytes);
                match future.as_mut().poll(cx) {
                    Poll::Ready(()) => Poll::Ready(None),
                    Poll::Pending => {
                        *this.finishing = Some(future);
                        Poll::Pending
                    }
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.finishing.is_none() && self.inner.is_end_stream()
    }

    fn size_hint(&self) -> http_body::SizeHint {
        self.inner.size_hint()
    }
}

impl fmt::Debug for TeeBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeeBody")
            .field("accumulated_len", &self.accumulator.len())
            .field("finishing", &self.finishing.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for TeeBody {
    fn drop(&mut self) {
        // Dropping without reaching EOF discards any accumulated bytes;
        // the finisher (if still present) is simply never called, and a
        // finisher future already in flight is simply dropped too.
    }
}
