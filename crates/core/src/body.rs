//! Body wrappers: the request body shared between the handler and the access
//! log, and the response body whose end triggers the record.

use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use axum::body::Body;
use bytes::Bytes;
use http_body::{Frame, SizeHint};

use crate::logger::PendingRecord;

/// Handle on a request body stream that the handler reads first.
///
/// The handler gets a body reading from a shared slot. Whatever it leaves
/// unread is still there when [`BodyTap::take`] is called after it returns,
/// so a handler that consumed the body leaves nothing to capture.
#[derive(Clone)]
pub struct BodyTap {
    slot: Arc<Mutex<Option<Body>>>,
}

impl BodyTap {
    /// Wrap `body`, returning the tap and the body to pass on to the handler
    pub fn new(body: Body) -> (Self, Body) {
        let tap = Self {
            slot: Arc::new(Mutex::new(Some(body))),
        };
        let handler_body = Body::new(TappedBody {
            slot: Arc::clone(&tap.slot),
        });
        (tap, handler_body)
    }

    /// Take the remainder of the stream; later reads through the handler's body see its end.
    pub fn take(&self) -> Body {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(Body::empty)
    }
}

struct TappedBody {
    slot: Arc<Mutex<Option<Body>>>,
}

impl http_body::Body for TappedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_mut() {
            Some(body) => Pin::new(body).poll_frame(cx),
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_none_or(http_body::Body::is_end_stream)
    }

    fn size_hint(&self) -> SizeHint {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or_else(|| SizeHint::with_exact(0), http_body::Body::size_hint)
    }
}

/// Response body counting the bytes it yields.
///
/// The pending record is logged exactly once: when the stream ends, fails,
/// or the body is dropped before that (client gone).
pub(crate) struct LoggedBody {
    inner: Body,
    written: u64,
    pending: Option<PendingRecord>,
}

impl LoggedBody {
    pub(crate) fn new(inner: Body, pending: PendingRecord) -> Self {
        Self {
            inner,
            written: 0,
            pending: Some(pending),
        }
    }

    fn finish(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.finish(self.written);
        }
    }
}

impl http_body::Body for LoggedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match polled {
            Poll::Ready(Some(Ok(ref frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.written += data.len() as u64;
                }
                if this.inner.is_end_stream() {
                    this.finish();
                }
            }
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => this.finish(),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for LoggedBody {
    fn drop(&mut self) {
        self.finish();
    }
}
