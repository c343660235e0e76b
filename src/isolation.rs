//! Panic containment around handler futures.
//!
//! [`isolate`] drives a handler future through `catch_unwind` and turns a
//! panic into a [`Crash`] value. A process-wide panic hook, installed once,
//! records a backtrace on the panicking thread while that thread is inside an
//! isolated poll and stays quiet there; panics anywhere else go to the hook
//! that was installed before.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::FutureExt;

use crate::handler::BoxFuture;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static CAPTURED: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if DEPTH.with(Cell::get) > 0 {
                CAPTURED.with(|c| *c.borrow_mut() = Some(Backtrace::force_capture()));
            } else {
                previous(info);
            }
        }));
    });
}

/// Marks the current thread as inside an isolated poll.
struct Boundary;

impl Boundary {
    fn enter() -> Self {
        DEPTH.with(|d| d.set(d.get() + 1));
        Self
    }
}

impl Drop for Boundary {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get() - 1));
    }
}

/// A handler that panicked.
pub(crate) struct Crash {
    pub(crate) message: String,
    pub(crate) backtrace: Backtrace,
}

impl Crash {
    fn new(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        let backtrace = CAPTURED
            .with(|c| c.borrow_mut().take())
            .unwrap_or_else(Backtrace::force_capture);
        Self { message, backtrace }
    }
}

impl fmt::Debug for Crash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crash").field("message", &self.message).finish_non_exhaustive()
    }
}

/// Keeps the thread marked as isolated for the duration of each poll, so
/// the hook knows to capture.
struct Bounded {
    inner: BoxFuture,
}

impl Future for Bounded {
    type Output = Option<Bytes>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _boundary = Boundary::enter();
        self.inner.as_mut().poll(cx)
    }
}

/// Runs a handler future to completion, turning a panic into `Err(Crash)`.
pub(crate) async fn isolate(inner: BoxFuture) -> Result<Option<Bytes>, Crash> {
    install_hook();
    AssertUnwindSafe(Bounded { inner }).catch_unwind().await.map_err(Crash::new)
}
