// rxkit/src/context.rs
//
// Context-propagating executor: re-schedules the signals of a stream onto
// the runtime that was current when the stream was created.
//

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future;
use futures_util::stream::{self, Stream, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::ReactiveError;
use crate::stream::ItemStream;

/// Handle to the execution context (event loop) a request belongs to.
///
/// Captured once and passed explicitly; cloning shares the same context.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    name: String,
    handle: Handle,
    open: AtomicBool,
}

impl ExecutionContext {
    pub fn new(name: impl Into<String>, handle: Handle) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                name: name.into(),
                handle,
                open: AtomicBool::new(true),
            }),
        }
    }

    /// Captures the runtime the caller is running on, if any.
    pub fn capture(name: impl Into<String>) -> Option<Self> {
        Handle::try_current().ok().map(|handle| Self::new(name, handle))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn handle(&self) -> &Handle {
        &self.inner.handle
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    /// Tears the context down. Signals still to be redispatched fail with
    /// [`ReactiveError::ContextUnavailable`].
    pub fn close(&self) {
        if self.inner.open.swap(false, Ordering::AcqRel) {
            warn!("Execution context '{}' closed", self.inner.name);
        }
    }

    pub(crate) fn unavailable(&self) -> ReactiveError {
        ReactiveError::ContextUnavailable(self.inner.name.clone())
    }

    /// Drives `upstream` on this context and hands its signals back to
    /// whoever polls the returned stream. One item is pulled per poll.
    pub(crate) fn redispatch<T: Send + 'static>(&self, upstream: ItemStream<T>) -> ItemStream<T> {
        if !self.is_open() {
            return stream::once(future::ready(Err(self.unavailable()))).boxed();
        }

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        self.inner
            .handle
            .spawn(drive(upstream, request_rx, signal_tx, self.clone()));

        Box::pin(Redispatched {
            context: self.clone(),
            requests: request_tx,
            signals: signal_rx,
            requested: false,
            done: false,
        })
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("name", &self.inner.name)
            .field("open", &self.is_open())
            .finish()
    }
}

enum Signal<T> {
    Next(T),
    Error(ReactiveError),
    Complete,
}

async fn drive<T: Send + 'static>(
    mut upstream: ItemStream<T>,
    mut requests: mpsc::UnboundedReceiver<()>,
    signals: mpsc::UnboundedSender<Signal<T>>,
    context: ExecutionContext,
) {
    while requests.recv().await.is_some() {
        if !context.is_open() {
            let _ = signals.send(Signal::Error(context.unavailable()));
            return;
        }
        let signal = match upstream.next().await {
            Some(Ok(item)) => Signal::Next(item),
            Some(Err(err)) => Signal::Error(err),
            None => Signal::Complete,
        };
        let terminal = !matches!(signal, Signal::Next(_));
        if signals.send(signal).is_err() || terminal {
            return;
        }
    }
    debug!("Subscriber on context '{}' went away", context.name());
}

struct Redispatched<T> {
    context: ExecutionContext,
    requests: mpsc::UnboundedSender<()>,
    signals: mpsc::UnboundedReceiver<Signal<T>>,
    requested: bool,
    done: bool,
}

impl<T> Redispatched<T> {
    fn fail(&mut self) -> Poll<Option<Result<T, ReactiveError>>> {
        self.done = true;
        Poll::Ready(Some(Err(self.context.unavailable())))
    }
}

impl<T> Stream for Redispatched<T> {
    type Item = Result<T, ReactiveError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        if !self.requested {
            if !self.context.is_open() || self.requests.send(()).is_err() {
                return self.fail();
            }
            self.requested = true;
        }
        match self.signals.poll_recv(cx) {
            Poll::Ready(Some(Signal::Next(item))) => {
                self.requested = false;
                Poll::Ready(Some(Ok(item)))
            }
            Poll::Ready(Some(Signal::Error(err))) => {
                self.done = true;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(Some(Signal::Complete)) => {
                self.done = true;
                Poll::Ready(None)
            }
            // driver task dropped without a terminal signal: runtime is gone
            Poll::Ready(None) => self.fail(),
            Poll::Pending => Poll::Pending,
        }
    }
}
