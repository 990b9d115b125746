// rxkit/src/subscriber.rs
//
// Callback-style subscription with explicit demand.
//

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::errors::ReactiveError;
use crate::stream::{ReactiveStream, Subscription};

/// Demand value meaning "no limit".
pub const UNBOUNDED: u64 = u64::MAX;

/// Receiver of the signals of one subscription.
///
/// Signals arrive sequentially: any number of `on_next`, then at most one
/// of `on_error` / `on_complete`. Nothing is delivered beyond the demand
/// requested through the handle.
pub trait Subscriber<T>: Send + 'static {
    /// Called once before any other signal. Requests unbounded demand
    /// unless overridden.
    fn on_subscribe(&mut self, handle: SubscriptionHandle) {
        handle.request(UNBOUNDED);
    }

    fn on_next(&mut self, item: T);

    fn on_error(&mut self, error: ReactiveError);

    fn on_complete(&mut self);
}

struct Demand {
    requested: AtomicU64,
    cancelled: AtomicBool,
    notify: Notify,
}

/// Demand and cancellation control for a callback subscription.
#[derive(Clone)]
pub struct SubscriptionHandle {
    demand: Arc<Demand>,
}

impl SubscriptionHandle {
    fn new() -> Self {
        Self {
            demand: Arc::new(Demand {
                requested: AtomicU64::new(0),
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Adds `n` to the outstanding demand. `request(0)` is ignored.
    pub fn request(&self, n: u64) {
        if n == 0 {
            return;
        }
        let _ = self
            .demand
            .requested
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(n))
            });
        self.demand.notify.notify_one();
    }

    pub fn cancel(&self) {
        if !self.demand.cancelled.swap(true, Ordering::AcqRel) {
            self.demand.notify.notify_one();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.demand.cancelled.load(Ordering::Acquire)
    }

    /// Waits for one unit of demand. Returns false once cancelled.
    async fn acquire(&self) -> bool {
        loop {
            if self.is_cancelled() {
                return false;
            }
            let notified = self.demand.notify.notified();
            let taken = self
                .demand
                .requested
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| match current {
                    0 => None,
                    UNBOUNDED => Some(UNBOUNDED),
                    n => Some(n - 1),
                })
                .is_ok();
            if taken {
                return true;
            }
            notified.await;
        }
    }

    /// Waits until some demand is outstanding, without taking it.
    async fn demanded(&self) -> bool {
        loop {
            if self.is_cancelled() {
                return false;
            }
            let notified = self.demand.notify.notified();
            if self.demand.requested.load(Ordering::Acquire) > 0 {
                return true;
            }
            notified.await;
        }
    }

    async fn cancelled(&self) {
        loop {
            let notified = self.demand.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl<T: Send + 'static> ReactiveStream<T> {
    /// Subscribes `subscriber` and delivers its signals from a spawned task.
    ///
    /// Delivery runs on the stream's execution context when it has one,
    /// otherwise on the caller's runtime. When neither is usable, or the
    /// runtime shuts down before a terminal signal, the subscriber is failed
    /// with [`ReactiveError::ContextUnavailable`].
    pub fn subscribe_with<S>(&self, subscriber: S) -> SubscriptionHandle
    where
        S: Subscriber<T>,
    {
        let handle = SubscriptionHandle::new();

        let runtime = match self.context() {
            Some(context) if context.is_open() => {
                Ok((context.handle().clone(), context.unavailable()))
            }
            Some(context) => Err(context.unavailable()),
            None => Handle::try_current()
                .map(|runtime| (runtime, current_unavailable()))
                .map_err(|_| current_unavailable()),
        };

        match runtime {
            Ok((runtime, unavailable)) => {
                let delivery = Delivery::new(subscriber, handle.clone(), unavailable);
                runtime.spawn(deliver(self.subscribe(), delivery));
            }
            Err(err) => {
                let mut delivery = Delivery::<T, S>::new(subscriber, handle.clone(), err.clone());
                delivery.terminate(Some(err));
            }
        }
        handle
    }
}

fn current_unavailable() -> ReactiveError {
    ReactiveError::ContextUnavailable("current".to_string())
}

/// Owns the subscriber for one callback subscription. Dropped before a
/// terminal signal (runtime shut down), it fails the subscriber.
struct Delivery<T, S: Subscriber<T>> {
    subscriber: S,
    handle: SubscriptionHandle,
    unavailable: ReactiveError,
    subscribed: bool,
    finished: bool,
    _item: PhantomData<fn(T)>,
}

impl<T, S: Subscriber<T>> Delivery<T, S> {
    fn new(subscriber: S, handle: SubscriptionHandle, unavailable: ReactiveError) -> Self {
        Self {
            subscriber,
            handle,
            unavailable,
            subscribed: false,
            finished: false,
            _item: PhantomData,
        }
    }

    fn subscribe(&mut self) {
        if !self.subscribed {
            self.subscribed = true;
            self.subscriber.on_subscribe(self.handle.clone());
        }
    }

    /// Delivers the terminal signal unless the subscriber already cancelled.
    fn terminate(&mut self, error: Option<ReactiveError>) {
        self.finished = true;
        if self.handle.is_cancelled() {
            return;
        }
        self.subscribe();
        match error {
            Some(err) => self.subscriber.on_error(err),
            None => self.subscriber.on_complete(),
        }
    }

    fn cancel(&mut self, subscription: &mut Subscription<T>) {
        self.finished = true;
        subscription.cancel();
        debug!("Callback subscription cancelled");
    }
}

impl<T, S: Subscriber<T>> Drop for Delivery<T, S> {
    fn drop(&mut self) {
        if self.finished || self.handle.is_cancelled() {
            return;
        }
        warn!("Callback delivery dropped before completion: {}", self.unavailable);
        let err = self.unavailable.clone();
        self.terminate(Some(err));
    }
}

/// Pulls one signal ahead of demand once the subscriber first requested,
/// so terminal signals never wait for demand.
async fn deliver<T, S>(mut subscription: Subscription<T>, mut delivery: Delivery<T, S>)
where
    T: Send + 'static,
    S: Subscriber<T>,
{
    let handle = delivery.handle.clone();
    delivery.subscribe();
    if !handle.demanded().await {
        return delivery.cancel(&mut subscription);
    }
    loop {
        let signal = tokio::select! {
            biased;
            _ = handle.cancelled() => None,
            signal = subscription.next() => Some(signal),
        };
        let Some(signal) = signal else {
            return delivery.cancel(&mut subscription);
        };
        match signal {
            Some(Ok(item)) => {
                if !handle.acquire().await {
                    return delivery.cancel(&mut subscription);
                }
                delivery.subscriber.on_next(item);
            }
            Some(Err(err)) => return delivery.terminate(Some(err)),
            None => return delivery.terminate(None),
        }
    }
}
