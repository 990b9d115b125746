// rxkit/src/stream.rs
//
// Publisher adapter: turns a paged driver publisher into a demand-driven,
// single-subscriber stream of individual items.
//

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future;
use futures_util::stream::{self, BoxStream, FusedStream, Stream, StreamExt};
use parking_lot::Mutex;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::errors::ReactiveError;
use crate::metrics;
use crate::publisher::BoxPublisher;

pub(crate) type ItemStream<T> = BoxStream<'static, Result<T, ReactiveError>>;

type Factory<T> = Box<dyn FnOnce() -> ItemStream<T> + Send>;
type SharedFactory<T> = Arc<dyn Fn() -> ItemStream<T> + Send + Sync>;

enum Origin<T> {
    /// Live stream; the factory is taken by the first subscriber.
    Single(Mutex<Option<Factory<T>>>),
    /// Pre-failed stream replaying the same error to every subscriber.
    Failed(ReactiveError),
    /// Multicast stream, each subscriber gets a fresh view.
    Shared(SharedFactory<T>),
}

/// Asynchronous sequence of `T` with subscribe-time activation.
///
/// Nothing happens upstream until a subscription is polled. Live streams
/// accept exactly one subscription; later subscribers receive
/// [`ReactiveError::DoubleSubscription`]. Use [`ReactiveStream::cache`] for
/// fan-out.
pub struct ReactiveStream<T> {
    origin: Origin<T>,
    context: Option<ExecutionContext>,
}

/// Adapts a paged publisher. No page is fetched before the first poll of
/// the first subscription.
pub fn adapt<T: Send + 'static>(publisher: BoxPublisher<T>) -> ReactiveStream<T> {
    ReactiveStream::adapt(publisher)
}

impl<T: Send + 'static> ReactiveStream<T> {
    pub fn adapt(publisher: BoxPublisher<T>) -> Self {
        Self::from_factory(move || page_items(publisher))
    }

    /// Stream that terminates every subscription with `error` and never
    /// touches an upstream.
    pub fn failed(error: ReactiveError) -> Self {
        Self {
            origin: Origin::Failed(error),
            context: None,
        }
    }

    pub(crate) fn from_factory<F>(factory: F) -> Self
    where
        F: FnOnce() -> ItemStream<T> + Send + 'static,
    {
        Self {
            origin: Origin::Single(Mutex::new(Some(Box::new(factory)))),
            context: None,
        }
    }

    /// Context captured by [`ReactiveStream::with_context_affinity`], if any.
    pub fn context(&self) -> Option<&ExecutionContext> {
        self.context.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.origin, Origin::Failed(_))
    }

    pub fn subscribe(&self) -> Subscription<T> {
        match &self.origin {
            Origin::Single(slot) => {
                let factory = slot.lock().take();
                match factory {
                    Some(factory) => {
                        debug!("Subscribing to single-subscriber stream");
                        Subscription::new(factory())
                    }
                    None => {
                        debug!("Rejecting second subscription");
                        metrics::record_double_subscription();
                        Subscription::new(failing(ReactiveError::DoubleSubscription))
                    }
                }
            }
            Origin::Failed(err) => Subscription::new(failing(err.clone())),
            Origin::Shared(factory) => Subscription::new(factory()),
        }
    }

    /// Redispatches every signal onto `context`. The context is captured
    /// here, once; `None` leaves the stream untouched.
    pub fn with_context_affinity(self, context: Option<&ExecutionContext>) -> Self {
        let Some(context) = context else {
            return self;
        };
        let captured = context.clone();
        let mut stream = self.transform(move |upstream| captured.redispatch(upstream));
        stream.context = Some(context.clone());
        stream
    }

    pub fn map<U, F>(self, f: F) -> ReactiveStream<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.transform(move |upstream| {
            let f = f.clone();
            upstream.map(move |item| item.map(|value| f(value))).boxed()
        })
    }

    /// Maps each item, dropping `Ok(None)` results. A mapping error
    /// terminates the stream.
    pub fn try_filter_map<U, F>(self, f: F) -> ReactiveStream<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Result<Option<U>, ReactiveError> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.transform(move |upstream| {
            let f = f.clone();
            upstream
                .filter_map(move |item| {
                    let mapped = match item {
                        Ok(value) => f(value).transpose(),
                        Err(err) => Some(Err(err)),
                    };
                    future::ready(mapped)
                })
                .boxed()
        })
    }

    /// Multicast operator: subscribes upstream once, on first demand, and
    /// replays every element and the terminal signal to all subscribers.
    pub fn cache(self) -> ReactiveStream<T>
    where
        T: Clone,
    {
        let context = self.context.clone();
        let replay = Arc::new(tokio::sync::Mutex::new(Replay {
            source: Some(self),
            upstream: None,
            items: Vec::new(),
            terminal: None,
        }));
        ReactiveStream {
            origin: Origin::Shared(Arc::new(move || replay_items(replay.clone()))),
            context,
        }
    }

    fn transform<U, F>(self, op: F) -> ReactiveStream<U>
    where
        U: Send + 'static,
        F: Fn(ItemStream<T>) -> ItemStream<U> + Send + Sync + 'static,
    {
        let origin = match self.origin {
            Origin::Single(slot) => {
                let factory = slot
                    .into_inner()
                    .map(|factory| Box::new(move || op(factory())) as Factory<U>);
                Origin::Single(Mutex::new(factory))
            }
            Origin::Failed(err) => Origin::Failed(err),
            Origin::Shared(factory) => Origin::Shared(Arc::new(move || op(factory()))),
        };
        ReactiveStream {
            origin,
            context: self.context,
        }
    }
}

fn failing<T: Send + 'static>(err: ReactiveError) -> ItemStream<T> {
    stream::once(future::ready(Err(err))).boxed()
}

/// Holds the publisher for the lifetime of a subscription and cancels it
/// when dropped before the publisher finished.
struct Upstream<T: Send + 'static> {
    publisher: BoxPublisher<T>,
    finished: bool,
}

impl<T: Send + 'static> Drop for Upstream<T> {
    fn drop(&mut self) {
        if !self.finished {
            debug!("Cancelling upstream publisher");
            self.publisher.cancel();
        }
    }
}

struct PageCursor<T: Send + 'static> {
    upstream: Upstream<T>,
    page: VecDeque<T>,
}

fn page_items<T: Send + 'static>(publisher: BoxPublisher<T>) -> ItemStream<T> {
    let cursor = PageCursor {
        upstream: Upstream {
            publisher,
            finished: false,
        },
        page: VecDeque::new(),
    };

    stream::unfold(Some(cursor), |state| async move {
        let mut cursor = state?;
        loop {
            if let Some(item) = cursor.page.pop_front() {
                return Some((Ok(item), Some(cursor)));
            }
            match cursor.upstream.publisher.next_page().await {
                Ok(Some(page)) => {
                    metrics::record_page();
                    cursor.page.extend(page);
                }
                Ok(None) => {
                    cursor.upstream.finished = true;
                    return None;
                }
                Err(err) => {
                    debug!("Upstream publisher failed: {}", err);
                    cursor.upstream.finished = true;
                    return Some((Err(ReactiveError::UpstreamFailure(err)), None));
                }
            }
        }
    })
    .boxed()
}

enum Terminal {
    Completed,
    Failed(ReactiveError),
}

struct Replay<T: Send + 'static> {
    source: Option<ReactiveStream<T>>,
    upstream: Option<Subscription<T>>,
    items: Vec<T>,
    terminal: Option<Terminal>,
}

impl<T: Clone + Send + 'static> Replay<T> {
    async fn item_at(&mut self, index: usize) -> Option<Result<T, ReactiveError>> {
        if let Some(item) = self.items.get(index) {
            return Some(Ok(item.clone()));
        }
        match &self.terminal {
            Some(Terminal::Completed) => return None,
            Some(Terminal::Failed(err)) => {
                return (index == self.items.len()).then(|| Err(err.clone()));
            }
            None => {}
        }
        if self.upstream.is_none() {
            self.upstream = self.source.take().map(|source| source.subscribe());
        }
        let upstream = self.upstream.as_mut()?;
        match upstream.next().await {
            Some(Ok(item)) => {
                self.items.push(item.clone());
                Some(Ok(item))
            }
            Some(Err(err)) => {
                self.terminal = Some(Terminal::Failed(err.clone()));
                Some(Err(err))
            }
            None => {
                self.terminal = Some(Terminal::Completed);
                None
            }
        }
    }
}

fn replay_items<T: Clone + Send + 'static>(
    replay: Arc<tokio::sync::Mutex<Replay<T>>>,
) -> ItemStream<T> {
    stream::unfold((replay, 0usize), |(replay, index)| async move {
        let next = replay.lock().await.item_at(index).await;
        next.map(|item| (item, (replay, index + 1)))
    })
    .boxed()
}

/// One subscriber's view of a [`ReactiveStream`].
///
/// Yields items in upstream order; after an `Err` or the end of the stream
/// it stays terminated. Dropping the subscription cancels it.
pub struct Subscription<T> {
    inner: Option<ItemStream<T>>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(inner: ItemStream<T>) -> Self {
        Self { inner: Some(inner) }
    }

    /// Stops delivery and releases the upstream publisher.
    pub fn cancel(&mut self) {
        if self.inner.take().is_some() {
            debug!("Subscription cancelled");
            metrics::record_terminal("cancel");
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T, ReactiveError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(item))) => Poll::Ready(Some(Ok(item))),
            Poll::Ready(Some(Err(err))) => {
                self.inner = None;
                metrics::record_terminal("error");
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                self.inner = None;
                metrics::record_terminal("complete");
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> FusedStream for Subscription<T> {
    fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DriverError;
    use crate::testing::{numbered_pages, ScriptedPublisher};

    async fn drain<T>(subscription: &mut Subscription<T>) -> (Vec<T>, Vec<ReactiveError>) {
        let mut items = Vec::new();
        let mut errors = Vec::new();
        while let Some(next) = subscription.next().await {
            match next {
                Ok(item) => items.push(item),
                Err(err) => errors.push(err),
            }
        }
        (items, errors)
    }

    #[tokio::test]
    async fn test_two_pages_of_five_deliver_ten_items_then_complete() {
        let (publisher, probe) = ScriptedPublisher::new(numbered_pages(10, 5));
        let stream = adapt(publisher.boxed());

        let mut subscription = stream.subscribe();
        let (items, errors) = drain(&mut subscription).await;

        assert_eq!(items, (0..10usize).collect::<Vec<_>>());
        assert!(errors.is_empty());
        assert!(subscription.is_terminated());
        // two pages plus the end-of-pages probe
        assert_eq!(probe.fetches(), 3);
        assert_eq!(probe.cancels(), 0);
    }

    #[tokio::test]
    async fn test_no_fetch_before_demand() {
        let (publisher, probe) = ScriptedPublisher::new(numbered_pages(4, 2));
        let stream = adapt(publisher.boxed());
        let _subscription = stream.subscribe();
        tokio::task::yield_now().await;
        assert_eq!(probe.fetches(), 0);
    }

    #[tokio::test]
    async fn test_one_at_a_time_fetches_pages_lazily() {
        let (publisher, probe) = ScriptedPublisher::new(numbered_pages(10, 5));
        let stream = adapt(publisher.boxed());
        let mut subscription = stream.subscribe();

        for expected in 0..5 {
            assert_eq!(subscription.next().await.unwrap().unwrap(), expected);
        }
        assert_eq!(probe.fetches(), 1);

        assert_eq!(subscription.next().await.unwrap().unwrap(), 5);
        assert_eq!(probe.fetches(), 2);

        let (rest, _) = drain(&mut subscription).await;
        assert_eq!(rest, vec![6, 7, 8, 9]);
    }

    #[tokio::test]
    async fn test_empty_pages_are_skipped() {
        let (publisher, _) = ScriptedPublisher::new(vec![vec![], vec![1], vec![], vec![2, 3]]);
        let mut subscription = adapt(publisher.boxed()).subscribe();
        let (items, errors) = drain(&mut subscription).await;
        assert_eq!(items, vec![1, 2, 3]);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_failure_mid_stream_delivers_prefix_then_one_error() {
        let err = DriverError::Unavailable("replica down".to_string());
        let (publisher, probe) =
            ScriptedPublisher::failing_after(numbered_pages(7, 3), err.clone());
        let mut subscription = adapt(publisher.boxed()).subscribe();

        let (items, errors) = drain(&mut subscription).await;
        assert_eq!(items, (0..7usize).collect::<Vec<_>>());
        assert_eq!(errors, vec![ReactiveError::UpstreamFailure(err)]);
        assert!(subscription.next().await.is_none());
        assert_eq!(probe.cancels(), 0);
    }

    #[tokio::test]
    async fn test_cancel_stops_fetching() {
        let (publisher, probe) = ScriptedPublisher::new(numbered_pages(10, 5));
        let mut subscription = adapt(publisher.boxed()).subscribe();

        for _ in 0..3 {
            subscription.next().await.unwrap().unwrap();
        }
        subscription.cancel();

        assert!(subscription.next().await.is_none());
        assert_eq!(probe.fetches(), 1);
        assert_eq!(probe.cancels(), 1);
    }

    #[tokio::test]
    async fn test_drop_cancels_upstream() {
        let (publisher, probe) = ScriptedPublisher::new(numbered_pages(10, 5));
        let stream = adapt(publisher.boxed());
        {
            let mut subscription = stream.subscribe();
            subscription.next().await.unwrap().unwrap();
        }
        assert_eq!(probe.cancels(), 1);
        assert_eq!(probe.fetches(), 1);
    }

    #[tokio::test]
    async fn test_drop_counts_as_cancel_signal() {
        let cancels = || metrics::TERMINAL_SIGNALS.with_label_values(&["cancel"]).get();
        let (publisher, _) = ScriptedPublisher::new(numbered_pages(4, 2));
        let stream = adapt(publisher.boxed());
        let before = cancels();

        let mut subscription = stream.subscribe();
        subscription.next().await.unwrap().unwrap();
        drop(subscription);

        assert!(cancels() > before);
    }

    #[tokio::test]
    async fn test_second_subscription_is_rejected() {
        let (publisher, _) = ScriptedPublisher::new(numbered_pages(3, 3));
        let stream = adapt(publisher.boxed());

        let mut first = stream.subscribe();
        let mut second = stream.subscribe();

        assert!(matches!(
            second.next().await,
            Some(Err(ReactiveError::DoubleSubscription))
        ));
        assert!(second.next().await.is_none());

        let (items, _) = drain(&mut first).await;
        assert_eq!(items, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_failed_stream_replays_error_to_every_subscriber() {
        let stream: ReactiveStream<u32> = ReactiveStream::failed(ReactiveError::EmptyResult);
        for _ in 0..3 {
            let mut subscription = stream.subscribe();
            assert_eq!(
                subscription.next().await,
                Some(Err(ReactiveError::EmptyResult))
            );
            assert!(subscription.next().await.is_none());
        }
    }

    #[tokio::test]
    async fn test_map_and_filter_preserve_order() {
        let (publisher, _) = ScriptedPublisher::new(numbered_pages(6, 4));
        let stream = adapt(publisher.boxed())
            .map(|n| n * 10)
            .try_filter_map(|n| Ok((n % 20 == 0).then_some(n)));
        let (items, _) = drain(&mut stream.subscribe()).await;
        assert_eq!(items, vec![0, 20, 40]);
    }

    #[tokio::test]
    async fn test_mapping_error_terminates_stream() {
        let (publisher, probe) = ScriptedPublisher::new(numbered_pages(10, 5));
        let stream = adapt(publisher.boxed()).try_filter_map(|n| {
            if n == 2 {
                Err(ReactiveError::Mapping("bad row".to_string()))
            } else {
                Ok(Some(n))
            }
        });
        let mut subscription = stream.subscribe();
        let (items, errors) = drain(&mut subscription).await;
        assert_eq!(items, vec![0, 1]);
        assert_eq!(errors.len(), 1);
        assert_eq!(probe.fetches(), 1);
        assert_eq!(probe.cancels(), 1);
    }

    #[tokio::test]
    async fn test_cache_replays_to_late_subscribers() {
        let (publisher, probe) = ScriptedPublisher::new(numbered_pages(4, 2));
        let stream = adapt(publisher.boxed()).cache();

        let (first, _) = drain(&mut stream.subscribe()).await;
        let (second, _) = drain(&mut stream.subscribe()).await;

        assert_eq!(first, vec![0, 1, 2, 3]);
        assert_eq!(second, first);
        assert_eq!(probe.fetches(), 3);
    }

    #[tokio::test]
    async fn test_cache_replays_terminal_error() {
        let err = DriverError::Query("timeout".to_string());
        let (publisher, _) = ScriptedPublisher::failing_after(vec![vec![1]], err.clone());
        let stream = adapt(publisher.boxed()).cache();

        for _ in 0..2 {
            let (items, errors) = drain(&mut stream.subscribe()).await;
            assert_eq!(items, vec![1]);
            assert_eq!(errors, vec![ReactiveError::UpstreamFailure(err.clone())]);
        }
    }
}
