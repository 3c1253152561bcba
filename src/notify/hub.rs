//! Notification Hub
//!
//! One bounded outbound queue per subscriber identity, keyed by user id.
//! This address space is independent of the signaling connection-id space:
//! a single physical client may appear in both, but the two registries never
//! reference each other.
//!
//! Queues are tokio broadcast channels: bounded, oldest-dropped-first on
//! overflow, so a stalled consumer sees the most recent N events rather than
//! stalling publishers or growing without bound.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;

use super::message::{HubEvent, Notification};

/// Subscription state for one user
struct Subscription {
    tx: broadcast::Sender<HubEvent>,
    /// Taken from the hub-wide counter on every (re-)subscribe, so an epoch
    /// is never reused across generations of the same user's subscription.
    /// The stream holding the current epoch owns teardown; any stale stream's
    /// cancellation is a no-op.
    epoch: u64,
}

type SubscriptionMap = Arc<RwLock<HashMap<String, Subscription>>>;

/// Configuration for the notification hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Per-user queue capacity; on overflow the oldest event is dropped
    pub queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { queue_capacity: 64 }
    }
}

/// Per-user publish/subscribe hub for out-of-band push notifications
pub struct NotificationHub {
    subscriptions: SubscriptionMap,
    /// Source of unique stream epochs, bumped on every subscribe
    next_epoch: AtomicU64,
    config: HubConfig,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl NotificationHub {
    pub fn new(mut config: HubConfig) -> Self {
        // A broadcast channel needs room for at least one event
        config.queue_capacity = config.queue_capacity.max(1);
        Self {
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            next_epoch: AtomicU64::new(0),
            config,
        }
    }

    /// Open the subscription stream for a user, creating the queue lazily
    ///
    /// Re-subscribing while a stream is live reattaches to the existing queue
    /// rather than replacing it, so a client that reconnects before its prior
    /// stream observed cancellation does not orphan the queue. The newest
    /// stream takes over teardown ownership.
    pub async fn subscribe(&self, user_id: &str) -> SubscriberStream {
        let mut subs = self.subscriptions.write().await;

        // Globally unique, so a guard from a torn-down generation of this
        // user's subscription can never match a later generation's epoch
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);

        let rx = match subs.get_mut(user_id) {
            Some(sub) => {
                sub.epoch = epoch;
                tracing::info!(user_id = %user_id, "reattached to existing subscription");
                sub.tx.subscribe()
            }
            None => {
                let (tx, rx) = broadcast::channel(self.config.queue_capacity);
                subs.insert(user_id.to_string(), Subscription { tx, epoch });
                tracing::info!(user_id = %user_id, "subscription created");
                rx
            }
        };

        SubscriberStream {
            inner: BroadcastStream::new(rx),
            guard: ReleaseGuard {
                subscriptions: Arc::clone(&self.subscriptions),
                user_id: user_id.to_string(),
                epoch,
            },
        }
    }

    /// Enqueue a notification for a single user
    ///
    /// Publishing to a user with no live subscription is a normal, expected
    /// outcome: it returns false and is logged, never an error.
    pub async fn publish(&self, user_id: &str, notification: Notification) -> bool {
        let subs = self.subscriptions.read().await;
        match subs.get(user_id) {
            Some(sub) => match sub.tx.send(HubEvent::Message(notification)) {
                Ok(_) => true,
                Err(_) => {
                    // All receivers gone; the stream's guard will remove the entry
                    tracing::debug!(user_id = %user_id, "subscription stream gone, notification dropped");
                    false
                }
            },
            None => {
                tracing::debug!(user_id = %user_id, "publish to offline user, notification dropped");
                false
            }
        }
    }

    /// Enqueue a notification for each of the given users independently
    ///
    /// One offline or failed user never affects delivery to the others.
    /// Returns how many users were actually reached.
    pub async fn publish_many(&self, user_ids: &[String], notification: Notification) -> usize {
        let mut reached = 0;
        for user_id in user_ids {
            if self.publish(user_id, notification.clone()).await {
                reached += 1;
            }
        }
        reached
    }

    /// Emit the synthetic "connected" acknowledgement on a user's stream
    ///
    /// The one operation where absence is a genuine caller error: the caller
    /// is expected to have just subscribed.
    pub async fn acknowledge_connected(&self, user_id: &str) -> Result<(), HubError> {
        let subs = self.subscriptions.read().await;
        let sub = subs
            .get(user_id)
            .ok_or_else(|| HubError::NoSuchSubscription(user_id.to_string()))?;

        sub.tx
            .send(HubEvent::Connected)
            .map(|_| ())
            .map_err(|_| HubError::NoSuchSubscription(user_id.to_string()))
    }

    /// Complete and remove a user's queue; idempotent
    ///
    /// Dropping the sender closes the channel, which ends any stream still
    /// attached to it.
    pub async fn unsubscribe(&self, user_id: &str) {
        if self.subscriptions.write().await.remove(user_id).is_some() {
            tracing::info!(user_id = %user_id, "subscription removed");
        }
    }

    /// Whether a user currently has a subscription
    pub async fn is_subscribed(&self, user_id: &str) -> bool {
        self.subscriptions.read().await.contains_key(user_id)
    }

    /// Number of live subscriptions
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

/// A user's open subscription stream
///
/// Yields hub events in enqueue order; on overflow the oldest buffered events
/// are dropped, logged with the drop count, and the stream continues with the
/// most recent ones. Dropping the stream (client cancelled) releases the
/// subscription, unless a newer stream has taken ownership since.
pub struct SubscriberStream {
    inner: BroadcastStream<HubEvent>,
    guard: ReleaseGuard,
}

impl Stream for SubscriberStream {
    type Item = HubEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(dropped)))) => {
                    tracing::warn!(
                        user_id = %this.guard.user_id,
                        dropped,
                        "notification queue overflowed, oldest dropped"
                    );
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Removes the subscription when the owning stream goes away
struct ReleaseGuard {
    subscriptions: SubscriptionMap,
    user_id: String,
    epoch: u64,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        let subs = Arc::clone(&self.subscriptions);
        let user_id = std::mem::take(&mut self.user_id);
        let epoch = self.epoch;

        // Streams drop inside the server runtime; if the runtime itself is
        // shutting down there is nothing left worth cleaning up.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let mut map = subs.write().await;
                let current = map.get(&user_id).map(|sub| sub.epoch);
                if current == Some(epoch) {
                    map.remove(&user_id);
                    tracing::info!(user_id = %user_id, "subscription stream cancelled, queue released");
                }
            });
        }
    }
}

/// Errors raised by the notification hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("no active subscription for user {0}")]
    NoSuchSubscription(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    fn note(n: usize) -> Notification {
        Notification::new(format!("id-{n}"), format!("body-{n}"), "1")
    }

    #[tokio::test]
    async fn test_subscribe_publish_receive() {
        let hub = NotificationHub::default();
        let mut stream = hub.subscribe("u1").await;

        assert!(hub.publish("u1", Notification::new("u1", "hello", "1")).await);

        match stream.next().await.unwrap() {
            HubEvent::Message(n) => {
                assert_eq!(n.id, "u1");
                assert_eq!(n.message, "hello");
                assert_eq!(n.level, "1");
            }
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_to_offline_user_returns_false() {
        let hub = NotificationHub::default();
        assert!(!hub.publish("nobody", note(1)).await);
    }

    #[tokio::test]
    async fn test_publish_after_unsubscribe_returns_false() {
        let hub = NotificationHub::default();
        let _stream = hub.subscribe("u1").await;
        hub.unsubscribe("u1").await;
        assert!(!hub.publish("u1", note(1)).await);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let hub = NotificationHub::default();
        hub.unsubscribe("u1").await;
        hub.unsubscribe("u1").await;
        assert_eq!(hub.subscription_count().await, 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_ends_stream() {
        let hub = NotificationHub::default();
        let mut stream = hub.subscribe("u1").await;
        hub.unsubscribe("u1").await;
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_resubscribe_reuses_queue() {
        let hub = NotificationHub::default();
        let _first = hub.subscribe("u1").await;
        let mut second = hub.subscribe("u1").await;

        // Still one subscription entry, and the new stream is attached to it
        assert_eq!(hub.subscription_count().await, 1);
        assert!(hub.publish("u1", note(1)).await);
        assert!(matches!(
            second.next().await.unwrap(),
            HubEvent::Message(_)
        ));
    }

    #[tokio::test]
    async fn test_stale_stream_drop_does_not_kill_successor() {
        let hub = NotificationHub::default();
        let first = hub.subscribe("u1").await;
        let mut second = hub.subscribe("u1").await;

        drop(first);
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The superseded stream's cancellation must not tear down the live one
        assert!(hub.is_subscribed("u1").await);
        assert!(hub.publish("u1", note(1)).await);
        assert!(second.next().await.is_some());
    }

    #[tokio::test]
    async fn test_stale_guard_from_prior_generation_is_a_noop() {
        let hub = NotificationHub::default();

        // First generation of u1's subscription, then explicit teardown
        let old_stream = hub.subscribe("u1").await;
        hub.unsubscribe("u1").await;

        // Second generation, created after the first was removed
        let mut live = hub.subscribe("u1").await;

        // The first generation's stream going away must not release the
        // freshly created subscription
        drop(old_stream);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(hub.is_subscribed("u1").await);
        assert!(hub.publish("u1", note(1)).await);
        assert!(live.next().await.is_some());
    }

    #[tokio::test]
    async fn test_owning_stream_drop_releases_subscription() {
        let hub = NotificationHub::default();
        let stream = hub.subscribe("u1").await;

        drop(stream);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!hub.is_subscribed("u1").await);
        assert!(!hub.publish("u1", note(1)).await);
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest_keeps_newest_in_order() {
        let capacity = 4;
        let hub = NotificationHub::new(HubConfig {
            queue_capacity: capacity,
        });
        let mut stream = hub.subscribe("u1").await;

        for n in 1..=capacity + 1 {
            assert!(hub.publish("u1", note(n)).await);
        }

        // The subscriber observes the most recent `capacity` messages, in order
        for expected in 2..=capacity + 1 {
            match stream.next().await.unwrap() {
                HubEvent::Message(n) => assert_eq!(n.id, format!("id-{expected}")),
                other => panic!("expected Message, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_publish_many_is_independent_per_user() {
        let hub = NotificationHub::default();
        let mut a = hub.subscribe("a").await;
        let mut c = hub.subscribe("c").await;

        let users = vec!["a".to_string(), "offline".to_string(), "c".to_string()];
        let reached = hub.publish_many(&users, note(1)).await;

        assert_eq!(reached, 2);
        assert!(a.next().await.is_some());
        assert!(c.next().await.is_some());
    }

    #[tokio::test]
    async fn test_acknowledge_connected() {
        let hub = NotificationHub::default();
        let mut stream = hub.subscribe("u1").await;

        hub.acknowledge_connected("u1").await.unwrap();
        assert!(matches!(stream.next().await.unwrap(), HubEvent::Connected));
    }

    #[tokio::test]
    async fn test_acknowledge_connected_without_subscription() {
        let hub = NotificationHub::default();
        let err = hub.acknowledge_connected("u1").await.unwrap_err();
        assert!(matches!(err, HubError::NoSuchSubscription(_)));
    }

    #[tokio::test]
    async fn test_notifications_arrive_in_enqueue_order() {
        let hub = NotificationHub::default();
        let mut stream = hub.subscribe("u1").await;

        for n in 1..=3 {
            hub.publish("u1", note(n)).await;
        }
        for expected in 1..=3 {
            match stream.next().await.unwrap() {
                HubEvent::Message(n) => assert_eq!(n.id, format!("id-{expected}")),
                other => panic!("expected Message, got {other:?}"),
            }
        }
    }
}
