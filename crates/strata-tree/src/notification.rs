//! Change notifications through a durable outbox.
//!
//! Every mutation appends a [`Notification`] with `processed = false`,
//! then attempts delivery. A failed delivery leaves the record pending for
//! [`Notifier::dispatch_pending`]; it never fails the mutation itself.

use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_types::{EntityId, NotificationSettings, Timestamp};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{ModelError, ModelResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Delete,
    Update,
    Index,
    Move,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Update => "update",
            Self::Index => "index",
            Self::Move => "move",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Resource,
    Collection,
    User,
    Group,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Collection => "collection",
            Self::User => "user",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a pub/sub topic: `<operation>/<type>/<uuid>/<path>` with empty
/// segments dropped and the wildcards `#` and `+` removed.
pub fn build_topic(operation: Operation, object_type: ObjectType, uuid: &str, path: &str) -> String {
    let joined = format!("{operation}/{object_type}/{uuid}/{path}");
    joined
        .replace(['#', '+'], "")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// One outbox record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: EntityId,
    pub operation: Operation,
    pub object_type: ObjectType,
    pub object_uuid: String,
    pub path: String,
    pub username: Option<String>,
    pub payload: String,
    pub processed: bool,
    pub when: Timestamp,
}

impl Notification {
    pub fn topic(&self) -> String {
        build_topic(self.operation, self.object_type, &self.object_uuid, &self.path)
    }
}

/// Durable store of notifications awaiting delivery.
pub trait Outbox: Send + Sync {
    fn append(&self, notification: &Notification) -> ModelResult<()>;

    /// Unprocessed records in append order.
    fn pending(&self) -> ModelResult<Vec<Notification>>;

    /// Returns `true` if the record existed.
    fn mark_processed(&self, id: &EntityId) -> ModelResult<bool>;
}

#[derive(Debug, Default)]
pub struct InMemoryOutbox {
    records: RwLock<Vec<Notification>>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record, processed or not.
    pub fn all(&self) -> Vec<Notification> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }
}

fn poisoned() -> ModelError {
    ModelError::undiagnosed("accessing outbox", "lock poisoned")
}

impl Outbox for InMemoryOutbox {
    fn append(&self, notification: &Notification) -> ModelResult<()> {
        self.records
            .write()
            .map_err(|_| poisoned())?
            .push(notification.clone());
        Ok(())
    }

    fn pending(&self) -> ModelResult<Vec<Notification>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.iter().filter(|n| !n.processed).cloned().collect())
    }

    fn mark_processed(&self, id: &EntityId) -> ModelResult<bool> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        match records.iter_mut().find(|n| n.id == *id) {
            Some(n) => {
                n.processed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Delivery channel for notifications.
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &str) -> ModelResult<()>;
}

/// Discards every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPublish;

impl Publisher for NoPublish {
    fn publish(&self, _topic: &str, _payload: &str) -> ModelResult<()> {
        Ok(())
    }
}

/// A delivered message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
}

/// A broadcast channel receiver for published messages.
pub type MessageStream = broadcast::Receiver<Published>;

struct Subscriber {
    prefix: Option<String>,
    sender: broadcast::Sender<Published>,
}

/// In-process fan-out publisher. Each subscriber gets its own broadcast
/// channel and an optional topic prefix filter.
pub struct BroadcastPublisher {
    subscribers: RwLock<Vec<Subscriber>>,
    capacity: usize,
}

impl BroadcastPublisher {
    /// A publisher whose subscribers each buffer up to `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to topics starting with `prefix`, or to everything.
    pub fn subscribe(&self, prefix: Option<&str>) -> ModelResult<MessageStream> {
        let (sender, rx) = broadcast::channel(self.capacity);
        self.subscribers
            .write()
            .map_err(|_| ModelError::undiagnosed("subscribing", "lock poisoned"))?
            .push(Subscriber {
                prefix: prefix.map(str::to_string),
                sender,
            });
        Ok(rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }
}

impl Publisher for BroadcastPublisher {
    fn publish(&self, topic: &str, payload: &str) -> ModelResult<()> {
        let mut subscribers = self
            .subscribers
            .write()
            .map_err(|_| ModelError::Delivery("publisher lock poisoned".into()))?;
        let message = Published {
            topic: topic.to_string(),
            payload: payload.to_string(),
        };
        // A send error means every receiver of that subscriber was dropped.
        subscribers.retain(|sub| {
            let wanted = sub.prefix.as_deref().map_or(true, |p| topic.starts_with(p));
            !wanted || sub.sender.send(message.clone()).is_ok()
        });
        Ok(())
    }
}

impl fmt::Debug for BroadcastPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastPublisher")
            .field("subscribers", &self.subscriber_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Writes notifications to the outbox and pushes them to the publisher.
#[derive(Clone)]
pub struct Notifier {
    outbox: Arc<dyn Outbox>,
    publisher: Arc<dyn Publisher>,
    enabled: bool,
}

impl Notifier {
    /// An enabled notifier writing to `outbox` and delivering through
    /// `publisher`.
    pub fn new(outbox: Arc<dyn Outbox>, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            outbox,
            publisher,
            enabled: true,
        }
    }

    pub fn from_settings(
        settings: &NotificationSettings,
        outbox: Arc<dyn Outbox>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            enabled: settings.enabled,
            ..Self::new(outbox, publisher)
        }
    }

    /// A notifier that records nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(Arc::new(InMemoryOutbox::new()), Arc::new(NoPublish))
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn outbox(&self) -> &Arc<dyn Outbox> {
        &self.outbox
    }

    /// Append a pending record and try to deliver it right away.
    ///
    /// Returns the record as stored, or `None` when disabled or when the
    /// outbox rejected it. Never fails.
    pub fn record(
        &self,
        operation: Operation,
        object_type: ObjectType,
        object_uuid: &str,
        path: &str,
        username: Option<&str>,
        payload: &Value,
    ) -> Option<Notification> {
        if !self.enabled {
            return None;
        }
        let mut notification = Notification {
            id: EntityId::new(),
            operation,
            object_type,
            object_uuid: object_uuid.to_string(),
            path: path.to_string(),
            username: username.map(str::to_string),
            payload: payload.to_string(),
            processed: false,
            when: strata_types::now(),
        };
        if let Err(e) = self.outbox.append(&notification) {
            warn!(error = %e, path = %path, "notification not recorded");
            return None;
        }
        if self.deliver(&notification) {
            notification.processed = true;
        }
        Some(notification)
    }

    /// Retry every pending record. Returns the number delivered.
    pub fn dispatch_pending(&self) -> ModelResult<usize> {
        let mut delivered = 0;
        for notification in self.outbox.pending()? {
            if self.deliver(&notification) {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    fn deliver(&self, notification: &Notification) -> bool {
        let topic = notification.topic();
        if let Err(e) = self.publisher.publish(&topic, &notification.payload) {
            warn!(topic = %topic, error = %e, "notification delivery failed");
            return false;
        }
        match self.outbox.mark_processed(&notification.id) {
            Ok(_) => {
                debug!(topic = %topic, "notification delivered");
                true
            }
            Err(e) => {
                warn!(topic = %topic, error = %e, "delivered notification not marked");
                false
            }
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Fails until switched on.
    #[derive(Default)]
    struct Flaky {
        up: AtomicBool,
    }

    impl Publisher for Flaky {
        fn publish(&self, _topic: &str, _payload: &str) -> ModelResult<()> {
            if self.up.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(ModelError::Delivery("broker unavailable".into()))
            }
        }
    }

    // ------------------------------------------------------------------
    // Topics
    // ------------------------------------------------------------------

    #[test]
    fn topic_collapses_slashes() {
        assert_eq!(
            build_topic(Operation::Create, ObjectType::Resource, "", "/a/b.txt"),
            "create/resource/a/b.txt"
        );
        assert_eq!(
            build_topic(Operation::Delete, ObjectType::Collection, "abc", "//x//"),
            "delete/collection/abc/x"
        );
    }

    #[test]
    fn topic_strips_wildcards() {
        assert_eq!(
            build_topic(Operation::Update, ObjectType::Resource, "", "/a/#/b+c"),
            "update/resource/a/bc"
        );
    }

    // ------------------------------------------------------------------
    // Outbox
    // ------------------------------------------------------------------

    #[test]
    fn delivered_records_are_processed() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let notifier = Notifier::new(outbox.clone(), Arc::new(NoPublish));
        let n = notifier
            .record(Operation::Create, ObjectType::Collection, "", "/a", Some("alice"), &json!({}))
            .unwrap();
        assert!(n.processed);
        assert!(outbox.pending().unwrap().is_empty());
        assert_eq!(outbox.all().len(), 1);
        assert_eq!(outbox.all()[0].username.as_deref(), Some("alice"));
    }

    #[test]
    fn failed_delivery_stays_pending_until_dispatch() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let publisher = Arc::new(Flaky::default());
        let notifier = Notifier::new(outbox.clone(), publisher.clone());

        let n = notifier
            .record(Operation::Delete, ObjectType::Resource, "", "/a/f", None, &json!({}))
            .unwrap();
        assert!(!n.processed);
        assert_eq!(outbox.pending().unwrap().len(), 1);
        assert_eq!(notifier.dispatch_pending().unwrap(), 0);

        publisher.up.store(true, Ordering::SeqCst);
        assert_eq!(notifier.dispatch_pending().unwrap(), 1);
        assert!(outbox.pending().unwrap().is_empty());
    }

    #[test]
    fn disabled_notifier_records_nothing() {
        let settings = NotificationSettings {
            enabled: false,
            ..Default::default()
        };
        let outbox = Arc::new(InMemoryOutbox::new());
        let notifier = Notifier::from_settings(&settings, outbox.clone(), Arc::new(NoPublish));
        assert!(notifier
            .record(Operation::Create, ObjectType::Resource, "", "/x", None, &json!({}))
            .is_none());
        assert!(outbox.all().is_empty());
        assert!(!Notifier::disabled().is_enabled());
    }

    // ------------------------------------------------------------------
    // Broadcast
    // ------------------------------------------------------------------

    #[test]
    fn broadcast_fans_out_by_prefix() {
        let publisher = BroadcastPublisher::new(16);
        let mut all = publisher.subscribe(None).unwrap();
        let mut deletes = publisher.subscribe(Some("delete/")).unwrap();

        publisher.publish("create/resource/a", "{}").unwrap();
        publisher.publish("delete/resource/a", "{}").unwrap();

        assert_eq!(all.try_recv().unwrap().topic, "create/resource/a");
        assert_eq!(all.try_recv().unwrap().topic, "delete/resource/a");
        assert_eq!(deletes.try_recv().unwrap().topic, "delete/resource/a");
        assert!(deletes.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let publisher = BroadcastPublisher::new(4);
        let rx = publisher.subscribe(None).unwrap();
        drop(rx);
        assert_eq!(publisher.subscriber_count(), 1);
        publisher.publish("create/x", "{}").unwrap();
        assert_eq!(publisher.subscriber_count(), 0);
    }
}
