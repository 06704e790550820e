//! MUSTER Bus - Topic Pub/Sub Transport
//!
//! Topic-addressed message transport with two delivery modes:
//!
//! - **Push**: subscribers registered with [`MessageBus::subscribe`] are
//!   invoked for every future publish on their topic, in subscription order.
//! - **Pull**: [`MessageBus::create_queue`] lazily creates an unbounded FIFO
//!   queue per topic; consumers drain it through a [`TopicQueue`] handle.
//!
//! Per-topic ordering is guaranteed for both modes; nothing is guaranteed
//! across topics. A publish completes only after every subscriber has been
//! invoked and the queue enqueue (if any) has been accepted; delivery is
//! not fire-and-forget. A failing subscriber is isolated: its error is
//! logged and delivery continues to the remaining subscribers and the queue.

use async_trait::async_trait;
use muster_core::{BusError, Message, MusterResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

// ============================================================================
// SUBSCRIBER CONTRACT
// ============================================================================

/// Push-delivery contract for topic subscribers.
///
/// Invoked once per publish on the subscribed topic, in subscription order.
/// The callback may suspend. A returned error is reported and isolated; it
/// never prevents delivery to the remaining subscribers or the topic queue.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Handle a message published on a subscribed topic.
    async fn on_message(&self, message: &Message) -> MusterResult<()>;
}

// ============================================================================
// TOPIC QUEUE
// ============================================================================

/// Pull handle for a topic's FIFO queue.
///
/// Cloneable; all clones drain the same queue. The receiver sits behind an
/// async mutex, so concurrent consumers are safe but each message is
/// delivered to exactly one of them.
#[derive(Clone)]
pub struct TopicQueue {
    receiver: Arc<tokio::sync::Mutex<UnboundedReceiver<Message>>>,
}

impl TopicQueue {
    fn new(receiver: UnboundedReceiver<Message>) -> Self {
        Self {
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
        }
    }

    /// Wait for the next message in FIFO order.
    pub async fn recv(&self) -> Option<Message> {
        self.receiver.lock().await.recv().await
    }

    /// Take the next message if one is already queued.
    pub async fn try_recv(&self) -> Option<Message> {
        self.receiver.lock().await.try_recv().ok()
    }
}

/// Sender half plus the shared consumer handle for one topic.
struct QueueSlot {
    sender: UnboundedSender<Message>,
    queue: TopicQueue,
}

// ============================================================================
// MESSAGE BUS
// ============================================================================

/// Asynchronous message bus for agent communication.
#[derive(Default)]
pub struct MessageBus {
    subscribers: RwLock<HashMap<String, Vec<Arc<dyn Subscriber>>>>,
    queues: Mutex<HashMap<String, QueueSlot>>,
}

impl MessageBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a topic with a push callback.
    ///
    /// Subscribers receive every *future* publish on the topic, in
    /// subscription order. There is no unsubscribe.
    pub fn subscribe(&self, topic: impl Into<String>, subscriber: Arc<dyn Subscriber>) -> MusterResult<()> {
        let topic = topic.into();
        let mut subscribers = self
            .subscribers
            .write()
            .map_err(|_| BusError::LockPoisoned)?;
        subscribers.entry(topic.clone()).or_default().push(subscriber);
        debug!(topic = %topic, "subscribed");
        Ok(())
    }

    /// Publish a message to a topic.
    ///
    /// Delivers sequentially to every currently-subscribed callback, then
    /// enqueues onto the topic queue if one exists. Returns only after all
    /// deliveries are done. Subscriber errors are logged and do not abort
    /// sibling deliveries.
    pub async fn publish(&self, topic: &str, message: Message) -> MusterResult<()> {
        debug!(topic = topic, message_id = %message.id, "publishing");

        // Snapshot under the lock, deliver outside it; the lock is never
        // held across an await.
        let targets: Vec<Arc<dyn Subscriber>> = {
            let subscribers = self
                .subscribers
                .read()
                .map_err(|_| BusError::LockPoisoned)?;
            subscribers.get(topic).cloned().unwrap_or_default()
        };

        for subscriber in &targets {
            if let Err(error) = subscriber.on_message(&message).await {
                warn!(
                    topic = topic,
                    message_id = %message.id,
                    %error,
                    "subscriber failed; continuing delivery"
                );
            }
        }

        let sender = {
            let queues = self.queues.lock().map_err(|_| BusError::LockPoisoned)?;
            queues.get(topic).map(|slot| slot.sender.clone())
        };
        if let Some(sender) = sender {
            // The bus retains the consumer handle, so the channel cannot
            // close while the bus is alive.
            sender.send(message).map_err(|_| BusError::QueueClosed {
                topic: topic.to_string(),
            })?;
        }

        Ok(())
    }

    /// Lazily create (or fetch the existing) FIFO queue for a topic.
    pub fn create_queue(&self, topic: impl Into<String>) -> MusterResult<TopicQueue> {
        let topic = topic.into();
        let mut queues = self.queues.lock().map_err(|_| BusError::LockPoisoned)?;
        let slot = queues.entry(topic).or_insert_with(|| {
            let (sender, receiver) = mpsc::unbounded_channel();
            QueueSlot {
                sender,
                queue: TopicQueue::new(receiver),
            }
        });
        Ok(slot.queue.clone())
    }
}
