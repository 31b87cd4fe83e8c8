//! Connection hub: one WebSocket, many topic subscriptions.
//!
//! The hub owns the socket through two background tasks (a writer draining
//! a command queue plus heartbeats, and a reader routing incoming insert
//! frames) and fans events out per topic over tokio broadcast channels.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

use crate::protocol::{InsertEvent, Topic, WireMessage};
use crate::RealtimeError;

/// Capacity of each per-topic broadcast channel. A slow consumer past this
/// point observes [`RealtimeError::Lagged`] instead of blocking the reader.
const TOPIC_CHANNEL_CAPACITY: usize = 256;

/// Interval between client heartbeat frames.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Commands from subscription bookkeeping to the writer task.
enum Command {
    Subscribe(String),
    Unsubscribe(String),
}

struct TopicEntry {
    sender: broadcast::Sender<InsertEvent>,
    guards: usize,
}

struct Shared {
    topics: Mutex<HashMap<String, TopicEntry>>,
    commands: mpsc::UnboundedSender<Command>,
}

/// Handle to a live realtime connection.
///
/// Cheaply cloneable; all clones share the underlying socket. Dropping the
/// last clone closes the command queue, which ends the writer task and
/// lets the connection wind down.
#[derive(Clone)]
pub struct RealtimeHub {
    shared: Arc<Shared>,
}

impl RealtimeHub {
    /// Connect to the backend's realtime endpoint.
    ///
    /// The API key is passed as a query parameter, matching the backend's
    /// anonymous-key convention for WebSocket auth.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the WebSocket handshake
    /// fails.
    pub async fn connect(realtime_url: &str, api_key: &str) -> Result<Self, RealtimeError> {
        let mut url = Url::parse(realtime_url)?;
        url.query_pairs_mut().append_pair("apikey", api_key);

        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (mut write, mut read) = stream.split();

        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<Command>();

        let shared = Arc::new(Shared {
            topics: Mutex::new(HashMap::new()),
            commands: command_tx,
        });

        // Writer: subscribe/unsubscribe frames plus periodic heartbeats.
        tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            // The first tick fires immediately; skip it.
            heartbeat.tick().await;
            loop {
                let frame = tokio::select! {
                    command = command_rx.recv() => match command {
                        Some(Command::Subscribe(topic)) => WireMessage::Subscribe { topic },
                        Some(Command::Unsubscribe(topic)) => WireMessage::Unsubscribe { topic },
                        None => break,
                    },
                    _ = heartbeat.tick() => WireMessage::Heartbeat,
                };
                let Ok(text) = serde_json::to_string(&frame) else {
                    continue;
                };
                if let Err(e) = write.send(Message::Text(text)).await {
                    warn!("realtime write failed: {e}");
                    break;
                }
            }
            let _ = write.send(Message::Close(None)).await;
        });

        // Reader: route insert frames to topic channels by routing key.
        let reader_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                let frame: WireMessage = match serde_json::from_str(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("unparseable realtime frame: {e}");
                        continue;
                    }
                };
                match frame {
                    WireMessage::Insert { topic, table, record } => {
                        let topics = match reader_shared.topics.lock() {
                            Ok(topics) => topics,
                            Err(_) => break,
                        };
                        if let Some(entry) = topics.get(&topic) {
                            // Send fails only when every receiver is gone,
                            // which the Drop bookkeeping makes transient.
                            let _ = entry.sender.send(InsertEvent { table, record });
                        }
                    }
                    WireMessage::Subscribed { topic } => {
                        debug!(topic, "realtime topic joined");
                    }
                    WireMessage::Heartbeat
                    | WireMessage::Subscribe { .. }
                    | WireMessage::Unsubscribe { .. } => {}
                }
            }
            debug!("realtime reader finished");
        });

        Ok(Self { shared })
    }

    /// Join a topic and return the guard that receives its events.
    ///
    /// Joining a topic that already has live guards reuses the existing
    /// channel; the backend sees one subscribe frame per distinct topic.
    #[must_use]
    pub fn subscribe(&self, topic: &Topic) -> Subscription {
        let key = topic.key();
        let receiver = {
            let mut topics = self
                .shared
                .topics
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let entry = topics.entry(key.clone()).or_insert_with(|| {
                let (sender, _) = broadcast::channel(TOPIC_CHANNEL_CAPACITY);
                let _ = self.shared.commands.send(Command::Subscribe(key.clone()));
                TopicEntry { sender, guards: 0 }
            });
            entry.guards += 1;
            entry.sender.subscribe()
        };
        Subscription {
            key,
            receiver,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Number of live guards for a topic. Zero once every subscription has
    /// been dropped.
    #[must_use]
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.shared
            .topics
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&topic.key())
            .map_or(0, |entry| entry.guards)
    }
}

/// A joined topic. Receives insert events in arrival order; releases the
/// topic on drop.
pub struct Subscription {
    key: String,
    receiver: broadcast::Receiver<InsertEvent>,
    shared: Arc<Shared>,
}

impl Subscription {
    /// Wait for the next insert event on this topic.
    ///
    /// # Errors
    ///
    /// [`RealtimeError::Closed`] once the connection is gone and the
    /// buffered events are drained; [`RealtimeError::Lagged`] if this
    /// subscriber fell behind the channel capacity.
    pub async fn recv(&mut self) -> Result<InsertEvent, RealtimeError> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Closed) => Err(RealtimeError::Closed),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                Err(RealtimeError::Lagged { missed })
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv); `None` when no event
    /// is currently queued.
    pub fn try_recv(&mut self) -> Option<InsertEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut topics = self
            .shared
            .topics
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(entry) = topics.get_mut(&self.key) {
            entry.guards = entry.guards.saturating_sub(1);
            if entry.guards == 0 {
                topics.remove(&self.key);
                let _ = self
                    .shared
                    .commands
                    .send(Command::Unsubscribe(self.key.clone()));
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Minimal in-process realtime server: acks subscribes, records every
    /// frame it receives, and pushes whatever the test feeds it.
    async fn mock_server() -> (
        String,
        mpsc::UnboundedSender<WireMessage>,
        mpsc::UnboundedReceiver<WireMessage>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (push_tx, mut push_rx) = mpsc::unbounded_channel::<WireMessage>();
        let (seen_tx, seen_rx) = mpsc::unbounded_channel::<WireMessage>();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let stream = tokio_tungstenite::accept_async(socket).await.unwrap();
            let (mut write, mut read) = stream.split();
            loop {
                tokio::select! {
                    frame = push_rx.recv() => {
                        let Some(frame) = frame else { break };
                        let text = serde_json::to_string(&frame).unwrap();
                        if write.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    message = read.next() => {
                        let Some(Ok(Message::Text(text))) = message else { break };
                        let frame: WireMessage = serde_json::from_str(&text).unwrap();
                        if let WireMessage::Subscribe { topic } = &frame {
                            let ack = serde_json::to_string(&WireMessage::Subscribed {
                                topic: topic.clone(),
                            })
                            .unwrap();
                            let _ = write.send(Message::Text(ack)).await;
                        }
                        let _ = seen_tx.send(frame);
                    }
                }
            }
        });

        (format!("ws://{addr}"), push_tx, seen_rx)
    }

    fn insert_frame(topic: &Topic, record: serde_json::Value) -> WireMessage {
        WireMessage::Insert {
            topic: topic.key(),
            table: topic.table_name().to_string(),
            record,
        }
    }

    #[tokio::test]
    async fn test_subscribe_receives_matching_inserts_in_order() {
        let (url, push, mut seen) = mock_server().await;
        let hub = RealtimeHub::connect(&url, "test-key").await.unwrap();

        let topic = Topic::filtered("chat_messages", "room_id", "r1");
        let mut sub = hub.subscribe(&topic);

        // Wait until the server saw the subscribe frame before pushing.
        let frame = seen.recv().await.unwrap();
        assert!(matches!(frame, WireMessage::Subscribe { topic } if topic.ends_with("eq.r1")));

        push.send(insert_frame(&topic, serde_json::json!({"n": 1})))
            .unwrap();
        push.send(insert_frame(&topic, serde_json::json!({"n": 2})))
            .unwrap();

        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        assert_eq!(first.record["n"], 1);
        assert_eq!(second.record["n"], 2);
    }

    #[tokio::test]
    async fn test_event_for_other_room_is_not_delivered() {
        let (url, push, mut seen) = mock_server().await;
        let hub = RealtimeHub::connect(&url, "test-key").await.unwrap();

        let mine = Topic::filtered("chat_messages", "room_id", "mine");
        let other = Topic::filtered("chat_messages", "room_id", "other");
        let mut sub = hub.subscribe(&mine);
        let _ = seen.recv().await.unwrap();

        // An event for a different room, then one for ours.
        push.send(insert_frame(&other, serde_json::json!({"room": "other"})))
            .unwrap();
        push.send(insert_frame(&mine, serde_json::json!({"room": "mine"})))
            .unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.record["room"], "mine");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_frames_are_delivered_twice() {
        // The channel may replay an insert after a reconnect; delivery
        // is as-received, deduplication is the consumer's problem.
        let (url, push, mut seen) = mock_server().await;
        let hub = RealtimeHub::connect(&url, "test-key").await.unwrap();

        let topic = Topic::filtered("chat_messages", "room_id", "r1");
        let mut sub = hub.subscribe(&topic);
        let _ = seen.recv().await.unwrap();

        let frame = insert_frame(&topic, serde_json::json!({"id": 7}));
        push.send(frame.clone()).unwrap();
        push.send(frame).unwrap();

        assert_eq!(sub.recv().await.unwrap().record["id"], 7);
        assert_eq!(sub.recv().await.unwrap().record["id"], 7);
    }

    #[tokio::test]
    async fn test_drop_releases_topic_and_unsubscribes() {
        let (url, _push, mut seen) = mock_server().await;
        let hub = RealtimeHub::connect(&url, "test-key").await.unwrap();

        let topic = Topic::table("chat_rooms");
        let sub = hub.subscribe(&topic);
        assert_eq!(hub.subscriber_count(&topic), 1);
        let _ = seen.recv().await.unwrap();

        drop(sub);
        assert_eq!(hub.subscriber_count(&topic), 0);

        let frame = seen.recv().await.unwrap();
        assert!(matches!(frame, WireMessage::Unsubscribe { topic } if topic == "chat_rooms"));
    }

    #[tokio::test]
    async fn test_shared_topic_sends_one_subscribe_frame() {
        let (url, push, mut seen) = mock_server().await;
        let hub = RealtimeHub::connect(&url, "test-key").await.unwrap();

        let topic = Topic::table("orders");
        let mut first = hub.subscribe(&topic);
        let mut second = hub.subscribe(&topic);
        assert_eq!(hub.subscriber_count(&topic), 2);

        let frame = seen.recv().await.unwrap();
        assert!(matches!(frame, WireMessage::Subscribe { .. }));

        push.send(insert_frame(&topic, serde_json::json!({"id": 9})))
            .unwrap();
        assert_eq!(first.recv().await.unwrap().record["id"], 9);
        assert_eq!(second.recv().await.unwrap().record["id"], 9);

        // Dropping one guard keeps the topic joined for the other.
        drop(first);
        assert_eq!(hub.subscriber_count(&topic), 1);
    }
}
