//! Notification pub/sub over one shared Redis channel.
//!
//! Decouples domain events (a user followed, liked, or commented) produced
//! inside request handlers from their asynchronous delivery to whichever
//! relay process holds the affected user's live sessions.
//!
//! # Architecture
//!
//! ```text
//! CRUD backend (after the domain write commits):
//!   1. publisher.publish_like(...)
//!      PUBLISH notifications {"type":"like","targetUserId":"123","payload":{...}}
//!      ↓
//! Redis Pub/Sub (broadcast to every subscribed relay instance)
//!      ↓
//! notification-relay-service:
//!   2. Decode NotificationEvent
//!   3. Fan out one frame per live WebSocket session of targetUserId
//! ```
//!
//! Delivery is best effort. Messages published while no relay is subscribed
//! are lost, and durable notification history is owned by the storage layer,
//! not by this channel.
//!
//! # Example: Publisher
//!
//! ```no_run
//! use notification_pubsub::NotificationPublisher;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let publisher = NotificationPublisher::new(
//!         "redis://localhost:6379",
//!         "social-service".to_string(),
//!     )
//!     .await?;
//!
//!     publisher
//!         .publish_follow("9f27", "66b0", "Ada Lovelace", "ada")
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Example: Subscriber (relay side)
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use notification_pubsub::NotificationSubscriber;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let subscriber = NotificationSubscriber::new("redis://localhost:6379").await?;
//!     let mut stream = Box::pin(subscriber.subscribe().await?);
//!
//!     while let Some(payload) = stream.next().await {
//!         println!("notification: {payload}");
//!     }
//!     Ok(())
//! }
//! ```

use event_schema::{CommentPayload, FollowPayload, LikePayload, NotificationEvent};
use futures_util::{Stream, StreamExt};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, error, info};

mod error;

pub use error::PubSubError;

type Result<T> = std::result::Result<T, PubSubError>;

/// The shared broker channel every producer and every relay uses.
pub const NOTIFICATIONS_CHANNEL: &str = "notifications";

/// Publisher side of the notification channel.
///
/// Held by business logic and called strictly after the triggering domain
/// mutation has committed. A failed publish must never fail the operation
/// that produced the event; callers log the error and move on.
#[derive(Clone)]
pub struct NotificationPublisher {
    conn: ConnectionManager,
    channel: String,
    service_name: String,
}

impl NotificationPublisher {
    /// Create a publisher on the default channel.
    ///
    /// `service_name` labels this producer in logs (e.g. "social-service").
    pub async fn new(redis_url: &str, service_name: String) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self {
            conn,
            channel: NOTIFICATIONS_CHANNEL.to_string(),
            service_name,
        })
    }

    /// Create a publisher on a custom channel.
    pub async fn with_channel(
        redis_url: &str,
        service_name: String,
        channel: String,
    ) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self {
            conn,
            channel,
            service_name,
        })
    }

    /// Publish a notification event.
    ///
    /// Validates the routing fields, serializes to the wire JSON and
    /// PUBLISHes it. Returns the number of subscribers the broker accepted
    /// the message for; zero is normal when no relay is attached and implies
    /// no delivery guarantee either way.
    pub async fn publish(&self, event: &NotificationEvent) -> Result<usize> {
        event
            .validate()
            .map_err(|e| PubSubError::InvalidEvent(e.to_string()))?;
        let payload = serde_json::to_string(event)?;

        debug!(
            kind = %event.kind(),
            target_user_id = %event.target_user_id(),
            channel = %self.channel,
            "Publishing notification event"
        );

        let mut conn = self.conn.clone();
        let subscriber_count: usize = conn.publish(&self.channel, payload).await?;

        info!(
            kind = %event.kind(),
            target_user_id = %event.target_user_id(),
            subscribers = subscriber_count,
            source = %self.service_name,
            "Notification event published"
        );

        Ok(subscriber_count)
    }

    /// Publish a follow notification to the followed user.
    ///
    /// Self-follows are skipped and report zero subscribers.
    pub async fn publish_follow(
        &self,
        target_user_id: &str,
        follower_id: &str,
        follower_name: &str,
        follower_username: &str,
    ) -> Result<usize> {
        if is_self_notification(follower_id, target_user_id) {
            info!(
                follower_id = %follower_id,
                "Skipping self-follow notification"
            );
            return Ok(0);
        }

        let event = NotificationEvent::follow(
            target_user_id,
            FollowPayload {
                follower_id: follower_id.to_string(),
                follower_name: follower_name.to_string(),
                follower_username: follower_username.to_string(),
            },
        );
        self.publish(&event).await
    }

    /// Publish a like notification to the tweet's author.
    ///
    /// Liking your own tweet produces no notification.
    pub async fn publish_like(
        &self,
        target_user_id: &str,
        tweet_id: &str,
        liker_id: &str,
        liker_name: &str,
        liker_username: &str,
    ) -> Result<usize> {
        if is_self_notification(liker_id, target_user_id) {
            info!(
                liker_id = %liker_id,
                tweet_id = %tweet_id,
                "Skipping self-like notification"
            );
            return Ok(0);
        }

        let event = NotificationEvent::like(
            target_user_id,
            LikePayload {
                tweet_id: tweet_id.to_string(),
                liker_id: liker_id.to_string(),
                liker_name: liker_name.to_string(),
                liker_username: liker_username.to_string(),
            },
        );
        self.publish(&event).await
    }

    /// Publish a comment notification to the tweet's author.
    ///
    /// Commenting on your own tweet produces no notification.
    #[allow(clippy::too_many_arguments)]
    pub async fn publish_comment(
        &self,
        target_user_id: &str,
        tweet_id: &str,
        comment_id: &str,
        commenter_id: &str,
        commenter_name: &str,
        commenter_username: &str,
        text: &str,
    ) -> Result<usize> {
        if is_self_notification(commenter_id, target_user_id) {
            info!(
                commenter_id = %commenter_id,
                tweet_id = %tweet_id,
                "Skipping self-comment notification"
            );
            return Ok(0);
        }

        let event = NotificationEvent::comment(
            target_user_id,
            CommentPayload {
                tweet_id: tweet_id.to_string(),
                comment_id: comment_id.to_string(),
                commenter_id: commenter_id.to_string(),
                commenter_name: commenter_name.to_string(),
                commenter_username: commenter_username.to_string(),
                text: text.to_string(),
            },
        );
        self.publish(&event).await
    }
}

/// Subscriber side of the notification channel.
pub struct NotificationSubscriber {
    client: Client,
    channel: String,
}

impl NotificationSubscriber {
    /// Create a subscriber on the default channel.
    ///
    /// No connection is opened until [`subscribe`](Self::subscribe) is
    /// called.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;

        Ok(Self {
            client,
            channel: NOTIFICATIONS_CHANNEL.to_string(),
        })
    }

    /// Create a subscriber on a custom channel.
    pub async fn with_channel(redis_url: &str, channel: String) -> Result<Self> {
        let client = Client::open(redis_url)?;

        Ok(Self { client, channel })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Open a dedicated pub/sub connection and SUBSCRIBE the channel.
    ///
    /// Yields raw message payloads for the life of the subscription: a lazy,
    /// infinite sequence that ends only when the broker connection dies.
    /// Dropping the stream releases the underlying connection. Payloads that
    /// cannot be extracted as UTF-8 strings are logged and skipped.
    pub async fn subscribe(&self) -> Result<impl Stream<Item = String>> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;

        info!(channel = %self.channel, "Subscribed to notification channel");

        Ok(pubsub.into_on_message().filter_map(|msg| async move {
            match msg.get_payload::<String>() {
                Ok(payload) => Some(payload),
                Err(e) => {
                    error!(error = ?e, "Failed to get message payload");
                    None
                }
            }
        }))
    }
}

fn is_self_notification(actor_id: &str, target_user_id: &str) -> bool {
    actor_id == target_user_id
}
