//! The broker-to-WebSocket delivery loop.

use std::time::Duration;

use event_schema::NotificationEvent;
use futures_util::StreamExt;
use notification_pubsub::NotificationSubscriber;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::metrics;
use crate::websocket::{ServerFrame, SessionRegistry};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Run the relay until shutdown is signalled.
///
/// The subscription is opened once and messages are processed sequentially:
/// each one is fully dispatched before the next is read. When the broker
/// connection drops, the subscription is reopened after a bounded backoff.
/// Messages published while disconnected are not replayed.
pub async fn run(
    subscriber: NotificationSubscriber,
    registry: SessionRegistry,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        let stream = match subscriber.subscribe().await {
            Ok(stream) => {
                backoff = INITIAL_BACKOFF;
                stream
            }
            Err(e) => {
                error!(error = %e, "Failed to subscribe to notification channel");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        continue;
                    }
                    _ = shutdown.changed() => {
                        info!("Notification relay shutting down");
                        return;
                    }
                }
            }
        };
        tokio::pin!(stream);

        loop {
            tokio::select! {
                maybe_payload = stream.next() => match maybe_payload {
                    Some(payload) => dispatch(&registry, &payload).await,
                    None => {
                        warn!("Notification subscription ended, resubscribing");
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    info!("Notification relay shutting down");
                    return;
                }
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(backoff) => {
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            _ = shutdown.changed() => {
                info!("Notification relay shutting down");
                return;
            }
        }
    }
}

/// Decode one raw broker payload and fan it out to the target user's live
/// sessions in this process.
///
/// A payload that fails to decode is dropped and counted; a session whose
/// queue is closed is skipped without touching the registry. Neither stops
/// the relay.
pub async fn dispatch(registry: &SessionRegistry, payload: &str) {
    metrics::observe_event_received();

    let event = match NotificationEvent::from_json(payload) {
        Ok(event) => event,
        Err(e) => {
            metrics::observe_event_malformed();
            warn!(error = %e, payload = %payload, "Dropping malformed notification message");
            return;
        }
    };

    let text = match ServerFrame::notification(&event).and_then(|frame| frame.to_json()) {
        Ok(text) => text,
        Err(e) => {
            metrics::observe_event_malformed();
            warn!(error = %e, "Dropping notification that failed to serialize");
            return;
        }
    };

    let sessions = registry.sessions_for(event.target_user_id()).await;
    if sessions.is_empty() {
        metrics::observe_event_unrouted();
        debug!(
            kind = %event.kind(),
            target_user_id = %event.target_user_id(),
            "No live sessions for notification"
        );
        return;
    }

    let mut delivered: u64 = 0;
    for (session_id, sender) in &sessions {
        if sender.send(text.clone()).is_err() {
            metrics::observe_emit_failure();
            warn!(
                "Failed to emit frame to session {:?} of user {}, queue closed",
                session_id,
                event.target_user_id()
            );
        } else {
            delivered += 1;
        }
    }

    metrics::observe_frames_delivered(&event.kind().to_string(), delivered);
    debug!(
        kind = %event.kind(),
        target_user_id = %event.target_user_id(),
        sessions = sessions.len(),
        delivered,
        "Dispatched notification"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::SessionId;
    use event_schema::FollowPayload;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_dispatch_to_registered_session() {
        let registry = SessionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register("u-1", SessionId::new(), tx).await;

        let event = NotificationEvent::follow(
            "u-1",
            FollowPayload {
                follower_id: "u-2".to_string(),
                follower_name: "Grace".to_string(),
                follower_username: "grace".to_string(),
            },
        );
        dispatch(&registry, &event.to_json().unwrap()).await;

        let frame = ServerFrame::from_json(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame.event, "follow_notification");
        assert_eq!(frame.data["followerName"], "Grace");
    }

    #[tokio::test]
    async fn test_dispatch_malformed_payload_is_dropped() {
        let registry = SessionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register("u-1", SessionId::new(), tx).await;

        dispatch(&registry, "{\"type\":\"retweet\"}").await;
        dispatch(&registry, "not json at all").await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_without_sessions_is_silent() {
        let registry = SessionRegistry::new();
        let event = NotificationEvent::follow(
            "nobody-home",
            FollowPayload {
                follower_id: "u-2".to_string(),
                follower_name: "Grace".to_string(),
                follower_username: "grace".to_string(),
            },
        );

        // Must not panic or error.
        dispatch(&registry, &event.to_json().unwrap()).await;
    }
}
