//! Delivery scenarios over the library surface, without a broker.
//!
//! Events are injected as raw channel payloads and observed through each
//! session's frame receiver, exactly as the relay loop would hand them over.

use std::time::Duration;

use event_schema::{LikePayload, NotificationEvent};
use notification_pubsub::NotificationSubscriber;
use notification_relay_service::relay;
use notification_relay_service::websocket::{ServerFrame, SessionId, SessionRegistry};
use tokio::sync::{mpsc, watch};

fn like_event_json(target_user_id: &str) -> String {
    NotificationEvent::like(
        target_user_id,
        LikePayload {
            tweet_id: "t-1".to_string(),
            liker_id: "u-2".to_string(),
            liker_name: "Ada".to_string(),
            liker_username: "ada".to_string(),
        },
    )
    .to_json()
    .unwrap()
}

#[tokio::test]
async fn delivers_one_frame_to_every_session_of_the_target_user() {
    let registry = SessionRegistry::new();
    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    registry.register("u-1", SessionId::new(), tx1).await;
    registry.register("u-1", SessionId::new(), tx2).await;

    relay::dispatch(&registry, &like_event_json("u-1")).await;

    let frame1 = ServerFrame::from_json(&rx1.recv().await.unwrap()).unwrap();
    let frame2 = ServerFrame::from_json(&rx2.recv().await.unwrap()).unwrap();

    assert_eq!(frame1.event, "like_notification");
    assert_eq!(frame1, frame2);
    assert_eq!(frame1.data["tweetId"], "t-1");
    assert_eq!(frame1.data["likerName"], "Ada");

    // Exactly one frame per session.
    assert!(rx1.try_recv().is_err());
    assert!(rx2.try_recv().is_err());
}

#[tokio::test]
async fn other_users_sessions_are_not_notified() {
    let registry = SessionRegistry::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    registry.register("u-2", SessionId::new(), tx).await;

    relay::dispatch(&registry, &like_event_json("u-1")).await;

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn malformed_message_does_not_stop_subsequent_delivery() {
    let registry = SessionRegistry::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    registry.register("u-1", SessionId::new(), tx).await;

    relay::dispatch(&registry, "{\"boom\":").await;
    relay::dispatch(&registry, &like_event_json("u-1")).await;

    let frame = ServerFrame::from_json(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(frame.event, "like_notification");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn legacy_producer_payload_without_timestamp_is_relayed() {
    let registry = SessionRegistry::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    registry.register("u-1", SessionId::new(), tx).await;

    let raw = r#"{
        "type": "follow",
        "targetUserId": "u-1",
        "payload": {
            "followerId": "u-2",
            "followerName": "Grace Hopper",
            "followerUsername": "grace"
        }
    }"#;
    relay::dispatch(&registry, raw).await;

    let frame = ServerFrame::from_json(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(frame.event, "follow_notification");
    assert_eq!(frame.data["followerName"], "Grace Hopper");
}

#[tokio::test]
async fn closed_session_queue_does_not_block_the_rest() {
    let registry = SessionRegistry::new();
    let (tx1, rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    registry.register("u-1", SessionId::new(), tx1).await;
    registry.register("u-1", SessionId::new(), tx2).await;

    // Simulates a session whose forwarder died before unregister ran.
    drop(rx1);

    relay::dispatch(&registry, &like_event_json("u-1")).await;

    let frame = ServerFrame::from_json(&rx2.recv().await.unwrap()).unwrap();
    assert_eq!(frame.event, "like_notification");
}

#[tokio::test]
async fn unregistered_session_receives_nothing() {
    let registry = SessionRegistry::new();
    let session_id = SessionId::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    registry.register("u-1", session_id, tx).await;

    relay::dispatch(&registry, &like_event_json("u-1")).await;
    assert!(rx.recv().await.is_some());

    registry.unregister(session_id).await;
    relay::dispatch(&registry, &like_event_json("u-1")).await;

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn relay_loop_exits_on_shutdown_signal() {
    // Unroutable broker; subscribe attempts fail and the loop sits in
    // backoff until the shutdown signal lands.
    let subscriber = NotificationSubscriber::new("redis://127.0.0.1:1").await.unwrap();
    let registry = SessionRegistry::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(relay::run(subscriber, registry, shutdown_rx));
    shutdown_tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("relay did not shut down in time")
        .unwrap();
}
