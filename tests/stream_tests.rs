use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

use freshview::kernel::event::ConnectionStatus;
use freshview::stream::{channel, ConnectionManager, ReconnectPolicy, Subscription, TransportError};

fn policy() -> ReconnectPolicy {
    ReconnectPolicy { max_attempts: 5, delay: Duration::from_millis(1000) }
}

fn forward(tx: mpsc::UnboundedSender<Value>) -> impl FnMut(&Value) + Send + 'static {
    move |data| {
        let _ = tx.send(data.clone());
    }
}

#[tokio::test(start_paused = true)]
async fn test_handlers_receive_named_events() {
    let (feed, transport) = channel();
    let mut conn = ConnectionManager::new(transport, policy());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = conn.subscribe("sensor_update", forward(tx));

    conn.open().await.unwrap();
    assert_eq!(*conn.status().borrow(), ConnectionStatus::Connected);

    feed.emit("welcome", json!({"message": "hi"}));
    feed.emit("sensor_update", json!({"patch_id": 1}));

    let got = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(got, json!({"patch_id": 1}), "Only the subscribed event name is delivered");
    conn.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_no_handler_runs_after_close() {
    let (feed, transport) = channel();
    let mut conn = ConnectionManager::new(transport, policy());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sub = conn.subscribe("sensor_update", forward(tx));

    conn.open().await.unwrap();
    conn.close().await;
    assert_eq!(conn.handler_count(), 0);
    assert!(!conn.is_open());
    assert_eq!(*conn.status().borrow(), ConnectionStatus::Disconnected);

    feed.emit("sensor_update", json!({"late": true}));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(rx.try_recv().is_err(), "Handler invoked after close");

    // Dropping a subscription after close is harmless
    drop(sub);
}

#[tokio::test(start_paused = true)]
async fn test_transport_drop_reconnects_and_keeps_handlers() {
    let (feed, transport) = channel();
    let mut conn = ConnectionManager::new(transport, policy());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = conn.subscribe("sensor_update", forward(tx));
    conn.open().await.unwrap();

    // 1. Sever the connection, then keep emitting
    feed.refuse_connects(1);
    feed.drop_connection();
    feed.emit("sensor_update", json!({"n": 1}));

    // 2. First retry is refused, second succeeds and delivery resumes
    let got = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    assert_eq!(got, json!({"n": 1}));
    assert_eq!(*conn.status().borrow(), ConnectionStatus::Connected);
    assert_eq!(conn.handler_count(), 1, "Reconnect must not duplicate or drop handlers");
    conn.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_subscription_drop_unregisters() {
    let (_feed, transport) = channel();
    let conn = ConnectionManager::new(transport, policy());
    let a = conn.subscribe("sensor_update", |_| {});
    let b = conn.subscribe("sensor_update", |_| {});
    assert_eq!(conn.handler_count(), 2);
    assert_ne!(a.id(), b.id());

    a.unsubscribe();
    assert_eq!(conn.handler_count(), 1);
    drop(b);
    assert_eq!(conn.handler_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_open_gives_up_after_retry_budget() {
    let (feed, transport) = channel();
    feed.refuse_connects(10);
    let mut conn = ConnectionManager::new(transport, policy());

    let err = conn.open().await.unwrap_err();
    assert!(matches!(err, TransportError::Connect(_)));
    assert_eq!(*conn.status().borrow(), ConnectionStatus::Failed);
    assert!(!conn.is_open());

    // Budget is per attempt run: a later open tries again
    feed.refuse_connects(0);
    conn.open().await.unwrap();
    assert_eq!(*conn.status().borrow(), ConnectionStatus::Connected);
    conn.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_feed_end_marks_failed() {
    let (feed, transport) = channel();
    let mut conn = ConnectionManager::new(transport, policy());
    let mut status = conn.status();
    conn.open().await.unwrap();

    drop(feed);
    status.wait_for(|s| *s == ConnectionStatus::Failed).await.unwrap();
    conn.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_handler_may_drop_its_own_subscription() {
    let (feed, transport) = channel();
    let mut conn = ConnectionManager::new(transport, policy());
    let (tx, mut rx) = mpsc::unbounded_channel();

    // One-shot handler: unsubscribes itself on first delivery
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let own = slot.clone();
    let sub = conn.subscribe("sensor_update", move |data| {
        let _ = tx.send(data.clone());
        drop(own.lock().unwrap().take());
    });
    *slot.lock().unwrap() = Some(sub);
    conn.open().await.unwrap();

    feed.emit("sensor_update", json!({"n": 1}));
    feed.emit("sensor_update", json!({"n": 2}));

    let first = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(first, json!({"n": 1}));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(rx.try_recv().is_err(), "Handler ran after dropping its subscription");
    assert_eq!(conn.handler_count(), 0);
    conn.close().await;
}
