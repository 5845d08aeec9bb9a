use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::warn;

/// Named event as it comes off the wire: `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl RawEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { event: event.into(), data }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("connection dropped")]
    Disconnected,
    #[error("not connected")]
    NotConnected,
    #[error("channel closed")]
    Closed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A push channel of named events. Reconnect policy lives above this.
pub trait Transport: Send + 'static {
    fn connect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// `Ok(None)` means the remote ended the stream.
    fn next_event(&mut self) -> impl Future<Output = Result<Option<RawEvent>, TransportError>> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

enum FeedItem {
    Event(RawEvent),
    Drop,
}

/// Producer side of an in-process transport.
#[derive(Clone)]
pub struct ChannelFeed {
    tx: mpsc::UnboundedSender<FeedItem>,
    refuse: Arc<AtomicU32>,
}

impl ChannelFeed {
    /// Returns false once the transport side is gone.
    pub fn emit(&self, event: impl Into<String>, data: Value) -> bool {
        self.tx.send(FeedItem::Event(RawEvent::new(event, data))).is_ok()
    }

    /// Sever the current connection. Events emitted afterwards queue up
    /// until the transport reconnects.
    pub fn drop_connection(&self) -> bool {
        self.tx.send(FeedItem::Drop).is_ok()
    }

    /// Make the next `n` connect attempts fail.
    pub fn refuse_connects(&self, n: u32) {
        self.refuse.store(n, Ordering::SeqCst);
    }
}

pub struct ChannelTransport {
    rx: mpsc::UnboundedReceiver<FeedItem>,
    refuse: Arc<AtomicU32>,
    connected: bool,
    ended: bool,
}

/// In-process feed, for embedding and tests.
pub fn channel() -> (ChannelFeed, ChannelTransport) {
    let (tx, rx) = mpsc::unbounded_channel();
    let refuse = Arc::new(AtomicU32::new(0));
    (
        ChannelFeed { tx, refuse: refuse.clone() },
        ChannelTransport { rx, refuse, connected: false, ended: false },
    )
}

impl Transport for ChannelTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.ended {
            return Err(TransportError::Closed);
        }
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect("refused by feed".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<RawEvent>, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        match self.rx.recv().await {
            Some(FeedItem::Event(ev)) => Ok(Some(ev)),
            Some(FeedItem::Drop) => {
                self.connected = false;
                Err(TransportError::Disconnected)
            }
            None => {
                self.ended = true;
                self.connected = false;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) {
        self.connected = false;
    }
}

/// Newline-delimited JSON envelopes read from a file or FIFO. Each connect
/// reopens the path, so a restarted feed adapter behind a FIFO is picked up
/// again. A regular file is read once; after EOF it stays closed.
pub struct LineTransport {
    path: PathBuf,
    lines: Option<Lines<BufReader<File>>>,
    regular_file: bool,
    exhausted: bool,
}

impl LineTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lines: None,
            regular_file: false,
            exhausted: false,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Transport for LineTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.exhausted {
            return Err(TransportError::Closed);
        }
        let file = File::open(&self.path)
            .await
            .map_err(|e| TransportError::Connect(format!("{}: {}", self.path.display(), e)))?;
        self.regular_file = file.metadata().await.map(|m| m.is_file()).unwrap_or(false);
        self.lines = Some(BufReader::new(file).lines());
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<RawEvent>, TransportError> {
        let lines = self.lines.as_mut().ok_or(TransportError::NotConnected)?;
        loop {
            let Some(line) = lines.next_line().await? else {
                self.lines = None;
                self.exhausted = self.regular_file;
                return Ok(None);
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawEvent>(line) {
                Ok(ev) => return Ok(Some(ev)),
                // One bad line is not a broken connection
                Err(e) => warn!("skipping undecodable feed line: {}", e),
            }
        }
    }

    async fn close(&mut self) {
        self.lines = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn channel_transport_reports_drops() {
        let (feed, mut transport) = channel();
        feed.refuse_connects(1);
        assert!(transport.connect().await.is_err());
        transport.connect().await.unwrap();

        feed.emit("sensor_update", json!({"patch_id": 1}));
        feed.drop_connection();
        let first = transport.next_event().await.unwrap().unwrap();
        assert_eq!(first.event, "sensor_update");
        assert!(matches!(transport.next_event().await, Err(TransportError::Disconnected)));
        assert!(matches!(transport.next_event().await, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn line_transport_skips_garbage() {
        let path = std::env::temp_dir().join(format!("freshview-feed-{}.ndjson", uuid::Uuid::new_v4()));
        tokio::fs::write(
            &path,
            "{\"event\":\"welcome\",\"data\":{}}\n\nnot json\n{\"event\":\"sensor_update\",\"data\":{\"x\":1}}\n",
        )
        .await
        .unwrap();

        let mut transport = LineTransport::new(&path);
        transport.connect().await.unwrap();
        assert_eq!(transport.next_event().await.unwrap().unwrap().event, "welcome");
        assert_eq!(transport.next_event().await.unwrap().unwrap().data, json!({"x": 1}));
        assert!(transport.next_event().await.unwrap().is_none());
        assert!(matches!(transport.connect().await, Err(TransportError::Closed)));

        let _ = tokio::fs::remove_file(&path).await;
    }
}
