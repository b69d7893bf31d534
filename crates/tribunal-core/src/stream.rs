//! Streaming multiplexer: a channel-tagged bus carrying incremental partial
//! output from concurrently running stages to a single observer.
//!
//! Producers never block: the bus wraps an unbounded mpsc sender and sends
//! are best-effort (a dropped receiver just means nobody is watching).

use serde::Serialize;
use tokio::sync::mpsc;

/// Channel tag for the preprocessing stage.
pub const CHANNEL_SPLITTER: &str = "splitter";
/// Channel tag for the arbiter stage.
pub const CHANNEL_CHAIRMAN: &str = "chairman";

/// Partial output is plain accumulated text; terminal events carry the
/// decoded structured value for the stage.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum StreamPayload {
    Text(String),
    Json(serde_json::Value),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StreamEvent {
    pub channel: String,
    pub payload: StreamPayload,
    pub terminal: bool,
}

/// Cloneable handle held by every producing stage.
#[derive(Clone, Default)]
pub struct StreamBus {
    tx: Option<mpsc::UnboundedSender<StreamEvent>>,
}

impl StreamBus {
    /// A bus with an attached observer.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A bus nobody listens to; all publishes are no-ops.
    pub fn sink() -> Self {
        Self { tx: None }
    }

    /// Whether an observer was ever attached.
    pub fn is_active(&self) -> bool {
        self.tx.is_some()
    }

    /// Publish the growing accumulated text for `channel`.
    pub fn partial(&self, channel: &str, text: impl Into<String>) {
        self.send(StreamEvent {
            channel: channel.to_string(),
            payload: StreamPayload::Text(text.into()),
            terminal: false,
        });
    }

    /// Publish the terminal decoded value for `stage` on its `done_` channel.
    pub fn done(&self, stage: &str, value: serde_json::Value) {
        self.send(StreamEvent {
            channel: format!("done_{stage}"),
            payload: StreamPayload::Json(value),
            terminal: true,
        });
    }

    fn send(&self, event: StreamEvent) {
        if let Some(tx) = &self.tx {
            // best-effort send
            let _ = tx.send(event);
        }
    }
}
