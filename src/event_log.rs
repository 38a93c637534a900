use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::{broadcast, RwLock};

use crate::config::EVENT_BUFFER_SIZE;

#[derive(Debug, Clone, Serialize)]
pub struct EventEntry {
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    pub level: EventLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Dashboard,
    Runs,
    Status,
    Detail,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
    Debug,
}

/// Bounded history of dashboard events plus a live broadcast feed.
pub struct EventLog {
    buffer: RwLock<VecDeque<EventEntry>>,
    capacity: usize,
    sender: broadcast::Sender<EventEntry>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            buffer: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            sender,
        }
    }

    pub async fn push(&self, entry: EventEntry) {
        let mut buf = self.buffer.write().await;
        if buf.len() >= self.capacity {
            buf.pop_front();
        }
        buf.push_back(entry.clone());
        drop(buf);

        let _ = self.sender.send(entry);
    }

    pub async fn history(&self) -> Vec<EventEntry> {
        self.buffer.read().await.iter().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEntry> {
        self.sender.subscribe()
    }

    pub async fn emit(&self, source: EventSource, level: EventLevel, message: impl Into<String>) {
        let entry = EventEntry {
            timestamp: Utc::now(),
            source,
            level,
            message: message.into(),
        };
        self.push(entry).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_history_is_bounded() {
        let log = EventLog::with_capacity(3);
        for i in 0..5 {
            log.emit(EventSource::Runs, EventLevel::Info, format!("event {}", i))
                .await;
        }

        let history = log.history().await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].message, "event 2");
        assert_eq!(history[2].message, "event 4");
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let log = EventLog::new();
        let mut rx = log.subscribe();

        log.emit(EventSource::Status, EventLevel::Warn, "backend down")
            .await;

        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.source, EventSource::Status);
        assert_eq!(entry.level, EventLevel::Warn);
        assert_eq!(entry.message, "backend down");
    }
}
