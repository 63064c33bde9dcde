use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Outbound message for the notification fan-out boundary. Transport
/// (e-mail, push) lives behind the publisher implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub topic: String,
    pub recipient: String,
    pub message: String,
}

impl Notice {
    pub fn new(
        topic: impl Into<String>,
        recipient: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            recipient: recipient.into(),
            message: message.into(),
        }
    }
}

/// Notification dispatch error.
#[derive(Debug, Error)]
pub enum NoticeError {
    #[error("notice transport unavailable: {0}")]
    Transport(String),
}

/// Trait describing outbound notification hooks (e-mail or push adapters).
pub trait NoticePublisher: Send + Sync {
    fn publish(&self, notice: Notice) -> Result<(), NoticeError>;
}

/// Publisher that only logs, used by the demo binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

impl NoticePublisher for LogPublisher {
    fn publish(&self, notice: Notice) -> Result<(), NoticeError> {
        info!(
            topic = %notice.topic,
            recipient = %notice.recipient,
            "{}",
            notice.message
        );
        Ok(())
    }
}
