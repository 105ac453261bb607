//! Outbound messages and admin notification fan-out.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::cart::UserId;
use crate::keyboard::Keyboard;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Outbound {
    pub target: UserId,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Outbound {
    pub fn text(target: UserId, text: impl Into<String>) -> Self {
        Self { target, text: text.into(), keyboard: None }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("recipient {0} cannot be reached")]
    Unreachable(UserId),
    #[error("transport rejected the message: {0}")]
    Rejected(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn deliver(&self, message: &Outbound) -> Result<(), DeliveryError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: Vec<UserId>,
    pub failed: Vec<(UserId, DeliveryError)>,
}

impl FanOutReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sends `text` to every recipient. A failure is logged and the loop moves on; nothing retries.
pub async fn fan_out(
    messenger: &dyn Messenger,
    recipients: &[UserId],
    text: &str,
    correlation_id: &str,
) -> FanOutReport {
    let mut report = FanOutReport::default();
    for recipient in recipients {
        let message = Outbound::text(*recipient, text);
        match messenger.deliver(&message).await {
            Ok(()) => report.delivered.push(*recipient),
            Err(error) => {
                warn!(
                    event_name = "notify.fanout.delivery_failed",
                    correlation_id = %correlation_id,
                    recipient = %recipient,
                    error = %error,
                    "admin notification not delivered"
                );
                report.failed.push((*recipient, error));
            }
        }
    }

    info!(
        event_name = "notify.fanout.completed",
        correlation_id = %correlation_id,
        delivered = report.delivered.len(),
        failed = report.failed.len(),
        "admin notification fan-out completed"
    );
    report
}

/// Messenger that keeps every delivered message in memory.
#[derive(Default)]
pub struct RecordingMessenger {
    delivered: Mutex<Vec<Outbound>>,
    unreachable: Mutex<HashSet<UserId>>,
}

impl RecordingMessenger {
    /// Every later delivery to `target` fails with [`DeliveryError::Unreachable`].
    pub fn fail_for(&self, target: UserId) {
        match self.unreachable.lock() {
            Ok(mut unreachable) => unreachable.insert(target),
            Err(poisoned) => poisoned.into_inner().insert(target),
        };
    }

    pub fn messages(&self) -> Vec<Outbound> {
        match self.delivered.lock() {
            Ok(delivered) => delivered.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn messages_for(&self, target: UserId) -> Vec<Outbound> {
        self.messages().into_iter().filter(|message| message.target == target).collect()
    }

    pub fn last_for(&self, target: UserId) -> Option<Outbound> {
        self.messages_for(target).pop()
    }

    fn is_unreachable(&self, target: UserId) -> bool {
        match self.unreachable.lock() {
            Ok(unreachable) => unreachable.contains(&target),
            Err(poisoned) => poisoned.into_inner().contains(&target),
        }
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn deliver(&self, message: &Outbound) -> Result<(), DeliveryError> {
        if self.is_unreachable(message.target) {
            return Err(DeliveryError::Unreachable(message.target));
        }
        match self.delivered.lock() {
            Ok(mut delivered) => delivered.push(message.clone()),
            Err(poisoned) => poisoned.into_inner().push(message.clone()),
        }
        Ok(())
    }
}
