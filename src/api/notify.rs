//! Out-of-band notification delivery.
//!
//! The default sender for local dev is `LogNotificationSender`, which logs the
//! payload and reports success. Real transports implement
//! `NotificationSender`.

use serde::Serialize;
use tracing::info;

use crate::risk::Identity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum Notification {
    SignInCode { code: String, ttl_seconds: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Failed(String),
}

pub trait NotificationSender: Send + Sync {
    fn send(&self, identity: &Identity, payload: &Notification) -> Delivery;
}

#[derive(Clone, Debug)]
pub struct LogNotificationSender;

impl NotificationSender for LogNotificationSender {
    fn send(&self, identity: &Identity, payload: &Notification) -> Delivery {
        let payload_json = serde_json::to_string(payload).unwrap_or_default();
        info!(
            to = %identity,
            payload = %payload_json,
            "notification send stub"
        );
        Delivery::Delivered
    }
}
