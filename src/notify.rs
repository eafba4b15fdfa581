use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::model::Appointment;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NoticeKind {
    Created,
    Cancelled { reason: Option<String> },
}

impl NoticeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NoticeKind::Created => "created",
            NoticeKind::Cancelled { .. } => "cancelled",
        }
    }
}

/// A lifecycle event addressed to the business that owns the appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub tenant: String,
    pub business_name: String,
    /// The business' notification address; `None` means nobody asked to be told.
    pub recipient: Option<String>,
    #[serde(flatten)]
    pub kind: NoticeKind,
    pub appointment: Appointment,
}

impl Notice {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A notice that could not be handed to a delivery worker. Reported to the
/// caller as a warning on an otherwise successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure(pub String);

impl std::fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification delivery failed: {}", self.0)
    }
}

impl std::error::Error for DeliveryFailure {}

/// Post-commit sink for lifecycle notices. Single attempt, no retry; the
/// engine never rolls anything back on `Err`.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, notice: &Notice) -> Result<(), DeliveryFailure>;
}

/// Broadcast hub that fans notices out to delivery workers (mailers,
/// webhooks) subscribed in-process.
pub struct NotifyHub {
    sender: broadcast::Sender<Notice>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl Dispatcher for NotifyHub {
    async fn dispatch(&self, notice: &Notice) -> Result<(), DeliveryFailure> {
        if notice.recipient.is_none() {
            return Ok(());
        }
        self.sender
            .send(notice.clone())
            .map(|_| ())
            .map_err(|_| DeliveryFailure("no delivery worker is listening".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClientInfo, Status};
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn notice(recipient: Option<&str>) -> Notice {
        let start = NaiveDate::from_ymd_opt(2026, 10, 20)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap();
        Notice {
            tenant: "corte-fino".into(),
            business_name: "Corte Fino".into(),
            recipient: recipient.map(String::from),
            kind: NoticeKind::Created,
            appointment: Appointment {
                id: Ulid::new(),
                professional_id: Ulid::new(),
                service_id: Ulid::new(),
                client: ClientInfo {
                    name: "Ana".into(),
                    phone: "555-0101".into(),
                    email: None,
                },
                start,
                duration_minutes: 30,
                status: Status::Requested,
                notes: None,
                created_at: start,
            },
        }
    }

    #[tokio::test]
    async fn subscriber_receives_notice() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe();
        let n = notice(Some("owner@cortefino.test"));
        hub.dispatch(&n).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), n);
    }

    #[tokio::test]
    async fn no_recipient_is_not_a_failure() {
        let hub = NotifyHub::new();
        assert!(hub.dispatch(&notice(None)).await.is_ok());
    }

    #[tokio::test]
    async fn recipient_without_worker_fails() {
        let hub = NotifyHub::new();
        let err = hub.dispatch(&notice(Some("owner@cortefino.test"))).await.unwrap_err();
        assert!(err.to_string().contains("no delivery worker"));
    }

    #[test]
    fn json_payload_is_tagged() {
        let mut n = notice(Some("owner@cortefino.test"));
        n.kind = NoticeKind::Cancelled {
            reason: Some("sick".into()),
        };
        let parsed: serde_json::Value = serde_json::from_str(&n.to_json()).unwrap();
        assert_eq!(parsed["event"], "cancelled");
        assert_eq!(parsed["reason"], "sick");
        assert_eq!(parsed["tenant"], "corte-fino");
    }
}
