use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Period;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OverduePayment,
    PaymentReceived,
    Attendance,
    Other,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OverduePayment => "overdue_payment",
            NotificationKind::PaymentReceived => "payment_received",
            NotificationKind::Attendance => "attendance",
            NotificationKind::Other => "other",
        }
    }
}

impl Default for NotificationKind {
    fn default() -> Self {
        NotificationKind::Other
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overdue_payment" => Ok(NotificationKind::OverduePayment),
            "payment_received" => Ok(NotificationKind::PaymentReceived),
            "attendance" => Ok(NotificationKind::Attendance),
            "other" => Ok(NotificationKind::Other),
            _ => Err(format!("unknown notification type '{}'", s)),
        }
    }
}

/// Structured metadata. `month` keys overdue documents, `count` mirrors `student_ids.len()` for them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<Period>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub student_ids: Vec<Uuid>,
    /// Index-aligned with `student_ids`
    pub student_names: Vec<String>,
    pub is_read: bool,
    pub metadata: NotificationMetadata,
    /// Bumped on every stored write; conditional replaces compare against it
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub owner_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub student_ids: Vec<Uuid>,
    pub student_names: Vec<String>,
    pub metadata: NotificationMetadata,
}

impl NewNotification {
    pub fn into_notification(self, id: Uuid, now: DateTime<Utc>) -> Notification {
        Notification {
            id,
            owner_id: self.owner_id,
            title: self.title,
            message: self.message,
            kind: self.kind,
            student_ids: self.student_ids,
            student_names: self.student_names,
            is_read: false,
            metadata: self.metadata,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationFilter {
    pub is_read: Option<bool>,
    pub kind: Option<NotificationKind>,
}

impl NotificationFilter {
    pub fn matches(&self, n: &Notification) -> bool {
        self.is_read.map_or(true, |r| n.is_read == r) && self.kind.map_or(true, |k| n.kind == k)
    }
}
