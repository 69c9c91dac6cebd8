use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Student record as kept by the student directory. Read-only from this service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub gender: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The two student fields overdue reconciliation reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    pub id: Uuid,
    pub full_name: String,
}

/// Contact view embedded in payment responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
}

impl From<&Student> for StudentRef {
    fn from(s: &Student) -> Self {
        Self {
            id: s.id,
            full_name: s.full_name.clone(),
        }
    }
}

impl From<&Student> for StudentSummary {
    fn from(s: &Student) -> Self {
        Self {
            id: s.id,
            full_name: s.full_name.clone(),
            email: s.email.clone(),
            phone_number: s.phone_number.clone(),
        }
    }
}
