use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BillingConfig;
use crate::database::manager::DatabaseError;
use crate::database::models::{
    NewNotification, Notification, NotificationKind, NotificationMetadata, StudentRef,
};
use crate::database::repository::{NotificationStore, PaymentLedger, StudentDirectory};
use crate::types::Period;

pub const OVERDUE_TITLE: &str = "Overdue Payments";

/// One entry of the overdue list returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueStudent {
    pub student_id: Uuid,
    pub student_name: String,
}

impl From<StudentRef> for OverdueStudent {
    fn from(s: StudentRef) -> Self {
        Self {
            student_id: s.id,
            student_name: s.full_name,
        }
    }
}

/// What removing a student from an overdue document did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// No overdue document exists for the period
    NoNotification,
    /// The document exists but does not list the student
    NotListed,
    /// The student was removed; this many remain
    Updated { remaining: usize },
    /// The student was the last one; the document is gone
    Deleted,
}

/// Summary line stored on overdue documents. The verb stays "have" for a single student.
pub fn overdue_message(count: usize, period: &Period) -> String {
    format!(
        "{} student{} have overdue payments for {}",
        count,
        if count != 1 { "s" } else { "" },
        period
    )
}

/// Order-independent comparison of two id lists
pub fn same_members(a: &[Uuid], b: &[Uuid]) -> bool {
    let a: HashSet<&Uuid> = a.iter().collect();
    let b: HashSet<&Uuid> = b.iter().collect();
    a == b
}

/// Overwrite the member lists and everything derived from them; marks the document unread
fn set_members(notification: &mut Notification, period: &Period, ids: Vec<Uuid>, names: Vec<String>) {
    debug_assert_eq!(ids.len(), names.len());
    notification.message = overdue_message(ids.len(), period);
    notification.metadata.count = Some(ids.len() as i64);
    notification.student_ids = ids;
    notification.student_names = names;
    notification.is_read = false;
}

/// Keeps one overdue-payment notification per operator and period in step with the ledger
pub struct OverdueService {
    students: Arc<dyn StudentDirectory>,
    payments: Arc<dyn PaymentLedger>,
    notifications: Arc<dyn NotificationStore>,
    grace_days: u32,
    max_attempts: u32,
}

impl OverdueService {
    pub fn new(
        students: Arc<dyn StudentDirectory>,
        payments: Arc<dyn PaymentLedger>,
        notifications: Arc<dyn NotificationStore>,
        config: &BillingConfig,
    ) -> Self {
        Self {
            students,
            payments,
            notifications,
            grace_days: config.grace_days,
            max_attempts: config.sync_attempts.max(1),
        }
    }

    /// Whether `now` is still inside the period's grace window
    pub fn in_grace_window(&self, now: DateTime<Utc>) -> bool {
        now.day() <= self.grace_days
    }

    /// Compute who has not paid for the current period and store that as the period's
    /// overdue document. Inside the grace window nothing is read or written.
    ///
    /// A lost conditional write restarts from the student and payment reads, and students
    /// about to be put back on the document are checked against the ledger once more after
    /// the document is read. A removal committed before that read is therefore seen, and
    /// one committed after it bumps the version and fails our write.
    pub async fn recompute_and_sync(
        &self,
        owner: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<OverdueStudent>, DatabaseError> {
        let period = Period::containing(now);
        if self.in_grace_window(now) {
            debug!("Overdue check for {} skipped: day {} of {} is within grace", owner, now.day(), period);
            return Ok(vec![]);
        }

        for attempt in 1..=self.max_attempts {
            let overdue = self.unpaid(owner, &period).await?;
            if self.sync(owner, &period, &overdue).await? {
                debug!("{} overdue student(s) for {} in {}", overdue.len(), owner, period);
                return Ok(overdue.into_iter().map(OverdueStudent::from).collect());
            }
            debug!("Overdue notification for {} in {} changed underneath, attempt {}", owner, period, attempt);
        }

        Err(DatabaseError::Conflict(format!(
            "overdue notification for {} in {} kept changing",
            owner, period
        )))
    }

    /// Active students of `owner` without a payment for `period`, in directory order
    async fn unpaid(&self, owner: Uuid, period: &Period) -> Result<Vec<StudentRef>, DatabaseError> {
        let active = self.students.find_active_by_owner(owner).await?;
        let active_ids: Vec<Uuid> = active.iter().map(|s| s.id).collect();
        let paid: HashSet<Uuid> = self
            .payments
            .paid_student_ids(owner, period, &active_ids)
            .await?
            .into_iter()
            .collect();

        Ok(active.into_iter().filter(|s| !paid.contains(&s.id)).collect())
    }

    /// One read-compare-write round. `Ok(false)` means the round raced another writer
    /// or read a stale ledger and must start over.
    async fn sync(&self, owner: Uuid, period: &Period, overdue: &[StudentRef]) -> Result<bool, DatabaseError> {
        let existing = self.notifications.find_overdue(owner, period).await?;

        if overdue.is_empty() {
            let Some(existing) = existing else {
                return Ok(true);
            };
            let deleted = self
                .notifications
                .delete_overdue(owner, period, Some(existing.version))
                .await?;
            if deleted {
                info!("Cleared overdue notification for {} in {}", owner, period);
            }
            return Ok(deleted);
        }

        let ids: Vec<Uuid> = overdue.iter().map(|s| s.id).collect();
        if let Some(existing) = &existing {
            if same_members(&existing.student_ids, &ids) {
                return Ok(true);
            }
        }

        let additions: Vec<Uuid> = match &existing {
            Some(existing) => ids
                .iter()
                .copied()
                .filter(|id| !existing.student_ids.contains(id))
                .collect(),
            None => ids.clone(),
        };
        if !additions.is_empty()
            && !self
                .payments
                .paid_student_ids(owner, period, &additions)
                .await?
                .is_empty()
        {
            return Ok(false);
        }

        let names: Vec<String> = overdue.iter().map(|s| s.full_name.clone()).collect();
        match existing {
            None => {
                let created = self
                    .notifications
                    .insert_overdue(NewNotification {
                        owner_id: owner,
                        title: OVERDUE_TITLE.to_string(),
                        message: overdue_message(ids.len(), period),
                        kind: NotificationKind::OverduePayment,
                        student_ids: ids.clone(),
                        student_names: names,
                        metadata: NotificationMetadata {
                            month: Some(*period),
                            count: Some(ids.len() as i64),
                        },
                    })
                    .await?;
                if created.is_some() {
                    info!("Created overdue notification for {} in {} ({} students)", owner, period, ids.len());
                }
                Ok(created.is_some())
            }
            Some(mut existing) => {
                let count = ids.len();
                set_members(&mut existing, period, ids, names);
                let replaced = self.notifications.replace_overdue(&existing).await?;
                if replaced {
                    info!("Updated overdue notification for {} in {} ({} students)", owner, period, count);
                }
                Ok(replaced)
            }
        }
    }

    /// Drop a student from the period's overdue document after a payment was recorded.
    /// Names are reloaded from the directory so they stay aligned with the ids.
    pub async fn remove_student(
        &self,
        owner: Uuid,
        student_id: Uuid,
        period: &Period,
    ) -> Result<Removal, DatabaseError> {
        for attempt in 1..=self.max_attempts {
            let Some(mut existing) = self.notifications.find_overdue(owner, period).await? else {
                return Ok(Removal::NoNotification);
            };
            if !existing.student_ids.contains(&student_id) {
                return Ok(Removal::NotListed);
            }

            let remaining: Vec<Uuid> = existing
                .student_ids
                .iter()
                .copied()
                .filter(|id| *id != student_id)
                .collect();

            if remaining.is_empty() {
                if self
                    .notifications
                    .delete_overdue(owner, period, Some(existing.version))
                    .await?
                {
                    info!("Last overdue student paid for {}; removed notification for {}", period, owner);
                    return Ok(Removal::Deleted);
                }
            } else {
                let names = self.names_for(owner, &remaining, &existing).await?;
                let count = remaining.len();
                set_members(&mut existing, period, remaining, names);
                if self.notifications.replace_overdue(&existing).await? {
                    debug!("Removed {} from overdue notification for {} in {}", student_id, owner, period);
                    return Ok(Removal::Updated { remaining: count });
                }
            }
            debug!("Overdue notification for {} in {} changed underneath, attempt {}", owner, period, attempt);
        }

        Err(DatabaseError::Conflict(format!(
            "overdue notification for {} in {} kept changing",
            owner, period
        )))
    }

    /// Names for `ids` in the same order. A student missing from the directory keeps the
    /// name the document already had for it.
    async fn names_for(
        &self,
        owner: Uuid,
        ids: &[Uuid],
        existing: &Notification,
    ) -> Result<Vec<String>, DatabaseError> {
        let found: HashMap<Uuid, String> = self
            .students
            .find_by_ids(owner, ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s.full_name))
            .collect();
        let previous: HashMap<&Uuid, &String> = existing
            .student_ids
            .iter()
            .zip(existing.student_names.iter())
            .collect();

        Ok(ids
            .iter()
            .map(|id| {
                found
                    .get(id)
                    .or_else(|| previous.get(id).copied())
                    .cloned()
                    .unwrap_or_default()
            })
            .collect())
    }

    /// Run `remove_student` in the background. Failures are logged and never reach the caller.
    pub fn spawn_remove_student(self: &Arc<Self>, owner: Uuid, student_id: Uuid, period: Period) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = service.remove_student(owner, student_id, &period).await {
                warn!(
                    "Failed to remove student {} from overdue notification for {} in {}: {}",
                    student_id, owner, period, e
                );
            }
        })
    }
}
