use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    NewNotification, NewPayment, Notification, NotificationFilter, NotificationKind, Payment,
    PaymentFilter, Student, StudentRef,
};
use crate::database::repository::{NotificationStore, PaymentLedger, StoreHealth, StudentDirectory};
use crate::types::{PageRequest, Period};

#[derive(Default)]
struct MemoryState {
    students: Vec<Student>,
    payments: Vec<Payment>,
    notifications: Vec<Notification>,
}

/// Process-local store with the same contracts as the Postgres one. Used for
/// `STORE_BACKEND=memory` and by the test suites.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    unavailable: AtomicBool,
    notification_writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a student (the directory itself is managed elsewhere)
    pub async fn insert_student(&self, student: Student) {
        self.state.write().await.students.push(student);
    }

    /// Flip the active flag of a seeded student
    pub async fn set_student_active(&self, id: Uuid, is_active: bool) {
        let mut state = self.state.write().await;
        if let Some(s) = state.students.iter_mut().find(|s| s.id == id) {
            s.is_active = is_active;
        }
    }

    /// Make every call fail as if the database were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of mutating notification calls that changed something
    pub fn notification_writes(&self) -> u64 {
        self.notification_writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), DatabaseError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryError("store unavailable".to_string()));
        }
        Ok(())
    }

    fn wrote(&self) {
        self.notification_writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn page_of<T: Clone>(items: &[T], page: PageRequest) -> Vec<T> {
    items
        .iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .cloned()
        .collect()
}

fn is_overdue_key(n: &Notification, owner: Uuid, period: &Period) -> bool {
    n.owner_id == owner && n.kind == NotificationKind::OverduePayment && n.metadata.month.as_ref() == Some(period)
}

#[async_trait]
impl StudentDirectory for MemoryStore {
    async fn find_active_by_owner(&self, owner: Uuid) -> Result<Vec<StudentRef>, DatabaseError> {
        self.check()?;
        let state = self.state.read().await;
        Ok(state
            .students
            .iter()
            .filter(|s| s.owner_id == owner && s.is_active)
            .map(StudentRef::from)
            .collect())
    }

    async fn find_owned(&self, owner: Uuid, id: Uuid) -> Result<Option<Student>, DatabaseError> {
        self.check()?;
        let state = self.state.read().await;
        Ok(state.students.iter().find(|s| s.id == id && s.owner_id == owner).cloned())
    }

    async fn find_by_ids(&self, owner: Uuid, ids: &[Uuid]) -> Result<Vec<Student>, DatabaseError> {
        self.check()?;
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        let state = self.state.read().await;
        Ok(state
            .students
            .iter()
            .filter(|s| s.owner_id == owner && wanted.contains(&s.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentLedger for MemoryStore {
    async fn paid_student_ids(
        &self,
        owner: Uuid,
        period: &Period,
        student_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, DatabaseError> {
        self.check()?;
        let wanted: HashSet<&Uuid> = student_ids.iter().collect();
        let state = self.state.read().await;
        Ok(state
            .payments
            .iter()
            .filter(|p| p.owner_id == owner && p.payment_month == *period && wanted.contains(&p.student_id))
            .map(|p| p.student_id)
            .collect())
    }

    async fn list(
        &self,
        owner: Uuid,
        filter: &PaymentFilter,
        page: PageRequest,
    ) -> Result<(Vec<Payment>, u64), DatabaseError> {
        self.check()?;
        let state = self.state.read().await;
        let mut rows: Vec<Payment> = state
            .payments
            .iter()
            .filter(|p| p.owner_id == owner && filter.matches(p))
            .cloned()
            .collect();
        rows.sort_by_key(|p| (Reverse(p.payment_date), Reverse(p.created_at)));
        let total = rows.len() as u64;
        Ok((page_of(&rows, page), total))
    }

    async fn insert(&self, payment: NewPayment) -> Result<Payment, DatabaseError> {
        self.check()?;
        let payment = payment.into_payment(Uuid::new_v4(), Utc::now());
        self.state.write().await.payments.push(payment.clone());
        Ok(payment)
    }

    async fn find(&self, owner: Uuid, id: Uuid) -> Result<Option<Payment>, DatabaseError> {
        self.check()?;
        let state = self.state.read().await;
        Ok(state.payments.iter().find(|p| p.id == id && p.owner_id == owner).cloned())
    }

    async fn update(&self, payment: &Payment) -> Result<Payment, DatabaseError> {
        self.check()?;
        let mut state = self.state.write().await;
        let stored = state
            .payments
            .iter_mut()
            .find(|p| p.id == payment.id && p.owner_id == payment.owner_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("payment {}", payment.id)))?;
        *stored = Payment {
            updated_at: Utc::now(),
            created_at: stored.created_at,
            ..payment.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<Option<Payment>, DatabaseError> {
        self.check()?;
        let mut state = self.state.write().await;
        let index = state.payments.iter().position(|p| p.id == id && p.owner_id == owner);
        Ok(index.map(|i| state.payments.remove(i)))
    }

    async fn set_active_for_student(
        &self,
        owner: Uuid,
        student_id: Uuid,
        is_active: bool,
    ) -> Result<u64, DatabaseError> {
        self.check()?;
        let now = Utc::now();
        let mut state = self.state.write().await;
        let mut touched = 0;
        for p in state
            .payments
            .iter_mut()
            .filter(|p| p.owner_id == owner && p.student_id == student_id)
        {
            p.is_active = is_active;
            p.updated_at = now;
            touched += 1;
        }
        Ok(touched)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn list(
        &self,
        owner: Uuid,
        filter: &NotificationFilter,
        page: PageRequest,
    ) -> Result<(Vec<Notification>, u64), DatabaseError> {
        self.check()?;
        let state = self.state.read().await;
        let mut rows: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.owner_id == owner && filter.matches(n))
            .cloned()
            .collect();
        rows.sort_by_key(|n| Reverse(n.created_at));
        let total = rows.len() as u64;
        Ok((page_of(&rows, page), total))
    }

    async fn count_unread(&self, owner: Uuid) -> Result<u64, DatabaseError> {
        self.check()?;
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.owner_id == owner && !n.is_read)
            .count() as u64)
    }

    async fn insert(&self, notification: NewNotification) -> Result<Notification, DatabaseError> {
        self.check()?;
        let notification = notification.into_notification(Uuid::new_v4(), Utc::now());
        self.state.write().await.notifications.push(notification.clone());
        self.wrote();
        Ok(notification)
    }

    async fn mark_read(&self, owner: Uuid, id: Uuid) -> Result<Option<Notification>, DatabaseError> {
        self.check()?;
        let mut state = self.state.write().await;
        let Some(n) = state.notifications.iter_mut().find(|n| n.id == id && n.owner_id == owner) else {
            return Ok(None);
        };
        n.is_read = true;
        n.version += 1;
        n.updated_at = Utc::now();
        let updated = n.clone();
        drop(state);
        self.wrote();
        Ok(Some(updated))
    }

    async fn mark_all_read(&self, owner: Uuid) -> Result<u64, DatabaseError> {
        self.check()?;
        let now = Utc::now();
        let mut state = self.state.write().await;
        let mut touched = 0;
        for n in state
            .notifications
            .iter_mut()
            .filter(|n| n.owner_id == owner && !n.is_read)
        {
            n.is_read = true;
            n.version += 1;
            n.updated_at = now;
            touched += 1;
        }
        drop(state);
        if touched > 0 {
            self.wrote();
        }
        Ok(touched)
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<bool, DatabaseError> {
        self.check()?;
        let mut state = self.state.write().await;
        let before = state.notifications.len();
        state.notifications.retain(|n| !(n.id == id && n.owner_id == owner));
        let removed = state.notifications.len() != before;
        drop(state);
        if removed {
            self.wrote();
        }
        Ok(removed)
    }

    async fn find_overdue(&self, owner: Uuid, period: &Period) -> Result<Option<Notification>, DatabaseError> {
        self.check()?;
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .find(|n| is_overdue_key(n, owner, period))
            .cloned())
    }

    async fn insert_overdue(&self, notification: NewNotification) -> Result<Option<Notification>, DatabaseError> {
        self.check()?;
        let period = notification
            .metadata
            .month
            .ok_or_else(|| DatabaseError::QueryError("overdue notification without period".to_string()))?;
        let owner = notification.owner_id;

        let mut state = self.state.write().await;
        if state.notifications.iter().any(|n| is_overdue_key(n, owner, &period)) {
            return Ok(None);
        }
        let notification = NewNotification {
            kind: NotificationKind::OverduePayment,
            ..notification
        }
        .into_notification(Uuid::new_v4(), Utc::now());
        state.notifications.push(notification.clone());
        drop(state);
        self.wrote();
        Ok(Some(notification))
    }

    async fn replace_overdue(&self, notification: &Notification) -> Result<bool, DatabaseError> {
        self.check()?;
        let mut state = self.state.write().await;
        let Some(stored) = state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification.id && n.owner_id == notification.owner_id)
        else {
            return Ok(false);
        };
        if stored.version != notification.version {
            return Ok(false);
        }
        stored.message = notification.message.clone();
        stored.student_ids = notification.student_ids.clone();
        stored.student_names = notification.student_names.clone();
        stored.metadata.count = notification.metadata.count;
        stored.is_read = notification.is_read;
        stored.version += 1;
        stored.updated_at = Utc::now();
        drop(state);
        self.wrote();
        Ok(true)
    }

    async fn delete_overdue(
        &self,
        owner: Uuid,
        period: &Period,
        expected_version: Option<i64>,
    ) -> Result<bool, DatabaseError> {
        self.check()?;
        let mut state = self.state.write().await;
        let before = state.notifications.len();
        state.notifications.retain(|n| {
            !(is_overdue_key(n, owner, period) && expected_version.map_or(true, |v| n.version == v))
        });
        let removed = state.notifications.len() != before;
        drop(state);
        if removed {
            self.wrote();
        }
        Ok(removed)
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        self.check()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
