use async_trait::async_trait;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    NewNotification, NewPayment, Notification, NotificationFilter, Payment, PaymentFilter, Student,
    StudentRef,
};
use crate::types::{PageRequest, Period};

/// Read access to the operator's student directory
#[async_trait]
pub trait StudentDirectory: Send + Sync {
    /// Active students of `owner`, in directory order (oldest first)
    async fn find_active_by_owner(&self, owner: Uuid) -> Result<Vec<StudentRef>, DatabaseError>;

    /// A single student, only if `owner` owns it
    async fn find_owned(&self, owner: Uuid, id: Uuid) -> Result<Option<Student>, DatabaseError>;

    /// Students of `owner` among `ids`; unknown ids are skipped, order is unspecified
    async fn find_by_ids(&self, owner: Uuid, ids: &[Uuid]) -> Result<Vec<Student>, DatabaseError>;
}

/// Billing rows
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Student ids among `student_ids` with at least one payment row for `period`.
    /// May contain duplicates.
    async fn paid_student_ids(
        &self,
        owner: Uuid,
        period: &Period,
        student_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, DatabaseError>;

    /// Newest payment date first, then newest created
    async fn list(
        &self,
        owner: Uuid,
        filter: &PaymentFilter,
        page: PageRequest,
    ) -> Result<(Vec<Payment>, u64), DatabaseError>;

    async fn insert(&self, payment: NewPayment) -> Result<Payment, DatabaseError>;

    async fn find(&self, owner: Uuid, id: Uuid) -> Result<Option<Payment>, DatabaseError>;

    /// Persist all mutable fields of `payment`; `NotFound` if it vanished meanwhile
    async fn update(&self, payment: &Payment) -> Result<Payment, DatabaseError>;

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<Option<Payment>, DatabaseError>;

    /// Set the billing-management flag on every payment of a student; returns rows touched
    async fn set_active_for_student(
        &self,
        owner: Uuid,
        student_id: Uuid,
        is_active: bool,
    ) -> Result<u64, DatabaseError>;
}

/// Notification documents. Overdue documents are keyed by (owner, period) and written
/// only through the `*_overdue` methods.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn list(
        &self,
        owner: Uuid,
        filter: &NotificationFilter,
        page: PageRequest,
    ) -> Result<(Vec<Notification>, u64), DatabaseError>;

    async fn count_unread(&self, owner: Uuid) -> Result<u64, DatabaseError>;

    async fn insert(&self, notification: NewNotification) -> Result<Notification, DatabaseError>;

    async fn mark_read(&self, owner: Uuid, id: Uuid) -> Result<Option<Notification>, DatabaseError>;

    async fn mark_all_read(&self, owner: Uuid) -> Result<u64, DatabaseError>;

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<bool, DatabaseError>;

    async fn find_overdue(&self, owner: Uuid, period: &Period) -> Result<Option<Notification>, DatabaseError>;

    /// Insert the overdue document for `notification.metadata.month`.
    /// Returns `None` when one already exists for that key.
    async fn insert_overdue(&self, notification: NewNotification) -> Result<Option<Notification>, DatabaseError>;

    /// Replace the content fields of `notification` if its stored version still equals
    /// `notification.version`. Returns `false` when another writer got there first.
    async fn replace_overdue(&self, notification: &Notification) -> Result<bool, DatabaseError>;

    /// Delete the overdue document for (owner, period). With `expected_version`, only
    /// deletes that exact revision. Returns whether a document was removed.
    async fn delete_overdue(
        &self,
        owner: Uuid,
        period: &Period,
        expected_version: Option<i64>,
    ) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn health_check(&self) -> Result<(), DatabaseError>;

    fn backend_name(&self) -> &'static str;
}
