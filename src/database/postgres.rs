use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{
    NewNotification, NewPayment, Notification, NotificationFilter, NotificationKind,
    NotificationMetadata, Payment, PaymentFilter, Student, StudentRef,
};
use crate::database::repository::{NotificationStore, PaymentLedger, StoreHealth, StudentDirectory};
use crate::types::{PageRequest, Period};

const PAYMENT_COLUMNS: &str = "id, owner_id, student_id, payment_date, payment_time, payment_mode, \
     utr_number, payment_month, amount, is_active, created_at, updated_at";

const NOTIFICATION_COLUMNS: &str = "id, owner_id, title, message, kind, student_ids, student_names, \
     is_read, period, item_count, version, created_at, updated_at";

/// sqlx-backed implementation of every store trait over one pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: Uuid,
    owner_id: Uuid,
    student_id: Uuid,
    payment_date: NaiveDate,
    payment_time: String,
    payment_mode: String,
    utr_number: Option<String>,
    payment_month: String,
    amount: Decimal,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DatabaseError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            owner_id: row.owner_id,
            student_id: row.student_id,
            payment_date: row.payment_date,
            payment_time: row.payment_time,
            payment_mode: row.payment_mode.parse().map_err(DatabaseError::Decode)?,
            utr_number: row.utr_number,
            payment_month: row
                .payment_month
                .parse()
                .map_err(|e: crate::types::PeriodParseError| DatabaseError::Decode(e.to_string()))?,
            amount: row.amount,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    message: String,
    kind: String,
    student_ids: Vec<Uuid>,
    student_names: Vec<String>,
    is_read: bool,
    period: Option<String>,
    item_count: Option<i64>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = DatabaseError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let month = row
            .period
            .map(|p| p.parse::<Period>())
            .transpose()
            .map_err(|e| DatabaseError::Decode(e.to_string()))?;
        Ok(Notification {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            message: row.message,
            kind: row.kind.parse().map_err(DatabaseError::Decode)?,
            student_ids: row.student_ids,
            student_names: row.student_names,
            is_read: row.is_read,
            metadata: NotificationMetadata {
                month,
                count: row.item_count,
            },
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, DatabaseError>
where
    T: TryFrom<R, Error = DatabaseError>,
{
    rows.into_iter().map(T::try_from).collect()
}

fn push_payment_filter(qb: &mut QueryBuilder<'_, Postgres>, owner: Uuid, filter: &PaymentFilter) {
    qb.push(" WHERE owner_id = ").push_bind(owner);
    if let Some(student_id) = filter.student_id {
        qb.push(" AND student_id = ").push_bind(student_id);
    }
    if let Some(month) = filter.payment_month {
        qb.push(" AND payment_month = ").push_bind(month.to_string());
    }
    if let Some(mode) = filter.payment_mode {
        qb.push(" AND payment_mode = ").push_bind(mode.as_str());
    }
}

fn push_notification_filter(qb: &mut QueryBuilder<'_, Postgres>, owner: Uuid, filter: &NotificationFilter) {
    qb.push(" WHERE owner_id = ").push_bind(owner);
    if let Some(is_read) = filter.is_read {
        qb.push(" AND is_read = ").push_bind(is_read);
    }
    if let Some(kind) = filter.kind {
        qb.push(" AND kind = ").push_bind(kind.as_str());
    }
}

#[async_trait]
impl StudentDirectory for PgStore {
    async fn find_active_by_owner(&self, owner: Uuid) -> Result<Vec<StudentRef>, DatabaseError> {
        let rows = sqlx::query_as::<_, StudentRef>(
            "SELECT id, full_name FROM students WHERE owner_id = $1 AND is_active = true ORDER BY created_at, id",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_owned(&self, owner: Uuid, id: Uuid) -> Result<Option<Student>, DatabaseError> {
        let row = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_ids(&self, owner: Uuid, ids: &[Uuid]) -> Result<Vec<Student>, DatabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let rows = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE owner_id = $1 AND id = ANY($2)")
            .bind(owner)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl PaymentLedger for PgStore {
    async fn paid_student_ids(
        &self,
        owner: Uuid,
        period: &Period,
        student_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, DatabaseError> {
        if student_ids.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT student_id FROM payments WHERE owner_id = $1 AND payment_month = $2 AND student_id = ANY($3)",
        )
        .bind(owner)
        .bind(period.to_string())
        .bind(student_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn list(
        &self,
        owner: Uuid,
        filter: &PaymentFilter,
        page: PageRequest,
    ) -> Result<(Vec<Payment>, u64), DatabaseError> {
        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM payments", PAYMENT_COLUMNS));
        push_payment_filter(&mut select, owner, filter);
        select
            .push(" ORDER BY payment_date DESC, created_at DESC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM payments");
        push_payment_filter(&mut count, owner, filter);

        let (rows, (total,)) = futures::try_join!(
            select.build_query_as::<PaymentRow>().fetch_all(&self.pool),
            count.build_query_as::<(i64,)>().fetch_one(&self.pool),
        )?;

        Ok((decode_all(rows)?, total.max(0) as u64))
    }

    async fn insert(&self, payment: NewPayment) -> Result<Payment, DatabaseError> {
        let payment = payment.into_payment(Uuid::new_v4(), Utc::now());
        let sql = format!(
            "INSERT INTO payments ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {}",
            PAYMENT_COLUMNS, PAYMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(payment.id)
            .bind(payment.owner_id)
            .bind(payment.student_id)
            .bind(payment.payment_date)
            .bind(&payment.payment_time)
            .bind(payment.payment_mode.as_str())
            .bind(&payment.utr_number)
            .bind(payment.payment_month.to_string())
            .bind(payment.amount)
            .bind(payment.is_active)
            .bind(payment.created_at)
            .bind(payment.updated_at)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn find(&self, owner: Uuid, id: Uuid) -> Result<Option<Payment>, DatabaseError> {
        let sql = format!("SELECT {} FROM payments WHERE id = $1 AND owner_id = $2", PAYMENT_COLUMNS);
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn update(&self, payment: &Payment) -> Result<Payment, DatabaseError> {
        let sql = format!(
            r#"
            UPDATE payments
            SET payment_date = $3, payment_time = $4, payment_mode = $5, utr_number = $6,
                payment_month = $7, amount = $8, is_active = $9, updated_at = now()
            WHERE id = $1 AND owner_id = $2
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(payment.id)
            .bind(payment.owner_id)
            .bind(payment.payment_date)
            .bind(&payment.payment_time)
            .bind(payment.payment_mode.as_str())
            .bind(&payment.utr_number)
            .bind(payment.payment_month.to_string())
            .bind(payment.amount)
            .bind(payment.is_active)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| DatabaseError::NotFound(format!("payment {}", payment.id)))?
            .try_into()
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<Option<Payment>, DatabaseError> {
        let sql = format!(
            "DELETE FROM payments WHERE id = $1 AND owner_id = $2 RETURNING {}",
            PAYMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn set_active_for_student(
        &self,
        owner: Uuid,
        student_id: Uuid,
        is_active: bool,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE payments SET is_active = $3, updated_at = now() WHERE owner_id = $1 AND student_id = $2",
        )
        .bind(owner)
        .bind(student_id)
        .bind(is_active)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn list(
        &self,
        owner: Uuid,
        filter: &NotificationFilter,
        page: PageRequest,
    ) -> Result<(Vec<Notification>, u64), DatabaseError> {
        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM notifications", NOTIFICATION_COLUMNS));
        push_notification_filter(&mut select, owner, filter);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM notifications");
        push_notification_filter(&mut count, owner, filter);

        let (rows, (total,)) = futures::try_join!(
            select.build_query_as::<NotificationRow>().fetch_all(&self.pool),
            count.build_query_as::<(i64,)>().fetch_one(&self.pool),
        )?;

        Ok((decode_all(rows)?, total.max(0) as u64))
    }

    async fn count_unread(&self, owner: Uuid) -> Result<u64, DatabaseError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE owner_id = $1 AND is_read = false")
                .bind(owner)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }

    async fn insert(&self, notification: NewNotification) -> Result<Notification, DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO notifications (id, owner_id, title, message, kind, student_ids, student_names, period, item_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        );
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(notification.owner_id)
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(notification.kind.as_str())
            .bind(&notification.student_ids)
            .bind(&notification.student_names)
            .bind(notification.metadata.month.map(|m| m.to_string()))
            .bind(notification.metadata.count)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn mark_read(&self, owner: Uuid, id: Uuid) -> Result<Option<Notification>, DatabaseError> {
        let sql = format!(
            r#"
            UPDATE notifications SET is_read = true, version = version + 1, updated_at = now()
            WHERE id = $1 AND owner_id = $2
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        );
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Notification::try_from).transpose()
    }

    async fn mark_all_read(&self, owner: Uuid) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true, version = version + 1, updated_at = now() \
             WHERE owner_id = $1 AND is_read = false",
        )
        .bind(owner)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_overdue(&self, owner: Uuid, period: &Period) -> Result<Option<Notification>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE owner_id = $1 AND kind = 'overdue_payment' AND period = $2",
            NOTIFICATION_COLUMNS
        );
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(owner)
            .bind(period.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Notification::try_from).transpose()
    }

    async fn insert_overdue(&self, notification: NewNotification) -> Result<Option<Notification>, DatabaseError> {
        let period = notification
            .metadata
            .month
            .ok_or_else(|| DatabaseError::QueryError("overdue notification without period".to_string()))?;

        // The partial unique index turns a concurrent second insert into a no-op
        let sql = format!(
            r#"
            INSERT INTO notifications (id, owner_id, title, message, kind, student_ids, student_names, period, item_count)
            VALUES ($1, $2, $3, $4, 'overdue_payment', $5, $6, $7, $8)
            ON CONFLICT (owner_id, period) WHERE kind = 'overdue_payment' DO NOTHING
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        );
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(notification.owner_id)
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(&notification.student_ids)
            .bind(&notification.student_names)
            .bind(period.to_string())
            .bind(notification.metadata.count)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Notification::try_from).transpose()
    }

    async fn replace_overdue(&self, notification: &Notification) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET message = $4, student_ids = $5, student_names = $6, item_count = $7, is_read = $8,
                version = version + 1, updated_at = now()
            WHERE id = $1 AND owner_id = $2 AND version = $3
            "#,
        )
        .bind(notification.id)
        .bind(notification.owner_id)
        .bind(notification.version)
        .bind(&notification.message)
        .bind(&notification.student_ids)
        .bind(&notification.student_names)
        .bind(notification.metadata.count)
        .bind(notification.is_read)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_overdue(
        &self,
        owner: Uuid,
        period: &Period,
        expected_version: Option<i64>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE owner_id = $1 AND kind = 'overdue_payment' AND period = $2
              AND ($3::BIGINT IS NULL OR version = $3)
            "#,
        )
        .bind(owner)
        .bind(period.to_string())
        .bind(expected_version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
