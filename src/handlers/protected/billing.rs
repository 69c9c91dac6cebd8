use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::format::{payments_with_students, referenced_students, PaymentView};
use crate::database::models::{NewPayment, PaymentChanges, PaymentFilter, PaymentMode};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Operator};
use crate::services::overdue_service::OverdueStudent;
use crate::state::AppState;
use crate::types::Pagination;

use super::utils::{non_blank, page_request, parse_payment_date, parse_period};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub student_id: Option<Uuid>,
    pub payment_month: Option<String>,
    pub payment_mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BillingPage {
    pub billing: Vec<PaymentView>,
    pub pagination: Pagination,
}

/// Body of POST /api/billing. Everything is optional here so missing fields produce
/// one validation message instead of a deserialization error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentBody {
    pub student_id: Option<Uuid>,
    pub payment_date: Option<String>,
    pub payment_time: Option<String>,
    pub payment_mode: Option<String>,
    pub utr_number: Option<String>,
    pub payment_month: Option<String>,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentBody {
    pub payment_date: Option<String>,
    pub payment_time: Option<String>,
    pub payment_mode: Option<String>,
    pub utr_number: Option<String>,
    pub payment_month: Option<String>,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleBody {
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResult {
    pub student_id: Uuid,
    pub is_active: bool,
    pub updated_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueList {
    pub overdue_payments: Vec<OverdueStudent>,
}

fn parse_mode(raw: &str) -> Result<PaymentMode, ApiError> {
    raw.trim().parse().map_err(|_| {
        let modes: Vec<&str> = PaymentMode::ALL.iter().map(PaymentMode::as_str).collect();
        ApiError::bad_request(format!("Payment mode must be one of: {}", modes.join(", ")))
    })
}

fn check_amount(amount: Decimal) -> Result<Decimal, ApiError> {
    if amount < Decimal::ZERO {
        return Err(ApiError::bad_request("Amount must be a non-negative number"));
    }
    Ok(amount)
}

/// GET /api/billing - List the operator's payments
pub async fn list(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
    query: Result<Query<BillingQuery>, QueryRejection>,
) -> ApiResult<BillingPage> {
    let Query(query) = query?;
    let page = page_request(&state, query.page, query.limit);

    let filter = PaymentFilter {
        student_id: query.student_id,
        payment_month: non_blank(query.payment_month).map(|m| parse_period(&m)).transpose()?,
        payment_mode: non_blank(query.payment_mode).map(|m| parse_mode(&m)).transpose()?,
    };

    let (payments, total) = state.payments.list(operator.id, &filter, page).await?;
    let students = state
        .students
        .find_by_ids(operator.id, &referenced_students(&payments))
        .await?;

    Ok(ApiResponse::success(BillingPage {
        billing: payments_with_students(payments, &students),
        pagination: Pagination::new(page, total),
    }))
}

/// POST /api/billing - Record a payment
pub async fn create(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
    body: Result<Json<CreatePaymentBody>, JsonRejection>,
) -> ApiResult<PaymentView> {
    let Json(body) = body?;

    let (Some(student_id), Some(date), Some(time), Some(mode), Some(month), Some(amount)) = (
        body.student_id,
        non_blank(body.payment_date),
        non_blank(body.payment_time),
        non_blank(body.payment_mode),
        non_blank(body.payment_month),
        body.amount,
    ) else {
        return Err(ApiError::bad_request("All required fields must be provided"));
    };

    let payment_mode = parse_mode(&mode)?;
    let payment_month = parse_period(&month)?;
    let payment_date = parse_payment_date(&date)?;
    let amount = check_amount(amount)?;

    let student = state
        .students
        .find_owned(operator.id, student_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Student not found or unauthorized"))?;

    let payment = state
        .payments
        .insert(NewPayment {
            owner_id: operator.id,
            student_id,
            payment_date,
            payment_time: time,
            payment_mode,
            utr_number: body.utr_number,
            payment_month,
            amount,
        })
        .await?;

    info!(
        "Recorded payment {} for student {} ({})",
        payment.id, payment.student_id, payment.payment_month
    );
    state
        .overdue
        .spawn_remove_student(operator.id, payment.student_id, payment.payment_month);

    Ok(ApiResponse::created(PaymentView::new(payment, Some(&student)))
        .with_message("Payment recorded successfully"))
}

/// PUT /api/billing/:id - Partially update a payment
pub async fn update(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdatePaymentBody>, JsonRejection>,
) -> ApiResult<PaymentView> {
    let Path(id) = path?;
    let Json(body) = body?;

    let changes = PaymentChanges {
        payment_date: body.payment_date.as_deref().map(parse_payment_date).transpose()?,
        payment_time: non_blank(body.payment_time),
        payment_mode: body.payment_mode.as_deref().map(parse_mode).transpose()?,
        utr_number: body.utr_number,
        payment_month: body.payment_month.as_deref().map(parse_period).transpose()?,
        amount: body.amount.map(check_amount).transpose()?,
    };

    let mut payment = state
        .payments
        .find(operator.id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment not found"))?;
    changes.apply(&mut payment);
    let payment = state.payments.update(&payment).await?;

    let student = state.students.find_owned(operator.id, payment.student_id).await?;
    state
        .overdue
        .spawn_remove_student(operator.id, payment.student_id, payment.payment_month);

    Ok(ApiResponse::success(PaymentView::new(payment, student.as_ref()))
        .with_message("Payment updated successfully"))
}

/// DELETE /api/billing/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<PaymentView> {
    let Path(id) = path?;

    let payment = state
        .payments
        .delete(operator.id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment not found"))?;

    info!("Deleted payment {} of student {}", payment.id, payment.student_id);
    Ok(ApiResponse::success(PaymentView::new(payment, None)).with_message("Payment deleted successfully"))
}

/// PATCH /api/billing/student/:studentId/toggle - Enable or disable billing management
pub async fn toggle_student(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Option<Json<ToggleBody>>,
) -> ApiResult<ToggleResult> {
    let Path(student_id) = path?;
    let is_active = body.and_then(|Json(b)| b.is_active).unwrap_or(true);

    state
        .students
        .find_owned(operator.id, student_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Student not found or unauthorized"))?;

    let updated_count = state
        .payments
        .set_active_for_student(operator.id, student_id, is_active)
        .await?;

    let message = if is_active {
        "Billing management enabled for student"
    } else {
        "Billing management disabled for student"
    };
    Ok(ApiResponse::success(ToggleResult {
        student_id,
        is_active,
        updated_count,
    })
    .with_message(message))
}

/// GET /api/billing/overdue - Recompute the current period's overdue list
pub async fn overdue(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
) -> ApiResult<OverdueList> {
    let overdue_payments = state
        .overdue
        .recompute_and_sync(operator.id, state.clock.now())
        .await?;

    Ok(ApiResponse::success(OverdueList { overdue_payments }))
}
