use chrono::{DateTime, NaiveDate};

use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{PageRequest, Period};

/// Page window from raw query values, using the configured limits
pub fn page_request(state: &AppState, page: Option<u32>, limit: Option<u32>) -> PageRequest {
    PageRequest::resolve(
        page,
        limit,
        state.config.api.default_page_limit,
        state.config.api.max_page_limit,
    )
}

/// Trimmed value, or `None` when absent or blank
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn parse_period(raw: &str) -> Result<Period, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::bad_request("Payment month must be in YYYY-MM format"))
}

/// Accepts a plain date or a full RFC 3339 timestamp
pub fn parse_payment_date(raw: &str) -> Result<NaiveDate, ApiError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| ApiError::bad_request("Payment date must be a valid date"))
}
