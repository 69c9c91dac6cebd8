use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Period;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMode {
    Cash,
    Online,
    #[serde(rename = "Google Pay")]
    GooglePay,
    Paytm,
    PhonePe,
    Other,
}

impl PaymentMode {
    pub const ALL: [PaymentMode; 6] = [
        PaymentMode::Cash,
        PaymentMode::Online,
        PaymentMode::GooglePay,
        PaymentMode::Paytm,
        PaymentMode::PhonePe,
        PaymentMode::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Cash => "Cash",
            PaymentMode::Online => "Online",
            PaymentMode::GooglePay => "Google Pay",
            PaymentMode::Paytm => "Paytm",
            PaymentMode::PhonePe => "PhonePe",
            PaymentMode::Other => "Other",
        }
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown payment mode '{}'", s))
    }
}

/// One billing row: a payment received from a student for a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub student_id: Uuid,
    pub payment_date: NaiveDate,
    pub payment_time: String,
    pub payment_mode: PaymentMode,
    pub utr_number: Option<String>,
    pub payment_month: Period,
    pub amount: Decimal,
    /// Billing management flag, toggled per student
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub owner_id: Uuid,
    pub student_id: Uuid,
    pub payment_date: NaiveDate,
    pub payment_time: String,
    pub payment_mode: PaymentMode,
    pub utr_number: Option<String>,
    pub payment_month: Period,
    pub amount: Decimal,
}

impl NewPayment {
    pub fn into_payment(self, id: Uuid, now: DateTime<Utc>) -> Payment {
        Payment {
            id,
            owner_id: self.owner_id,
            student_id: self.student_id,
            payment_date: self.payment_date,
            payment_time: self.payment_time,
            utr_number: utr_for_mode(self.payment_mode, self.utr_number),
            payment_mode: self.payment_mode,
            payment_month: self.payment_month,
            amount: self.amount,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; `None` leaves the field as is
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentChanges {
    pub payment_date: Option<NaiveDate>,
    pub payment_time: Option<String>,
    pub payment_mode: Option<PaymentMode>,
    pub utr_number: Option<String>,
    pub payment_month: Option<Period>,
    pub amount: Option<Decimal>,
}

impl PaymentChanges {
    pub fn apply(self, payment: &mut Payment) {
        if let Some(date) = self.payment_date {
            payment.payment_date = date;
        }
        if let Some(time) = self.payment_time {
            payment.payment_time = time;
        }
        if let Some(mode) = self.payment_mode {
            payment.payment_mode = mode;
        }
        if let Some(utr) = self.utr_number {
            payment.utr_number = Some(utr);
        }
        // A reference number only means something for online transfers
        payment.utr_number = utr_for_mode(payment.payment_mode, payment.utr_number.take());
        if let Some(month) = self.payment_month {
            payment.payment_month = month;
        }
        if let Some(amount) = self.amount {
            payment.amount = amount;
        }
    }
}

fn utr_for_mode(mode: PaymentMode, utr: Option<String>) -> Option<String> {
    match mode {
        PaymentMode::Online => utr.filter(|u| !u.trim().is_empty()),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentFilter {
    pub student_id: Option<Uuid>,
    pub payment_month: Option<Period>,
    pub payment_mode: Option<PaymentMode>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        self.student_id.map_or(true, |id| payment.student_id == id)
            && self.payment_month.map_or(true, |m| payment.payment_month == m)
            && self.payment_mode.map_or(true, |m| payment.payment_mode == m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample(mode: PaymentMode, utr: Option<&str>) -> Payment {
        NewPayment {
            owner_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            payment_date: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            payment_time: "10:30".into(),
            payment_mode: mode,
            utr_number: utr.map(str::to_string),
            payment_month: "2025-06".parse().unwrap(),
            amount: Decimal::from_str("1500.00").unwrap(),
        }
        .into_payment(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn payment_mode_wire_names() {
        assert_eq!(serde_json::to_value(PaymentMode::GooglePay).unwrap(), "Google Pay");
        assert_eq!(PaymentMode::from_str("PhonePe").unwrap(), PaymentMode::PhonePe);
        assert!(PaymentMode::from_str("Cheque").is_err());
    }

    #[test]
    fn utr_only_kept_for_online() {
        assert_eq!(sample(PaymentMode::Online, Some("UTR123")).utr_number.as_deref(), Some("UTR123"));
        assert_eq!(sample(PaymentMode::Cash, Some("UTR123")).utr_number, None);
    }

    #[test]
    fn changing_mode_away_from_online_drops_utr() {
        let mut p = sample(PaymentMode::Online, Some("UTR123"));
        PaymentChanges {
            payment_mode: Some(PaymentMode::Cash),
            ..Default::default()
        }
        .apply(&mut p);
        assert_eq!(p.payment_mode, PaymentMode::Cash);
        assert_eq!(p.utr_number, None);
    }

    #[test]
    fn changes_leave_untouched_fields_alone() {
        let mut p = sample(PaymentMode::Cash, None);
        let before = p.clone();
        PaymentChanges {
            payment_month: Some("2025-07".parse().unwrap()),
            ..Default::default()
        }
        .apply(&mut p);
        assert_eq!(p.payment_month.to_string(), "2025-07");
        assert_eq!(p.amount, before.amount);
        assert_eq!(p.payment_time, before.payment_time);
    }

    #[test]
    fn filter_matches_on_all_given_fields() {
        let p = sample(PaymentMode::Paytm, None);
        assert!(PaymentFilter::default().matches(&p));
        assert!(PaymentFilter { payment_mode: Some(PaymentMode::Paytm), ..Default::default() }.matches(&p));
        assert!(!PaymentFilter { student_id: Some(Uuid::new_v4()), ..Default::default() }.matches(&p));
    }
}
