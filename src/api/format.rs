use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::database::models::{Payment, Student, StudentSummary};

/// Payment as returned by the billing endpoints, with its student embedded
#[derive(Debug, Clone, Serialize)]
pub struct PaymentView {
    #[serde(flatten)]
    pub payment: Payment,
    /// `null` when the student no longer exists in the directory
    pub student: Option<StudentSummary>,
}

impl PaymentView {
    pub fn new(payment: Payment, student: Option<&Student>) -> Self {
        Self {
            payment,
            student: student.map(StudentSummary::from),
        }
    }
}

/// Join payments with the students they reference
pub fn payments_with_students(payments: Vec<Payment>, students: &[Student]) -> Vec<PaymentView> {
    let by_id: HashMap<Uuid, &Student> = students.iter().map(|s| (s.id, s)).collect();
    payments
        .into_iter()
        .map(|p| {
            let student = by_id.get(&p.student_id).copied();
            PaymentView::new(p, student)
        })
        .collect()
}

/// Distinct student ids referenced by `payments`, in first-seen order
pub fn referenced_students(payments: &[Payment]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = Vec::new();
    for p in payments {
        if !ids.contains(&p.student_id) {
            ids.push(p.student_id);
        }
    }
    ids
}
