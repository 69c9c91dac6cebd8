pub mod notification;
pub mod payment;
pub mod student;

pub use notification::{
    NewNotification, Notification, NotificationFilter, NotificationKind, NotificationMetadata,
};
pub use payment::{NewPayment, Payment, PaymentChanges, PaymentFilter, PaymentMode};
pub use student::{Student, StudentRef, StudentSummary};
