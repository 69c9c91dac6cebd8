pub mod clock;
pub mod overdue_service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use overdue_service::{OverdueService, OverdueStudent, Removal};
