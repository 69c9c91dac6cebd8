pub mod migrate;
pub mod overdue;
pub mod token;
