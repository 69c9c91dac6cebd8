use chrono::{DateTime, Utc};
use clap::Args;
use serde_json::json;
use uuid::Uuid;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config;
use crate::state::AppState;
use crate::types::Period;

#[derive(Debug, Args)]
pub struct OverdueArgs {
    #[arg(long, help = "Operator (account) id")]
    pub operator: Uuid,

    #[arg(long, help = "Evaluate at this RFC 3339 instant instead of now")]
    pub at: Option<DateTime<Utc>>,
}

pub async fn handle(args: OverdueArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = AppState::connect(config::config().clone()).await?;
    let now = args.at.unwrap_or_else(|| state.clock.now());
    let period = Period::containing(now);

    let overdue = state.overdue.recompute_and_sync(args.operator, now).await?;

    match output_format {
        OutputFormat::Json => output_success(
            output_format,
            &format!("{} overdue for {}", overdue.len(), period),
            Some(json!({
                "period": period,
                "overduePayments": overdue
            })),
        ),
        OutputFormat::Text => {
            if state.overdue.in_grace_window(now) {
                println!("{} is within the grace window; nobody is overdue yet", now.date_naive());
                return Ok(());
            }
            if overdue.is_empty() {
                println!("No overdue payments for {}", period);
                return Ok(());
            }
            println!("{:<38} {}", "STUDENT ID", "NAME");
            println!("{}", "-".repeat(60));
            for student in &overdue {
                println!("{:<38} {}", student.student_id, student.student_name);
            }
            Ok(())
        }
    }
}
