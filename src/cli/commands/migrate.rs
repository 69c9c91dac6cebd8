use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config;
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();
    let pool = DatabaseManager::connect(&config.database).await?;
    DatabaseManager::bootstrap_schema(&pool).await?;
    pool.close().await;

    output_success(
        output_format,
        "Database schema is up to date",
        Some(json!({ "environment": config.environment })),
    )
}
