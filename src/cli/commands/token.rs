use clap::Args;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims};
use crate::cli::OutputFormat;
use crate::config;

#[derive(Debug, Args)]
pub struct TokenArgs {
    #[arg(long, help = "Operator (account) id the token is issued for")]
    pub operator: Uuid,

    #[arg(long, help = "Email claim")]
    pub email: Option<String>,

    #[arg(long, help = "Mobile number claim")]
    pub mobile: Option<String>,
}

pub fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config::config().security;
    let claims = Claims::new(args.operator, args.email, args.mobile, security.jwt_expiry_hours);
    let token = generate_jwt(&claims, &security.jwt_secret)?;

    match output_format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "success": true,
                "token": token,
                "operator": args.operator,
                "expiresAt": claims.exp
            }))?
        ),
        // Bare token so it can be captured by shell scripts
        OutputFormat::Text => println!("{}", token),
    }
    Ok(())
}
