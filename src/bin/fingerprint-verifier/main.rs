//! fingerprint-verifier CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::WrapErr;
use fingerprint_verifier::config::LogFormat;
use fingerprint_verifier::{
    CandidateMinutiae, IdentityKey, ServiceBuilder, ServiceConfig, VerificationRequest,
};
use serde_json::json;
use std::path::Path;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments and build configuration
    let cli = Cli::parse();
    let command = cli.command.clone();
    let config = cli.into_config()?;

    init_tracing(&config);
    info!("fingerprint-verifier v{}", env!("CARGO_PKG_VERSION"));

    let expose_details = config.expose_error_details;
    let service = ServiceBuilder::new(config).build().await?;

    let code = match command {
        Command::Health => {
            let report = service.health().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            ExitCode::SUCCESS
        }
        Command::Verify {
            subject,
            modality,
            minutiae,
        } => {
            let candidates = read_candidates(&minutiae)?;
            let request =
                VerificationRequest::new(IdentityKey::new(subject, modality), candidates);

            match service.verify(request).await {
                Ok(response) => {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    let body = json!({
                        "trace_id": e.trace_id,
                        "error": e.kind,
                        "status": e.status_code(),
                        "message": e.public_message(expose_details),
                    });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                    ExitCode::FAILURE
                }
            }
        }
    };

    service.flush_audit().await?;
    Ok(code)
}

fn init_tracing(config: &ServiceConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }
}

fn read_candidates(path: &Path) -> color_eyre::Result<CandidateMinutiae> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read minutiae file {}", path.display()))?;
    serde_json::from_str(&content)
        .wrap_err_with(|| format!("Invalid minutiae in {}", path.display()))
}
