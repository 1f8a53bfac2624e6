//! `api-gateway validate`: check a configuration file for errors.
//!
//! Loads the file through the same source as `run`, optionally applies
//! environment overrides, then validates it and builds the backend
//! registry. The report lists each backend with its effective timeout,
//! retry budget and worst-case added backoff.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::model::Config;
use crate::config::{create_file_source, env, validation};
use crate::error::{GatewayError, ValidationError};
use crate::proxy::retry::RetryPolicy;
use crate::registry::BackendRegistry;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackendReport {
    id: String,
    prefix: String,
    url: String,
    timeout_ms: u64,
    retries: u32,
    worst_case_backoff_ms: u64,
}

pub async fn execute(args: &ValidateArgs) -> Result<(), GatewayError> {
    let mut config = create_file_source(&args.config)?.load().await?;
    if args.env {
        env::apply_overrides(&mut config, |key| std::env::var(key).ok());
    }

    if let Err(errors) = validation::validate(&config) {
        report_errors(&args.config, args.format, &errors);
        return Err(GatewayError::ConfigValidation { errors });
    }

    let registry = BackendRegistry::from_config(&config)?;
    let backends = backend_reports(&config, &registry);

    match args.format {
        ValidateFormat::Text => {
            println!(
                "\u{2713} {}",
                validation::format_validation_report(&args.config.display().to_string(), &config)
            );
            for b in &backends {
                println!(
                    "  {}: up to {} attempts, worst-case backoff {}ms",
                    b.id,
                    u64::from(b.retries) + 1,
                    b.worst_case_backoff_ms
                );
            }
        }
        ValidateFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "backends": backends,
                })
            );
        }
    }

    Ok(())
}

fn backend_reports(config: &Config, registry: &BackendRegistry) -> Vec<BackendReport> {
    let policy = RetryPolicy::new(Duration::from_millis(config.defaults.backoff));
    registry
        .iter()
        .map(|b| BackendReport {
            id: b.id.clone(),
            prefix: b.prefix.clone(),
            url: b.url.clone(),
            timeout_ms: u64::try_from(b.timeout.as_millis()).unwrap_or(u64::MAX),
            retries: b.max_retries,
            worst_case_backoff_ms: u64::try_from(policy.worst_case(b.max_retries).as_millis())
                .unwrap_or(u64::MAX),
        })
        .collect()
}

fn report_errors(path: &Path, format: ValidateFormat, errors: &[ValidationError]) {
    match format {
        ValidateFormat::Text => {
            eprintln!("\u{2717} {} has {} errors\n", path.display(), errors.len());
            for error in errors {
                eprintln!("{error}");
            }
        }
        ValidateFormat::Json => {
            let errors: Vec<_> = errors
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "backend": e.backend,
                        "field": e.field,
                        "message": e.message,
                        "suggestion": e.suggestion,
                    })
                })
                .collect();
            println!("{}", serde_json::json!({ "valid": false, "errors": errors }));
        }
    }
}
