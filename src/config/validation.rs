//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors such as an empty backend list, duplicate ids, malformed or
//! overlapping prefixes, bad backend URLs and zero timeouts. Returns a
//! list of [`ValidationError`] values with per-field suggestions.

use std::collections::HashSet;

use url::Url;

use super::model::Config;
use crate::error::ValidationError;
use crate::registry::prefixes_overlap;

/// Validate a route prefix. Returns `Ok(())` or a human-readable error.
pub fn validate_prefix(prefix: &str) -> Result<(), String> {
    if prefix.is_empty() {
        return Err("prefix cannot be empty".into());
    }
    if !prefix.starts_with('/') {
        return Err("prefix must start with '/'".into());
    }
    if prefix == "/" {
        return Err("prefix '/' would shadow every route".into());
    }
    if prefix.ends_with('/') {
        return Err("prefix must not end with '/'".into());
    }
    if prefix.contains(['?', '#', '*']) {
        return Err("prefix must be a literal path".into());
    }
    Ok(())
}

/// Validate a backend base URL. Returns `Ok(())` or a human-readable error.
pub fn validate_backend_url(url: &str) -> Result<(), String> {
    match Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            } else if parsed.host_str().is_none() {
                Err(format!("'{url}' has no host"))
            } else {
                Ok(())
            }
        }
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.defaults.timeout == 0 {
        errors.push(ValidationError {
            backend: "(defaults)".into(),
            field: "timeout".into(),
            message: "timeout must be greater than 0".into(),
            suggestion: Some("the usual value is 5000".into()),
        });
    }

    if config.backends.is_empty() {
        errors.push(ValidationError {
            backend: "(root)".into(),
            field: "backends".into(),
            message: "at least one backend must be defined".into(),
            suggestion: None,
        });
        return Err(errors);
    }

    let mut seen_ids = HashSet::new();
    let mut seen_prefixes: Vec<(&str, &str)> = Vec::new();

    for (i, backend) in config.backends.iter().enumerate() {
        let backend_id = if backend.id.is_empty() {
            format!("backends[{i}]")
        } else {
            backend.id.clone()
        };

        if backend.id.is_empty() {
            errors.push(ValidationError {
                backend: backend_id.clone(),
                field: "id".into(),
                message: "id cannot be empty".into(),
                suggestion: None,
            });
        } else if !seen_ids.insert(backend.id.as_str()) {
            errors.push(ValidationError {
                backend: backend_id.clone(),
                field: "id".into(),
                message: "duplicate backend id".into(),
                suggestion: None,
            });
        }

        if backend.name.trim().is_empty() {
            errors.push(ValidationError {
                backend: backend_id.clone(),
                field: "name".into(),
                message: "name cannot be empty".into(),
                suggestion: None,
            });
        }

        match validate_prefix(&backend.prefix) {
            Ok(()) => {
                if let Some((other, _)) = seen_prefixes
                    .iter()
                    .find(|(_, p)| prefixes_overlap(p, &backend.prefix))
                {
                    errors.push(ValidationError {
                        backend: backend_id.clone(),
                        field: "prefix".into(),
                        message: format!(
                            "prefix '{}' overlaps with backend '{other}'",
                            backend.prefix
                        ),
                        suggestion: None,
                    });
                } else {
                    seen_prefixes.push((backend.id.as_str(), backend.prefix.as_str()));
                }
            }
            Err(msg) => {
                let trimmed = backend.prefix.trim_end_matches('/');
                let suggestion = if !backend.prefix.starts_with('/') && !backend.prefix.is_empty()
                {
                    Some(format!("did you mean '/{}'?", backend.prefix))
                } else if trimmed.len() > 1 && trimmed != backend.prefix {
                    Some(format!("did you mean '{trimmed}'?"))
                } else {
                    None
                };
                errors.push(ValidationError {
                    backend: backend_id.clone(),
                    field: "prefix".into(),
                    message: msg,
                    suggestion,
                });
            }
        }

        if let Err(msg) = validate_backend_url(&backend.url) {
            errors.push(ValidationError {
                backend: backend_id.clone(),
                field: "url".into(),
                message: msg,
                suggestion: None,
            });
        }

        if backend.timeout == Some(0) {
            errors.push(ValidationError {
                backend: backend_id.clone(),
                field: "timeout".into(),
                message: "timeout must be greater than 0".into(),
                suggestion: Some("omit it to use defaults.timeout".into()),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let mut lines = vec![format!("  {} backends\n", config.backends.len())];

    for backend in &config.backends {
        let timeout = backend.timeout.map_or_else(
            || format!("{}ms (default)", config.defaults.timeout),
            |t| format!("{t}ms"),
        );
        let retries = backend.retries.map_or_else(
            || format!("{} (default)", config.defaults.retries),
            |r| r.to_string(),
        );

        lines.push(format!(
            "  {}  -> {} ({})",
            backend.prefix, backend.url, backend.name
        ));
        lines.push(format!("    timeout: {timeout}"));
        lines.push(format!("    retries: {retries}"));
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}
