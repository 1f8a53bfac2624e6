//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, validate, health), and their associated argument
//! structs. Every `run` flag has an environment variable equivalent for
//! container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "api-gateway",
    version,
    about = "Reverse-proxy gateway with retries and backend health tracking",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        api-gateway run                      Start with ./gateway.yaml or built-in backends\n  \
        api-gateway run -c gateway.yaml      Start with a specific config\n  \
        api-gateway health                   Check a running gateway"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway
    Run(Box<RunArgs>),

    /// Validate a config file without starting
    Validate(ValidateArgs),

    /// Check health of a running gateway
    Health(HealthArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        api-gateway run                                  Auto-detect config\n  \
        api-gateway run -c gateway.yaml -p 8080 --pretty Local dev mode\n  \
        USER_SERVICE_URL=http://users:3001 api-gateway run\n                                                   \
        Override one backend from the environment")]
pub struct RunArgs {
    /// Config file path (.yaml, .json, .toml)
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Tuning --
    /// Max request body size in bytes
    #[arg(
        long,
        env = "MAX_BODY_SIZE",
        default_value_t = 1_048_576,
        help_heading = "Tuning"
    )]
    pub max_body: usize,

    /// Background probe interval in seconds (0 disables; /health always probes)
    #[arg(
        long,
        env = "PROBE_INTERVAL_SECS",
        default_value_t = 0,
        help_heading = "Tuning"
    )]
    pub probe_interval: u64,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = "gateway.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,

    /// Apply per-backend environment overrides before validating
    #[arg(long)]
    pub env: bool,
}

#[derive(Args)]
pub struct HealthArgs {
    /// URL of the running gateway
    #[arg(default_value = "http://localhost:3000")]
    pub url: String,

    /// Seconds to wait for `/health`; it probes every backend, so set this
    /// above the slowest backend timeout
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}
