//! Logging utilities for dbvc
//!
//! Installs a global `tracing` subscriber from the `[logging]` section of the
//! configuration. `RUST_LOG` still applies on top of the configured level.

use std::fs::File;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn env_filter(level: Level) -> Result<EnvFilter> {
    let directive = format!("dbvc={}", level)
        .parse()
        .map_err(|e| Error::Config(format!("invalid log directive: {}", e)))?;
    Ok(EnvFilter::from_default_env().add_directive(directive))
}

fn install<S>(subscriber: S) -> Result<()>
where
    S: tracing::Subscriber + Send + Sync + 'static,
{
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Config(format!("failed to install logger: {}", e)))
}

/// Initialize logging based on configuration; without a `[logging]` section
/// warnings and errors go to stderr
pub fn init_logging(config: &Option<LoggingConfig>) -> Result<()> {
    let Some(config) = config else {
        return install(
            fmt::Subscriber::builder()
                .with_env_filter(env_filter(Level::WARN)?)
                .with_writer(std::io::stderr)
                .finish(),
        );
    };

    let filter = env_filter(parse_level(&config.level))?;
    let json = config.format.eq_ignore_ascii_case("json");

    if let Some(file_path) = &config.file {
        if let Some(parent) = Path::new(file_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(file_path)?;

        if json {
            install(
                fmt::Subscriber::builder()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(file)
                    .finish(),
            )
        } else {
            install(
                fmt::Subscriber::builder()
                    .with_ansi(false)
                    .with_env_filter(filter)
                    .with_writer(file)
                    .finish(),
            )
        }
    } else if config.stdout {
        if json {
            install(fmt::Subscriber::builder().json().with_env_filter(filter).finish())
        } else {
            install(fmt::Subscriber::builder().with_env_filter(filter).finish())
        }
    } else {
        Ok(())
    }
}
