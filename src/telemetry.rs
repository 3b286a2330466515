//! Tracing setup.
//!
//! Logs go to stderr. `RUST_LOG` overrides the default directive, and
//! `LOG_FORMAT=json` switches to structured JSON lines.

use thiserror::Error;
use tracing_subscriber::filter::{Directive, ParseError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("invalid log directive '{directive}': {message}")]
    InvalidDirective { directive: String, message: String },

    #[error("tracing subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

fn json_requested() -> bool {
    std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Install the global subscriber.
///
/// `default_directive` applies on top of `RUST_LOG`, e.g. `"schemascope=info"`.
///
/// # Example
///
/// ```rust,ignore
/// schemascope::telemetry::init_tracing("schemascope=debug")?;
/// ```
pub fn init_tracing(default_directive: &str) -> Result<(), TelemetryError> {
    let directive: Directive = default_directive
        .parse()
        .map_err(|err: ParseError| TelemetryError::InvalidDirective {
            directive: default_directive.to_string(),
            message: err.to_string(),
        })?;
    let filter = EnvFilter::from_default_env().add_directive(directive);

    let registry = tracing_subscriber::registry().with(filter);

    let result = if json_requested() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()
    };

    result.map_err(|err| TelemetryError::AlreadyInstalled(err.to_string()))
}
