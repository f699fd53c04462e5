//! Tracing Setup and Span Helpers
//!
//! Installs a `tracing-subscriber` formatter with environment-based
//! filtering. `RUST_LOG` wins over the filter passed in.

use crate::config::{LogFormat, StoreConfig};
use tracing_subscriber::EnvFilter;

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Human-readable logs. Safe to call more than once; later calls return an
/// error and leave the first subscriber in place.
pub fn init_tracing(default_filter: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_target(false)
        .try_init()
        .map_err(|e| e.to_string().into())
}

/// One JSON object per event, for log shippers.
pub fn init_json_tracing(default_filter: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(default_filter))
        .with_current_span(true)
        .try_init()
        .map_err(|e| e.to_string().into())
}

/// Installs the subscriber `config` asks for.
pub fn init_from_config(config: &StoreConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match config.log_format {
        LogFormat::Text => init_tracing(&config.log_filter),
        LogFormat::Json => init_json_tracing(&config.log_filter),
    }
}

pub mod spans {
    use tracing::{span, Level, Span};

    /// Span for one client connection served by the memory server.
    #[inline]
    pub fn connection_span(client_addr: &str) -> Span {
        span!(
            Level::INFO,
            "redis.connection",
            client.address = %client_addr,
            otel.kind = "server"
        )
    }

    /// Span for one command sent or served.
    #[inline]
    pub fn command_span(command: &str, key: Option<&str>) -> Span {
        match key {
            Some(k) => span!(
                Level::DEBUG,
                "redis.command",
                db.operation = %command,
                db.redis.key = %k,
                otel.kind = "client"
            ),
            None => span!(
                Level::DEBUG,
                "redis.command",
                db.operation = %command,
                otel.kind = "client"
            ),
        }
    }

    /// Span for a transaction or batch round trip.
    #[inline]
    pub fn transaction_span(kind: &'static str, commands: usize, conditions: usize) -> Span {
        span!(
            Level::DEBUG,
            "redis.transaction",
            redis.kind = kind,
            redis.commands = commands,
            redis.conditions = conditions,
            otel.kind = "client"
        )
    }
}
