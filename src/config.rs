use anyhow::{Context, Result};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

impl Config {
    /// Read settings from the environment, loading `.env` first when present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw_addr = lookup("CREDIT_PLANS_LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string());
        let listen_addr: SocketAddr = raw_addr
            .parse()
            .with_context(|| format!("Invalid CREDIT_PLANS_LISTEN_ADDR: {}", raw_addr))?;
        let db_path = lookup("CREDIT_PLANS_DB_PATH").unwrap_or_else(|| "./credit_plans.db".into());
        let timeout_ms: u64 = lookup("CREDIT_PLANS_REQUEST_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(30_000);
        let log_format = match lookup("CREDIT_PLANS_LOG_FORMAT") {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            listen_addr,
            db_path,
            request_timeout: Duration::from_millis(timeout_ms),
            log_format,
        })
    }
}
