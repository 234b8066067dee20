use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::triage::policy::DEFAULT_REJECTION_TEMPLATE;

/// SMTP relay settings. Present only when `SMTP_SERVER` is set.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub user: String,
    pub pass: String,
    pub from_email: String,
    pub service_name: String,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub max_concurrent_analyses: usize,
    pub max_concurrent_dispatches: usize,
    pub dispatch_timeout: Duration,
    pub run_timeout: Duration,
    pub max_upload_bytes: usize,
    pub rejection_reason_template: String,
    pub enable_llm_salary_estimation: bool,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let smtp = match std::env::var("SMTP_SERVER") {
            Ok(server) if !server.trim().is_empty() => Some(SmtpConfig {
                server,
                user: require_env("SMTP_USER")?,
                pass: require_env("SMTP_PASS")?,
                from_email: require_env("FROM_EMAIL")?,
                service_name: std::env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "ResumeRank AI".to_string()),
            }),
            _ => None,
        };

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            max_concurrent_analyses: positive(parse_env("MAX_CONCURRENT_ANALYSES", 4)?)
                .context("MAX_CONCURRENT_ANALYSES must be at least 1")?,
            max_concurrent_dispatches: positive(parse_env("MAX_CONCURRENT_DISPATCHES", 8)?)
                .context("MAX_CONCURRENT_DISPATCHES must be at least 1")?,
            dispatch_timeout: positive(parse_env("DISPATCH_TIMEOUT_SECS", 30)?)
                .map(Duration::from_secs)
                .context("DISPATCH_TIMEOUT_SECS must be at least 1")?,
            run_timeout: positive(parse_env("RUN_TIMEOUT_SECS", 300)?)
                .map(Duration::from_secs)
                .context("RUN_TIMEOUT_SECS must be at least 1")?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 25 * 1024 * 1024)?,
            rejection_reason_template: std::env::var("REJECTION_REASON_TEMPLATE")
                .unwrap_or_else(|_| DEFAULT_REJECTION_TEMPLATE.to_string()),
            enable_llm_salary_estimation: parse_env("ENABLE_LLM_SALARY_ESTIMATION", false)?,
            smtp,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn positive<T: PartialOrd + Default>(value: T) -> Option<T> {
    (value > T::default()).then_some(value)
}
