//! Application configuration loaded from environment variables.

use crate::error::{AppError, Result};
use std::env;
use std::time::Duration;

/// Thresholds that drive the review pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewPolicy {
    /// Length of the community review window in days
    pub review_window_days: i64,
    /// Minimum number of votes for a valid community decision
    pub min_votes: i64,
    /// Fraction of approvals needed to advance to expert review
    pub approve_ratio: f64,
    /// Number of distinct flags that freezes an artifact
    pub flag_threshold: i64,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            review_window_days: 7,
            min_votes: 3,
            approve_ratio: 0.6,
            flag_threshold: 3,
        }
    }
}

impl ReviewPolicy {
    pub fn review_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.review_window_days)
    }

    fn validate(&self) -> Result<()> {
        if self.review_window_days <= 0 {
            return Err(AppError::Config("REVIEW_WINDOW_DAYS must be positive".into()));
        }
        if self.min_votes <= 0 {
            return Err(AppError::Config("MIN_VOTES must be positive".into()));
        }
        if !(self.approve_ratio > 0.0 && self.approve_ratio <= 1.0) {
            return Err(AppError::Config("APPROVE_RATIO must be in (0, 1]".into()));
        }
        if self.flag_threshold <= 0 {
            return Err(AppError::Config("FLAG_THRESHOLD must be positive".into()));
        }
        Ok(())
    }
}

/// Pinata content store settings (present only when `PINATA_JWT` is set).
#[derive(Clone)]
pub struct PinataConfig {
    pub jwt: String,
    pub api_url: String,
    /// Dedicated gateway host, e.g. `example.mypinata.cloud`
    pub gateway: Option<String>,
}

redacted_debug!(PinataConfig {
    redact jwt,
    show api_url,
    show gateway,
});

/// Ledger node JSON-RPC settings (present only when `LEDGER_RPC_URL` is set).
#[derive(Clone)]
pub struct LedgerConfig {
    pub rpc_url: String,
    pub rpc_user: Option<String>,
    pub rpc_password: Option<String>,
    /// Network label recorded in ANCHORED events
    pub network: String,
    pub inclusion_timeout_secs: u64,
    pub poll_interval_secs: u64,
}

redacted_debug!(LedgerConfig {
    show rpc_url,
    show rpc_user,
    redact_option rpc_password,
    show network,
    show inclusion_timeout_secs,
    show poll_interval_secs,
});

impl LedgerConfig {
    pub fn inclusion_timeout(&self) -> Duration {
        Duration::from_secs(self.inclusion_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// Database connection URL (required for the postgres store)
    pub database_url: Option<String>,

    /// Store backend: "postgres" or "memory"
    pub store_backend: String,

    /// Server bind address (host:port)
    pub bind_address: String,

    /// Log level used when RUST_LOG is not set
    pub log_level: String,

    /// Log output format: "text" or "json"
    pub log_format: String,

    /// Review thresholds
    pub review: ReviewPolicy,

    /// Interval between review-window sweeps
    pub sweep_interval_secs: u64,

    /// Upper bound for each post-approval publication step
    pub external_timeout_secs: u64,

    /// Public identity of the reserved system user
    pub system_identity: String,

    pub pinata: Option<PinataConfig>,

    pub ledger: Option<LedgerConfig>,
}

redacted_debug!(Config {
    redact_option database_url,
    show store_backend,
    show bind_address,
    show log_level,
    show log_format,
    show review,
    show sweep_interval_secs,
    show external_timeout_secs,
    show system_identity,
    show pinata,
    show ledger,
});

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ReviewPolicy::default();
        let review = ReviewPolicy {
            review_window_days: parse_or(lookup("REVIEW_WINDOW_DAYS"), defaults.review_window_days),
            min_votes: parse_or(lookup("MIN_VOTES"), defaults.min_votes),
            approve_ratio: parse_or(lookup("APPROVE_RATIO"), defaults.approve_ratio),
            flag_threshold: parse_or(lookup("FLAG_THRESHOLD"), defaults.flag_threshold),
        };
        review.validate()?;

        let store_backend = lookup("STORE_BACKEND")
            .unwrap_or_else(|| "postgres".into())
            .to_ascii_lowercase();
        let database_url = non_empty(lookup("DATABASE_URL"));
        match store_backend.as_str() {
            "postgres" if database_url.is_none() => {
                return Err(AppError::Config("DATABASE_URL not set".into()));
            }
            "postgres" | "memory" => {}
            other => {
                return Err(AppError::Config(format!(
                    "Invalid STORE_BACKEND '{}'. Must be one of: postgres, memory",
                    other
                )));
            }
        }

        let pinata = non_empty(lookup("PINATA_JWT")).map(|jwt| PinataConfig {
            jwt,
            api_url: lookup("PINATA_API_URL").unwrap_or_else(|| "https://api.pinata.cloud".into()),
            gateway: non_empty(lookup("PINATA_GATEWAY")),
        });

        let ledger = non_empty(lookup("LEDGER_RPC_URL")).map(|rpc_url| LedgerConfig {
            rpc_url,
            rpc_user: non_empty(lookup("LEDGER_RPC_USER")),
            rpc_password: non_empty(lookup("LEDGER_RPC_PASSWORD")),
            network: lookup("LEDGER_NETWORK").unwrap_or_else(|| "testnet".into()),
            inclusion_timeout_secs: parse_or(lookup("LEDGER_INCLUSION_TIMEOUT_SECS"), 120),
            poll_interval_secs: parse_or(lookup("LEDGER_POLL_INTERVAL_SECS"), 5),
        });

        Ok(Self {
            database_url,
            store_backend,
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".into()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_format: lookup("LOG_FORMAT").unwrap_or_else(|| "text".into()),
            review,
            sweep_interval_secs: parse_or(lookup("SWEEP_INTERVAL_SECS"), 300),
            external_timeout_secs: parse_or(lookup("EXTERNAL_TIMEOUT_SECS"), 60),
            system_identity: lookup("SYSTEM_IDENTITY").unwrap_or_else(|| "SYSTEM".into()),
            pinata,
            ledger,
        })
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn external_timeout(&self) -> Duration {
        Duration::from_secs(self.external_timeout_secs.max(1))
    }
}
