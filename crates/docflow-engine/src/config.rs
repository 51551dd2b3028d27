//! Engine configuration.
//!
//! Loaded from environment variables; every variable except `DATABASE_URL`
//! has a default. A variable that is set but does not parse is an error
//! rather than a silent fallback.

use std::time::Duration;

use docflow_store::PgStoreOptions;

use crate::service::ServicePolicy;

/// Runtime configuration for the engine and its Postgres pool.
#[derive(Clone, PartialEq, Eq)]
pub struct DocflowConfig {
    /// Postgres URL, if set.
    pub database_url: Option<String>,
    /// Pool size.
    pub max_connections: u32,
    /// Idle pool floor.
    pub min_connections: u32,
    /// Pool acquire timeout.
    pub acquire_timeout: Duration,
    /// Deadline for one create/update transaction, retries included.
    pub operation_timeout: Duration,
    /// Attempts per operation on transient contention.
    pub max_attempts: u32,
}

impl std::fmt::Debug for DocflowConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocflowConfig")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("operation_timeout", &self.operation_timeout)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl Default for DocflowConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 20,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_millis(10_000),
            max_attempts: 3,
        }
    }
}

impl DocflowConfig {
    /// Load configuration from the process environment.
    ///
    /// Variables:
    /// - `DATABASE_URL` (no default)
    /// - `DOCFLOW_DB_MAX_CONNECTIONS` (default: 20)
    /// - `DOCFLOW_DB_MIN_CONNECTIONS` (default: 2)
    /// - `DOCFLOW_DB_ACQUIRE_TIMEOUT_SECS` (default: 5)
    /// - `DOCFLOW_OPERATION_TIMEOUT_MS` (default: 10000)
    /// - `DOCFLOW_MAX_ATTEMPTS` (default: 3, minimum 1)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let max_connections = parse_var(&lookup, "DOCFLOW_DB_MAX_CONNECTIONS")?
            .unwrap_or(defaults.max_connections);
        let min_connections = parse_var(&lookup, "DOCFLOW_DB_MIN_CONNECTIONS")?
            .unwrap_or(defaults.min_connections);
        if min_connections > max_connections {
            return Err(ConfigError::Invalid {
                var: "DOCFLOW_DB_MIN_CONNECTIONS",
                value: min_connections.to_string(),
                reason: format!("exceeds DOCFLOW_DB_MAX_CONNECTIONS ({max_connections})"),
            });
        }

        let acquire_timeout = parse_var::<u64>(&lookup, "DOCFLOW_DB_ACQUIRE_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.acquire_timeout);
        let operation_timeout = parse_var::<u64>(&lookup, "DOCFLOW_OPERATION_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.operation_timeout);

        let max_attempts =
            parse_var::<u32>(&lookup, "DOCFLOW_MAX_ATTEMPTS")?.unwrap_or(defaults.max_attempts);
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "DOCFLOW_MAX_ATTEMPTS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_url,
            max_connections,
            min_connections,
            acquire_timeout,
            operation_timeout,
            max_attempts,
        })
    }

    /// Pool options for `url`, using this configuration's pool settings.
    pub fn pg_options(&self, url: impl Into<String>) -> PgStoreOptions {
        PgStoreOptions {
            url: url.into(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            acquire_timeout: self.acquire_timeout,
        }
    }

    /// Retry and deadline policy for [`crate::DocumentService`].
    pub fn policy(&self) -> ServicePolicy {
        ServicePolicy {
            operation_timeout: self.operation_timeout,
            max_attempts: self.max_attempts,
        }
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                var,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}
