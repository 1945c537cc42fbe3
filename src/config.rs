use std::time::Duration;

// ============================================================================
// Application Configuration
// ============================================================================
//
// Read once at startup from environment variables. Optional integrations
// (database, notification relay) fall back to in-process implementations
// when their variable is unset.
//
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
    pub timeout: Duration,
    pub queue_capacity: usize,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// `None` runs against the in-memory repository.
    pub database: Option<DatabaseConfig>,
    pub http_bind: String,
    pub notifications: NotificationConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database = match get("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_number(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
                acquire_timeout: Duration::from_secs(parse_number(
                    &get,
                    "DATABASE_ACQUIRE_TIMEOUT_SECS",
                    5,
                )?),
            }),
            None => None,
        };

        Ok(Self {
            database,
            http_bind: get("HTTP_BIND").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            notifications: NotificationConfig {
                webhook_url: get("NOTIFICATION_WEBHOOK_URL"),
                timeout: Duration::from_millis(parse_number(&get, "NOTIFICATION_TIMEOUT_MS", 3000)?),
                queue_capacity: parse_number(&get, "NOTIFICATION_QUEUE_CAPACITY", 256)?,
                max_attempts: parse_number(&get, "NOTIFICATION_MAX_ATTEMPTS", 3)?,
            },
        })
    }
}

fn parse_number<T, F>(get: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
    F: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value > T::default() => Ok(value),
            _ => Err(ConfigError::InvalidNumber { name, value: raw }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.database, None);
        assert_eq!(config.http_bind, "0.0.0.0:8080");
        assert_eq!(config.notifications.webhook_url, None);
        assert_eq!(config.notifications.timeout, Duration::from_millis(3000));
        assert_eq!(config.notifications.queue_capacity, 256);
        assert_eq!(config.notifications.max_attempts, 3);
    }

    #[test]
    fn test_database_settings() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/laundry"),
            ("DATABASE_MAX_CONNECTIONS", "25"),
        ])
        .unwrap();

        let database = config.database.unwrap();
        assert_eq!(database.url, "postgres://localhost/laundry");
        assert_eq!(database.max_connections, 25);
        assert_eq!(database.acquire_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let config = config_from(&[("DATABASE_URL", "  "), ("NOTIFICATION_WEBHOOK_URL", "")]).unwrap();
        assert_eq!(config.database, None);
        assert_eq!(config.notifications.webhook_url, None);
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let err = config_from(&[("NOTIFICATION_TIMEOUT_MS", "soon")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                name: "NOTIFICATION_TIMEOUT_MS",
                value: "soon".to_string()
            }
        );

        assert!(config_from(&[("NOTIFICATION_QUEUE_CAPACITY", "0")]).is_err());
    }
}
