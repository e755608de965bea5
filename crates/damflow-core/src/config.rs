//! Configuration module
//!
//! Settings are read from the environment (a `.env` file is loaded first when present)
//! and grouped by the component that consumes them.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{DEFAULT_JOB_ATTEMPTS, DEFAULT_JOB_BACKOFF_MS};
use crate::storage_types::StorageTier;

const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_UPLOAD_SIZE_MB: u64 = 500;
const JOB_QUEUE_MAX_WORKERS: usize = 4;
const JOB_QUEUE_POLL_INTERVAL_MS: u64 = 1000;
const STALE_JOB_REAP_INTERVAL_SECS: u64 = 60;
const STALE_JOB_GRACE_PERIOD_SECS: i64 = 3600;
const EXTERNAL_TOOL_TIMEOUT_SECS: u64 = 120;

/// Server and database settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// `json` switches log output to JSON lines
    pub log_format: String,
}

#[derive(Clone, Debug)]
pub struct StorageSettings {
    pub root: PathBuf,
    pub default_tier: StorageTier,
    pub max_upload_size_bytes: u64,
}

#[derive(Clone, Debug)]
pub struct JobQueueSettings {
    pub max_workers: usize,
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
    pub backoff_delay_ms: u64,
    /// Interval between stale job reaper runs. 0 disables the reaper.
    pub stale_reap_interval_secs: u64,
    /// Active jobs started longer ago than this are assumed orphaned.
    pub stale_grace_period_secs: i64,
    /// Finished jobs older than this many days are purged. 0 keeps them forever.
    pub retention_days: i32,
}

/// Paths of the external preview tools and their shared timeout.
#[derive(Clone, Debug)]
pub struct ToolSettings {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub pdftoppm_path: String,
    pub soffice_path: String,
    pub timeout_secs: u64,
}

impl ToolSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            pdftoppm_path: "pdftoppm".to_string(),
            soffice_path: "soffice".to_string(),
            timeout_secs: EXTERNAL_TOOL_TIMEOUT_SECS,
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub base: BaseConfig,
    pub storage: StorageSettings,
    pub queue: JobQueueSettings,
    pub tools: ToolSettings,
}

/// Reads `key`, falling back to `default` when unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase(),
        };

        let default_tier = match env::var("DEFAULT_STORAGE_TIER") {
            Ok(value) => value
                .parse()
                .map_err(|_| anyhow::anyhow!("DEFAULT_STORAGE_TIER must be DAM_STORAGE1 or DAM_STORAGE2"))?,
            Err(_) => StorageTier::default(),
        };

        let storage = StorageSettings {
            root: match env::var("STORAGE_ROOT") {
                Ok(root) => PathBuf::from(root),
                Err(_) => env::current_dir()?,
            },
            default_tier,
            max_upload_size_bytes: env_or("MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB) * 1024 * 1024,
        };

        let queue = JobQueueSettings {
            max_workers: env_or("JOB_QUEUE_MAX_WORKERS", JOB_QUEUE_MAX_WORKERS),
            poll_interval_ms: env_or("JOB_QUEUE_POLL_INTERVAL_MS", JOB_QUEUE_POLL_INTERVAL_MS),
            max_attempts: env_or("JOB_MAX_ATTEMPTS", DEFAULT_JOB_ATTEMPTS),
            backoff_delay_ms: env_or("JOB_BACKOFF_DELAY_MS", DEFAULT_JOB_BACKOFF_MS),
            stale_reap_interval_secs: env_or(
                "JOB_STALE_REAP_INTERVAL_SECS",
                STALE_JOB_REAP_INTERVAL_SECS,
            ),
            stale_grace_period_secs: env_or(
                "JOB_STALE_GRACE_PERIOD_SECS",
                STALE_JOB_GRACE_PERIOD_SECS,
            ),
            retention_days: env_or("JOB_RETENTION_DAYS", 0),
        };

        let defaults = ToolSettings::default();
        let tools = ToolSettings {
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or(defaults.ffprobe_path),
            pdftoppm_path: env::var("PDFTOPPM_PATH").unwrap_or(defaults.pdftoppm_path),
            soffice_path: env::var("SOFFICE_PATH").unwrap_or(defaults.soffice_path),
            timeout_secs: env_or("EXTERNAL_TOOL_TIMEOUT_SECS", defaults.timeout_secs),
        };

        let config = Config {
            base,
            storage,
            queue,
            tools,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        matches!(
            self.base.environment.to_lowercase().as_str(),
            "production" | "prod"
        )
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.base.database_url.starts_with("postgres://")
            && !self.base.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.queue.max_workers == 0 {
            return Err(anyhow::anyhow!("JOB_QUEUE_MAX_WORKERS must be at least 1"));
        }

        if self.queue.max_attempts == 0 {
            return Err(anyhow::anyhow!("JOB_MAX_ATTEMPTS must be at least 1"));
        }

        if self.tools.timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "EXTERNAL_TOOL_TIMEOUT_SECS must be greater than zero"
            ));
        }

        if self.storage.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than zero"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            base: BaseConfig {
                server_port: 3000,
                environment: "development".to_string(),
                database_url: "postgresql://localhost/damflow".to_string(),
                db_max_connections: 10,
                db_timeout_seconds: 30,
                log_format: "pretty".to_string(),
            },
            storage: StorageSettings {
                root: PathBuf::from("/tmp/damflow"),
                default_tier: StorageTier::Storage1,
                max_upload_size_bytes: 1024,
            },
            queue: JobQueueSettings {
                max_workers: 4,
                poll_interval_ms: 1000,
                max_attempts: 3,
                backoff_delay_ms: 5000,
                stale_reap_interval_secs: 60,
                stale_grace_period_secs: 3600,
                retention_days: 0,
            },
            tools: ToolSettings::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_postgres_url() {
        let mut cfg = config();
        cfg.base.database_url = "mysql://localhost/db".to_string();
        assert!(cfg.validate().is_err());

        cfg.base.database_url = "postgres://localhost/db".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_workers_and_timeout() {
        let mut cfg = config();
        cfg.queue.max_workers = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.tools.timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_is_production() {
        let mut cfg = config();
        assert!(!cfg.is_production());
        cfg.base.environment = "Prod".to_string();
        assert!(cfg.is_production());
    }

    #[test]
    fn test_tool_defaults() {
        let tools = ToolSettings::default();
        assert_eq!(tools.ffmpeg_path, "ffmpeg");
        assert_eq!(tools.timeout(), Duration::from_secs(120));
    }
}
