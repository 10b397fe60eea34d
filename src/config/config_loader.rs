use std::{fmt::Display, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow, bail};

use super::config_model::{Database, DotEnvyConfig, RecordingIngestion, WorkerServer};
use crate::{
    application::{
        reliability::{
            circuit_breaker::{CircuitBreakerConfig, DEFAULT_COOLDOWN, DEFAULT_FAILURE_THRESHOLD},
            retry_policy::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, RetryPolicy},
        },
        usercases::{
            recording_download::{
                DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_MAX_RECORDING_SIZE_BYTES, DownloadConfig,
            },
            recording_ingestion::{
                DEFAULT_MAX_CONCURRENT_RUNS, DEFAULT_QUEUE_CAPACITY, SchedulerConfig,
            },
        },
    },
    infrastructure::{
        http::recording_source::BasicCredentials,
        storages::s3_recording_storage::RecordingStorageConfig,
    },
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

/// Builds the config from `lookup` instead of the process environment.
pub fn load_from<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env { lookup };

    let worker_server = WorkerServer {
        port: env.parse_or("SERVER_PORT_WORKER", 8081)?,
        body_limit: env.positive_or("SERVER_BODY_LIMIT", 1)?,
        timeout: env.positive_or("SERVER_TIMEOUT", 30)?,
    };

    let database = Database {
        url: env.required("DATABASE_URL")?,
    };

    let download = DownloadConfig {
        attempt_timeout: Duration::from_millis(env.positive_or(
            "RECORDING_DOWNLOAD_TIMEOUT_MS",
            DEFAULT_ATTEMPT_TIMEOUT.as_millis() as u64,
        )?),
        max_size_bytes: env.positive_or(
            "RECORDING_MAX_SIZE_BYTES",
            DEFAULT_MAX_RECORDING_SIZE_BYTES,
        )?,
    };

    let retry_policy = RetryPolicy::new(
        env.positive_or("RECORDING_DOWNLOAD_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
        Duration::from_millis(env.parse_or(
            "RECORDING_DOWNLOAD_BACKOFF_BASE_MS",
            DEFAULT_BASE_DELAY.as_millis() as u64,
        )?),
    );

    let source_credentials = match (
        env.optional("RECORDING_SOURCE_USERNAME"),
        env.optional("RECORDING_SOURCE_PASSWORD"),
    ) {
        (Some(username), Some(password)) => Some(BasicCredentials { username, password }),
        (None, None) => None,
        (Some(_), None) => bail!("RECORDING_SOURCE_PASSWORD is invalid: required with RECORDING_SOURCE_USERNAME"),
        (None, Some(_)) => bail!("RECORDING_SOURCE_USERNAME is invalid: required with RECORDING_SOURCE_PASSWORD"),
    };

    let storage_breaker = CircuitBreakerConfig {
        failure_threshold: env.positive_or(
            "STORAGE_BREAKER_FAILURE_THRESHOLD",
            DEFAULT_FAILURE_THRESHOLD,
        )?,
        cooldown: Duration::from_millis(env.positive_or(
            "STORAGE_BREAKER_COOLDOWN_MS",
            DEFAULT_COOLDOWN.as_millis() as u64,
        )?),
    };

    let scheduler = SchedulerConfig {
        max_concurrent_runs: env
            .positive_or("INGESTION_MAX_CONCURRENT_RUNS", DEFAULT_MAX_CONCURRENT_RUNS)?,
        queue_capacity: env.positive_or("INGESTION_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?,
    };

    let recording_storage = RecordingStorageConfig {
        endpoint: env.required("RECORDING_STORAGE_S3_ENDPOINT")?,
        region: env.required("RECORDING_STORAGE_S3_REGION")?,
        bucket: env.required("RECORDING_STORAGE_S3_BUCKET")?,
        access_key_id: env.required("RECORDING_STORAGE_S3_ACCESS_KEY_ID")?,
        secret_access_key: env.required("RECORDING_STORAGE_S3_SECRET_ACCESS_KEY")?,
        key_prefix: env
            .optional("RECORDING_STORAGE_S3_KEY_PREFIX")
            .unwrap_or_else(|| "recordings".to_string()),
    };

    Ok(DotEnvyConfig {
        worker_server,
        database,
        recording_ingestion: RecordingIngestion {
            download,
            retry_policy,
            source_credentials,
            storage_breaker,
            scheduler,
        },
        recording_storage,
    })
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set and non-blank, trimmed.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key).ok_or_else(|| anyhow!("{key} is invalid"))
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .parse::<T>()
                .map_err(|err| anyhow!("{err}"))
                .with_context(|| format!("{key} is invalid")),
            None => Ok(default),
        }
    }

    fn positive_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr + Default + PartialEq,
        T::Err: Display,
    {
        let value = self.parse_or(key, default)?;
        if value == T::default() {
            bail!("{key} is invalid: must be greater than zero");
        }
        Ok(value)
    }
}
