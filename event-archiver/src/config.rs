//! Archiver configuration, read once from environment variables

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};
use chrono_tz::Tz;

use crate::error::ConfigError;
use crate::publisher::target_path;
use crate::source::RetryPolicy;

const SECS_PER_DAY: u64 = 24 * 60 * 60;
const SECS_PER_HOUR: u64 = 60 * 60;

/// Secret that selects the archive encryption scheme
#[derive(Clone, PartialEq, Eq)]
pub enum EncryptionSecret {
    /// `FILE_ENCRYPTION_PASSWORD`: AES-256-CBC archives
    Passphrase(String),
    /// `ARCHIVE_PUBLIC_KEY_PATH`: chunked RSA archives
    PublicKeyFile(PathBuf),
}

impl fmt::Debug for EncryptionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionSecret::Passphrase(_) => f.write_str("Passphrase(..)"),
            EncryptionSecret::PublicKeyFile(path) => {
                f.debug_tuple("PublicKeyFile").field(path).finish()
            }
        }
    }
}

/// Object storage settings
#[derive(Clone)]
pub struct S3Config {
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Always `https://...`
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    /// strftime template applied to the archived day, e.g. `backups/%Y/%m`
    pub path_template: Option<String>,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("path_template", &self.path_template)
            .finish_non_exhaustive()
    }
}

/// Archiver configuration
#[derive(Clone)]
pub struct Config {
    /// Event source secret key (basic-auth user)
    pub stripe_api_key: String,
    pub stripe_api_base: String,
    pub redis_host: String,
    pub redis_port: u16,
    /// TTL of state entries
    pub retention: Duration,
    pub s3: S3Config,
    pub encryption: EncryptionSecret,
    /// Zone in which day-keys and "today" are computed
    pub timezone: Tz,
    /// Pause between passes
    pub interval: Duration,
    pub retry: RetryPolicy,
    /// Run a single pass and exit
    pub run_once: bool,
    /// Directory for daily rolling log files
    pub log_dir: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("stripe_api_base", &self.stripe_api_base)
            .field("redis_host", &self.redis_host)
            .field("redis_port", &self.redis_port)
            .field("retention", &self.retention)
            .field("s3", &self.s3)
            .field("encryption", &self.encryption)
            .field("timezone", &self.timezone)
            .field("interval", &self.interval)
            .field("retry", &self.retry)
            .field("run_once", &self.run_once)
            .field("log_dir", &self.log_dir)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any name → value lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut missing = Vec::new();
        let mut required = |name: &str| {
            get(name).unwrap_or_else(|| {
                missing.push(name.to_string());
                String::new()
            })
        };
        let stripe_api_key = required("STRIPE_API_KEY");
        let access_key_id = required("AWS_ACCESS_KEY_ID");
        let secret_access_key = required("AWS_SECRET_ACCESS_KEY");
        let endpoint = required("S3_ENDPOINT");
        let bucket = required("S3_BUCKET");

        let passphrase = get("FILE_ENCRYPTION_PASSWORD");
        let public_key = get("ARCHIVE_PUBLIC_KEY_PATH");
        if passphrase.is_none() && public_key.is_none() {
            missing.push("FILE_ENCRYPTION_PASSWORD or ARCHIVE_PUBLIC_KEY_PATH".to_string());
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let encryption = match (passphrase, public_key) {
            (Some(passphrase), None) => EncryptionSecret::Passphrase(passphrase),
            (None, Some(path)) => EncryptionSecret::PublicKeyFile(PathBuf::from(path)),
            _ => {
                return Err(ConfigError::invalid(
                    "ARCHIVE_PUBLIC_KEY_PATH",
                    "set either FILE_ENCRYPTION_PASSWORD or ARCHIVE_PUBLIC_KEY_PATH, not both",
                ));
            }
        };

        let path_template = get("S3_PATH");
        if let Some(template) = &path_template {
            validate_template(template)?;
        }

        let retention_days: u64 = parse_or(&get, "REDIS_RETENTION_DAYS", 30)?;
        if retention_days == 0 {
            return Err(ConfigError::invalid("REDIS_RETENTION_DAYS", "must be at least 1"));
        }
        let interval_hours: u64 = parse_or(&get, "ARCHIVE_INTERVAL_HOURS", 24)?;
        if interval_hours == 0 {
            return Err(ConfigError::invalid("ARCHIVE_INTERVAL_HOURS", "must be at least 1"));
        }

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_retries: parse_or(&get, "SOURCE_MAX_RETRIES", defaults.max_retries)?,
            base_delay: Duration::from_millis(parse_or(
                &get,
                "SOURCE_BACKOFF_MS",
                defaults.base_delay.as_millis() as u64,
            )?),
            max_delay: defaults.max_delay,
        };

        Ok(Self {
            stripe_api_key,
            stripe_api_base: get("STRIPE_API_BASE")
                .unwrap_or_else(|| "https://api.stripe.com".into()),
            redis_host: get("REDIS_HOST").unwrap_or_else(|| "redis".into()),
            redis_port: parse_or(&get, "REDIS_PORT", 6379)?,
            retention: Duration::from_secs(retention_days * SECS_PER_DAY),
            s3: S3Config {
                access_key_id,
                secret_access_key,
                endpoint: https_endpoint(&endpoint)?,
                bucket,
                region: get("S3_REGION").unwrap_or_else(|| "us-east-1".into()),
                path_template,
            },
            encryption,
            timezone: parse_or(&get, "ARCHIVE_TIMEZONE", Tz::UTC)?,
            interval: Duration::from_secs(interval_hours * SECS_PER_HOUR),
            retry,
            run_once: parse_or(&get, "ARCHIVE_RUN_ONCE", false)?,
            log_dir: get("ARCHIVE_LOG_DIR"),
        })
    }
}

fn parse_or<T, G>(get: &G, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(name, e.to_string())),
        None => Ok(default),
    }
}

/// Object storage must be reached over TLS; a bare host gets `https://`.
fn https_endpoint(endpoint: &str) -> Result<String, ConfigError> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.starts_with("https://") {
        Ok(endpoint.to_string())
    } else if endpoint.contains("://") {
        Err(ConfigError::invalid(
            "S3_ENDPOINT",
            "TLS is required; use an https:// endpoint",
        ))
    } else {
        Ok(format!("https://{endpoint}"))
    }
}

/// Reject templates chrono cannot parse, or cannot render for a plain date.
fn validate_template(template: &str) -> Result<(), ConfigError> {
    let parses = !StrftimeItems::new(template).any(|item| matches!(item, Item::Error));
    if !parses || target_path(Some(template), NaiveDate::default(), "").is_err() {
        return Err(ConfigError::invalid(
            "S3_PATH",
            format!("'{template}' is not a valid strftime template for a date"),
        ));
    }
    Ok(())
}
