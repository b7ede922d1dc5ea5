use crate::services::catalog::DEFAULT_UPLOAD_FOLDER;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{
    env,
    fmt::{Debug, Display},
    str::FromStr,
    time::Duration,
};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// SQLite URL for the media table. `None` serves the built-in records.
    pub database_url: Option<String>,
    /// Folder name uploads are filed under on the storage accounts.
    pub upload_folder: String,
    pub upload_latency_ms: u64,
    pub delete_latency_ms: u64,
    pub upload_success_rate: f64,
    pub delete_success_rate: f64,
    pub transfer_timeout_secs: u64,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Wedding media catalog API")]
pub struct Args {
    /// Host to bind to (overrides WEDDING_MEDIA_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides WEDDING_MEDIA_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// SQLite URL for media records (overrides WEDDING_MEDIA_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Folder uploads are stored under (overrides WEDDING_MEDIA_UPLOAD_FOLDER)
    #[arg(long)]
    pub upload_folder: Option<String>,

    /// Probability in [0, 1] that a simulated upload succeeds
    #[arg(long)]
    pub upload_success_rate: Option<f64>,

    /// Probability in [0, 1] that a simulated delete succeeds
    #[arg(long)]
    pub delete_success_rate: Option<f64>,

    /// Create the media_items table and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |key| env::var(key).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI arguments over values found through `lookup`.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Environment fallback ---
        let env_host = lookup("WEDDING_MEDIA_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_var(&lookup, "WEDDING_MEDIA_PORT", 3000u16)?;
        let env_db = lookup("WEDDING_MEDIA_DATABASE_URL");
        let env_folder =
            lookup("WEDDING_MEDIA_UPLOAD_FOLDER").unwrap_or_else(|| DEFAULT_UPLOAD_FOLDER.into());
        let upload_latency_ms = parse_var(&lookup, "WEDDING_MEDIA_UPLOAD_LATENCY_MS", 1000u64)?;
        let delete_latency_ms = parse_var(&lookup, "WEDDING_MEDIA_DELETE_LATENCY_MS", 500u64)?;
        let env_upload_rate = parse_var(&lookup, "WEDDING_MEDIA_UPLOAD_SUCCESS_RATE", 0.9f64)?;
        let env_delete_rate = parse_var(&lookup, "WEDDING_MEDIA_DELETE_SUCCESS_RATE", 0.95f64)?;
        let transfer_timeout_secs =
            parse_var(&lookup, "WEDDING_MEDIA_TRANSFER_TIMEOUT_SECS", 30u64)?;
        let max_upload_bytes =
            parse_var(&lookup, "WEDDING_MEDIA_MAX_UPLOAD_BYTES", 256 * 1024 * 1024usize)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args
                .database_url
                .or(env_db)
                .filter(|url| !url.trim().is_empty()),
            upload_folder: args.upload_folder.unwrap_or(env_folder),
            upload_latency_ms,
            delete_latency_ms,
            upload_success_rate: args.upload_success_rate.unwrap_or(env_upload_rate),
            delete_success_rate: args.delete_success_rate.unwrap_or(env_delete_rate),
            transfer_timeout_secs,
            max_upload_bytes,
        };

        for (name, rate) in [
            ("upload success rate", cfg.upload_success_rate),
            ("delete success rate", cfg.delete_success_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                bail!("{} must be between 0 and 1, got {}", name, rate);
            }
        }

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn upload_latency(&self) -> Duration {
        Duration::from_millis(self.upload_latency_ms)
    }

    pub fn delete_latency(&self) -> Duration {
        Duration::from_millis(self.delete_latency_ms)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Debug + Display + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        None => Ok(default),
    }
}
