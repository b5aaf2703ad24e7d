use crate::{
    errors::ConfigError,
    services::{key_builder::Granularity, s3_store::MAX_PAGE_SIZE},
};
use clap::Parser;
use std::{env, path::PathBuf};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bucket: String,
    pub granularity: Granularity,
    pub data_dir: PathBuf,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub page_size: i32,
}

/// What the process should do once configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Create the cache schema and exit.
    Migrate,
    /// Mirror the bucket listing into the cache only.
    ReconcileOnly,
    /// Reconcile, then upload whatever the cache says is missing.
    Full,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Mirror an S3 bucket listing locally and upload missing device files")]
pub struct Args {
    /// SQLite cache location (overrides OBJECT_SYNC_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Remote bucket name (overrides OBJECT_SYNC_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Time bucket granularity: seconds, hours, days, weeks, months, years or never
    /// (overrides OBJECT_SYNC_GRANULARITY)
    #[arg(long)]
    pub granularity: Option<String>,

    /// Directory holding one subdirectory per device (overrides OBJECT_SYNC_DATA_DIR)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// AWS region (overrides OBJECT_SYNC_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint (overrides OBJECT_SYNC_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Use path-style addressing (overrides OBJECT_SYNC_FORCE_PATH_STYLE)
    #[arg(long)]
    pub force_path_style: bool,

    /// Keys requested per listing page (overrides OBJECT_SYNC_PAGE_SIZE)
    #[arg(long)]
    pub page_size: Option<i32>,

    /// Initialize the metadata cache and exit
    #[arg(long)]
    pub migrate: bool,

    /// Refresh the metadata cache from the bucket without uploading
    #[arg(long, conflicts_with = "migrate")]
    pub reconcile_only: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and run mode.
    pub fn from_env_and_args() -> Result<(Self, RunMode), ConfigError> {
        Self::from_parts(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge `args` over values looked up through `var`. CLI wins.
    pub fn from_parts(
        args: Args,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, RunMode), ConfigError> {
        let database_url = args
            .database_url
            .or_else(|| var("OBJECT_SYNC_DATABASE_URL"))
            .unwrap_or_else(|| "sqlite://./data/meta/object_sync.db".into());

        let bucket = args
            .bucket
            .or_else(|| var("OBJECT_SYNC_BUCKET"))
            .filter(|b| !b.trim().is_empty())
            .ok_or(ConfigError::MissingBucket)?;

        let granularity = match args.granularity.or_else(|| var("OBJECT_SYNC_GRANULARITY")) {
            Some(raw) => raw.parse()?,
            None => Granularity::Never,
        };

        let data_dir = args
            .data_dir
            .or_else(|| var("OBJECT_SYNC_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("./data/devices"));

        let force_path_style = args.force_path_style
            || match var("OBJECT_SYNC_FORCE_PATH_STYLE") {
                Some(value) => parse_flag("OBJECT_SYNC_FORCE_PATH_STYLE", &value)?,
                None => false,
            };

        let page_size = match args.page_size {
            Some(size) => size,
            None => match var("OBJECT_SYNC_PAGE_SIZE") {
                Some(value) => value.parse::<i32>().map_err(|_| ConfigError::InvalidValue {
                    name: "OBJECT_SYNC_PAGE_SIZE",
                    value,
                })?,
                None => MAX_PAGE_SIZE,
            },
        };

        let cfg = Self {
            database_url,
            bucket,
            granularity,
            data_dir,
            region: args.region.or_else(|| var("OBJECT_SYNC_REGION")),
            endpoint: args.endpoint.or_else(|| var("OBJECT_SYNC_ENDPOINT")),
            force_path_style,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        };

        let mode = if args.migrate {
            RunMode::Migrate
        } else if args.reconcile_only {
            RunMode::ReconcileOnly
        } else {
            RunMode::Full
        };

        Ok((cfg, mode))
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}
