use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

use crate::indexing::DEFAULT_THRESHOLD;
use crate::pipeline::ExecutionMode;

/// Default worker count for pool mode.
pub const DEFAULT_WORKERS: usize = 4;
/// Default document-type pool key.
pub const DEFAULT_DOC_TYPE: &str = "file";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the Elasticsearch cluster.
    pub elasticsearch_url: String,
    /// Index receiving metadata documents.
    pub elasticsearch_index: String,
    /// Optional API key sent as `Authorization: ApiKey`.
    pub elasticsearch_api_key: Option<String>,
    /// Pool key used for every document the pipeline submits.
    pub doc_type: String,
    /// Optional schema document replacing the built-in mapping.
    pub index_schema_path: Option<PathBuf>,
    /// Pool length that triggers a bulk flush.
    pub bulk_threshold: usize,
    /// Sequential or worker-pool execution.
    pub execution_mode: ExecutionMode,
    /// Optional JSON rules file for handler selection.
    pub handler_rules_path: Option<PathBuf>,
    /// Whether to compute SHA-256 checksums of file contents.
    pub checksums: bool,
    /// Optional directory receiving one JSON file per record.
    pub output_dir: Option<PathBuf>,
    /// Keep coordinates that are exactly 0.0 instead of treating them as fill values.
    pub keep_zero_coordinates: bool,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required =
            |key: &str| optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()));
        let parsed = |key: &str| -> Result<Option<usize>, ConfigError> {
            optional(key)
                .map(|value| {
                    value
                        .trim()
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
                })
                .transpose()
        };
        let flag = |key: &str| -> Result<bool, ConfigError> {
            optional(key)
                .map(|value| {
                    parse_flag(&value).ok_or_else(|| ConfigError::InvalidValue(key.to_string()))
                })
                .transpose()
                .map(Option::unwrap_or_default)
        };

        let workers = parsed("SCAN_WORKERS")?.unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(ConfigError::InvalidValue("SCAN_WORKERS".into()));
        }
        let execution_mode = match optional("SCAN_MODE") {
            None => ExecutionMode::Sequential,
            Some(mode) => ExecutionMode::parse(&mode, workers)
                .ok_or_else(|| ConfigError::InvalidValue("SCAN_MODE".into()))?,
        };

        let bulk_threshold = parsed("BULK_THRESHOLD")?.unwrap_or(DEFAULT_THRESHOLD);
        if bulk_threshold == 0 {
            return Err(ConfigError::InvalidValue("BULK_THRESHOLD".into()));
        }

        Ok(Self {
            elasticsearch_url: required("ELASTICSEARCH_URL")?,
            elasticsearch_index: required("ELASTICSEARCH_INDEX")?,
            elasticsearch_api_key: optional("ELASTICSEARCH_API_KEY"),
            doc_type: optional("ELASTICSEARCH_DOC_TYPE")
                .unwrap_or_else(|| DEFAULT_DOC_TYPE.to_string()),
            index_schema_path: optional("INDEX_SCHEMA_PATH").map(PathBuf::from),
            bulk_threshold,
            execution_mode,
            handler_rules_path: optional("HANDLER_RULES_PATH").map(PathBuf::from),
            checksums: flag("SCAN_CHECKSUMS")?,
            output_dir: optional("SCAN_OUTPUT_DIR").map(PathBuf::from),
            keep_zero_coordinates: flag("GEO_KEEP_ZERO_COORDINATES")?,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from `.env` and the environment and install it in the global cache.
///
/// Later calls return the configuration installed by the first successful call.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        url = %config.elasticsearch_url,
        index = %config.elasticsearch_index,
        doc_type = %config.doc_type,
        threshold = config.bulk_threshold,
        mode = ?config.execution_mode,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
