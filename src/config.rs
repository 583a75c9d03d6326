// src/config.rs
use crate::error::ConfigError;
use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Default dispatch interval in milliseconds.
pub const DEFAULT_POLLING_MS: u64 = 1000;

/// Command-line arguments for the application.
#[derive(Parser, Debug, Deserialize, Default)]
#[clap(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to a configuration file (e.g., config.yaml or hookwatch.toml)
    #[clap(
        short,
        long,
        value_parser,
        help = "Path to a configuration file (e.g., config.yaml or hookwatch.toml)"
    )]
    pub config: Option<PathBuf>,

    /// Log level (e.g., trace, debug, info, warn, error)
    #[clap(
        long,
        value_parser,
        help = "Log level (e.g., trace, debug, info, warn, error)"
    )]
    pub log_level: Option<String>,
}

/// Configuration as it appears in the file or environment.
///
/// Unset fields are skipped on serialization so that override layers built
/// from a partial `FileConfig` never clobber lower layers.
#[derive(Deserialize, Serialize, Debug, Default)]
pub struct FileConfig {
    /// Dispatch interval in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polling: Option<u64>,
    /// Webhook destination URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    /// Base directory to watch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<PathBuf>,
    /// URL prefix for links to new files
    #[serde(
        rename = "webLink",
        alias = "web_link",
        alias = "weblink",
        skip_serializing_if = "Option::is_none"
    )]
    pub web_link: Option<String>,
    /// Log level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Final application configuration after merging all sources.
#[derive(Clone)]
pub struct AppConfig {
    /// Interval between dispatch cycles; also the watcher's debounce window
    pub polling: Duration,
    /// Webhook destination URL
    pub webhook: String,
    /// Base directory, watched recursively and used to relativize paths
    pub folder: PathBuf,
    /// Optional URL prefix for links to new files
    pub web_link: Option<String>,
    /// Log level
    pub log_level: String,
}

impl AppConfig {
    /// Loads the application configuration from defaults, file, environment and CLI.
    pub fn load() -> Result<Self, ConfigError> {
        let cli_args = CliArgs::parse();
        Self::from_figment(Self::figment(&cli_args))
    }

    /// Builds the layered provider stack without extracting it.
    pub fn figment(cli_args: &CliArgs) -> Figment {
        let config_file_path = cli_args
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let fig = Figment::new().merge(Serialized::defaults(FileConfig {
            polling: Some(DEFAULT_POLLING_MS),
            log_level: Some("info".to_string()),
            ..Default::default()
        }));

        let fig = if is_toml(&config_file_path) {
            fig.merge(Toml::file(config_file_path))
        } else {
            fig.merge(Yaml::file(config_file_path))
        };

        let fig = fig.merge(Env::prefixed("HOOKWATCH_"));

        match &cli_args.log_level {
            Some(level) => fig.merge(Serialized::defaults(FileConfig {
                log_level: Some(level.clone()),
                ..Default::default()
            })),
            None => fig,
        }
    }

    /// Extracts and validates an `AppConfig` from any figment.
    pub fn from_figment(fig: Figment) -> Result<Self, ConfigError> {
        let merged: FileConfig = fig.extract()?;

        let polling_ms = merged.polling.unwrap_or(DEFAULT_POLLING_MS);
        if polling_ms == 0 {
            return Err(ConfigError::ZeroPolling);
        }

        let webhook = merged
            .webhook
            .filter(|w| !w.trim().is_empty())
            .ok_or(ConfigError::Missing("webhook"))?;

        let folder = merged
            .folder
            .filter(|f| !f.as_os_str().is_empty())
            .ok_or(ConfigError::Missing("folder"))?;
        // The watcher reports canonical paths, so compare against the same form.
        let folder = folder.canonicalize().unwrap_or(folder);

        Ok(AppConfig {
            polling: Duration::from_millis(polling_ms),
            webhook,
            folder,
            web_link: merged.web_link.filter(|l| !l.is_empty()),
            log_level: merged.log_level.unwrap_or_else(|| "info".to_string()),
        })
    }
}

// Webhook URLs carry their token in the path; only the origin is printed.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("polling", &self.polling)
            .field("webhook", &redact_url(&self.webhook))
            .field("folder", &self.folder)
            .field("web_link", &self.web_link)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => format!("{}/<redacted>", url.origin().ascii_serialization()),
        Err(_) => "<redacted>".to_string(),
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false)
}
