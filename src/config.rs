use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::chart::DEFAULT_CHART_URL;
use crate::dispatch::DispatchSettings;
use crate::github::DEFAULT_API_BASE;
use crate::telegram::DEFAULT_TELEGRAM_API;

const DEFAULT_CHART_WIDTH: u32 = 800;
const DEFAULT_CHART_HEIGHT: u32 = 640;
const DEFAULT_SINCE_DAYS: u64 = 3;
const DEFAULT_TOP_N: usize = 3;
const DEFAULT_MAX_PAGES: usize = 5;
const DEFAULT_POLL_TIMEOUT: u64 = 30;

#[derive(Parser, Deserialize, Debug, Clone, Default)]
#[command(name = "gitguard-bot")]
#[command(about = "Telegram bot answering GitHub repository analytics queries")]
#[command(version)]
pub struct Config {
    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_API_TOKEN", hide_env_values = true)]
    #[serde(skip)]
    pub telegram_token: Option<String>,

    /// GitHub token used when a command carries no credentials
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    #[serde(skip)]
    pub github_token: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    #[serde(skip)]
    pub config_file: Option<String>,

    /// GitHub REST API base URL
    #[arg(long)]
    #[serde(default)]
    pub api_base: Option<String>,

    /// Telegram Bot API base URL
    #[arg(long)]
    #[serde(default)]
    pub telegram_api: Option<String>,

    /// QuickChart-compatible rendering endpoint
    #[arg(long)]
    #[serde(default)]
    pub chart_url: Option<String>,

    /// Chart width in pixels
    #[arg(long)]
    #[serde(default)]
    pub chart_width: Option<u32>,

    /// Chart height in pixels
    #[arg(long)]
    #[serde(default)]
    pub chart_height: Option<u32>,

    /// Directory for rendered charts before they are sent
    #[arg(long)]
    #[serde(default)]
    pub chart_dir: Option<PathBuf>,

    /// Days before today used by /top_contributor when no date is given
    #[arg(long)]
    #[serde(default)]
    pub since_default_days: Option<u64>,

    /// Number of contributors listed by /top_three
    #[arg(long)]
    #[serde(default)]
    pub top_n: Option<usize>,

    /// Maximum number of pages fetched from paginated GitHub endpoints
    #[arg(long)]
    #[serde(default)]
    pub max_pages: Option<usize>,

    /// Long-poll timeout for Telegram updates, in seconds
    #[arg(long)]
    #[serde(default)]
    pub poll_timeout: Option<u64>,

    /// Enable verbose output (debug-level logging)
    #[arg(long, default_value_t = false)]
    #[serde(skip)]
    pub verbose: bool,
}

impl Config {
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read configuration file")?;

        let config: Config =
            toml::from_str(&content).context("Failed to parse TOML configuration file")?;

        Ok(config)
    }

    pub fn merge(mut self, file_config: Config) -> Self {
        // CLI has precedence, if None, take from file_config
        self.api_base = self.api_base.or(file_config.api_base);
        self.telegram_api = self.telegram_api.or(file_config.telegram_api);
        self.chart_url = self.chart_url.or(file_config.chart_url);
        self.chart_width = self.chart_width.or(file_config.chart_width);
        self.chart_height = self.chart_height.or(file_config.chart_height);
        self.chart_dir = self.chart_dir.or(file_config.chart_dir);
        self.since_default_days = self.since_default_days.or(file_config.since_default_days);
        self.top_n = self.top_n.or(file_config.top_n);
        self.max_pages = self.max_pages.or(file_config.max_pages);
        self.poll_timeout = self.poll_timeout.or(file_config.poll_timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram_token.as_deref().is_none_or(str::is_empty) {
            anyhow::bail!("Telegram bot token is required (--telegram-token or TELEGRAM_API_TOKEN)");
        }
        if self.top_n == Some(0) {
            anyhow::bail!("top_n must be greater than 0");
        }
        Ok(())
    }

    pub fn telegram_token(&self) -> Result<&str> {
        self.telegram_token
            .as_deref()
            .context("Telegram bot token is not set")
    }

    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    pub fn telegram_api(&self) -> &str {
        self.telegram_api.as_deref().unwrap_or(DEFAULT_TELEGRAM_API)
    }

    pub fn chart_url(&self) -> &str {
        self.chart_url.as_deref().unwrap_or(DEFAULT_CHART_URL)
    }

    pub fn chart_width(&self) -> u32 {
        self.chart_width.unwrap_or(DEFAULT_CHART_WIDTH)
    }

    pub fn chart_height(&self) -> u32 {
        self.chart_height.unwrap_or(DEFAULT_CHART_HEIGHT)
    }

    pub fn chart_dir(&self) -> PathBuf {
        self.chart_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages.unwrap_or(DEFAULT_MAX_PAGES)
    }

    pub fn poll_timeout(&self) -> u64 {
        self.poll_timeout.unwrap_or(DEFAULT_POLL_TIMEOUT)
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            top_n: self.top_n.unwrap_or(DEFAULT_TOP_N),
            since_default_days: self.since_default_days.unwrap_or(DEFAULT_SINCE_DAYS),
            chart_dir: self.chart_dir(),
        }
    }
}
