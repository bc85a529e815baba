use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::MAX_SUMMARY_HOURS;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    pub art: ArtConfig,
    pub research: ResearchConfig,
    pub summarizer: SummarizerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AccessConfig {
    /// JSON file holding runtime grants, rewritten on every change
    #[serde(default = "default_allowlist_path")]
    pub allowlist_path: PathBuf,
    /// Flat list of pre-authorized users, read once at startup
    #[serde(default = "default_bootstrap_path")]
    pub bootstrap_path: PathBuf,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            allowlist_path: default_allowlist_path(),
            bootstrap_path: default_bootstrap_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Research answers longer than this are sent as a file attachment
    #[serde(default = "default_max_inline_chars")]
    pub max_inline_chars: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_inline_chars: default_max_inline_chars(),
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArtConfig {
    pub api_key: String,
    #[serde(default = "default_art_base_url")]
    pub base_url: String,
    #[serde(default = "default_art_model")]
    pub model: String,
    #[serde(default = "default_art_steps")]
    pub steps: u32,
    #[serde(default = "default_art_cfg_scale")]
    pub cfg_scale: f32,
    #[serde(default = "default_art_size")]
    pub width: u32,
    #[serde(default = "default_art_size")]
    pub height: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResearchConfig {
    pub api_key: String,
    #[serde(default = "default_research_base_url")]
    pub base_url: String,
    #[serde(default = "default_research_model")]
    pub model: String,
    #[serde(default = "default_research_max_tokens")]
    pub max_tokens: u32,
    /// Text prepended to every research query
    #[serde(default)]
    pub preprompt: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    pub api_key: String,
    #[serde(default = "default_summarizer_base_url")]
    pub base_url: String,
    #[serde(default = "default_summarizer_model")]
    pub model: String,
    #[serde(default = "default_summarizer_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_summary_hours")]
    pub default_hours: u32,
    /// Only the most recent part of a longer transcript is sent
    #[serde(default = "default_max_transcript_chars")]
    pub max_transcript_chars: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("messages.db")
}

fn default_allowlist_path() -> PathBuf {
    PathBuf::from("whitelist.json")
}

fn default_bootstrap_path() -> PathBuf {
    PathBuf::from("pre_whitelisted_users.txt")
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_inline_chars() -> usize {
    4000
}

fn default_art_base_url() -> String {
    "https://api.hyperbolic.xyz/v1".to_string()
}

fn default_art_model() -> String {
    "FLUX.1-dev".to_string()
}

fn default_art_steps() -> u32 {
    30
}

fn default_art_cfg_scale() -> f32 {
    5.0
}

fn default_art_size() -> u32 {
    1024
}

fn default_research_base_url() -> String {
    "https://api.perplexity.ai".to_string()
}

fn default_research_model() -> String {
    "sonar-pro".to_string()
}

fn default_research_max_tokens() -> u32 {
    2048
}

fn default_summarizer_base_url() -> String {
    "https://api-inference.huggingface.co/v1".to_string()
}

fn default_summarizer_model() -> String {
    "meta-llama/Llama-3.3-70B-Instruct".to_string()
}

fn default_summarizer_max_tokens() -> u32 {
    512
}

fn default_summary_hours() -> u32 {
    3
}

fn default_max_transcript_chars() -> usize {
    100_000
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;

        let hours = config.summarizer.default_hours;
        if hours == 0 || hours > MAX_SUMMARY_HOURS {
            anyhow::bail!(
                "summarizer.default_hours must be between 1 and {}, got {}",
                MAX_SUMMARY_HOURS,
                hours
            );
        }
        if config.summarizer.max_transcript_chars == 0 {
            anyhow::bail!("summarizer.max_transcript_chars must be positive");
        }

        Ok(config)
    }
}
