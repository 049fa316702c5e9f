//! Configuration for narrate.
//!
//! Settings are read from `.narrate/narrate.toml` inside the watched
//! directory and layered file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [model]
//! endpoint = "http://localhost:11434"
//! name = "llama3"
//!
//! [tracking]
//! mode = "cache"          # or "snapshot"
//! diff = "lcs"            # or "positional"; defaults per mode
//! cache_size = 5
//! reset_threshold = 100
//!
//! [prompt]
//! personality = "You are a terse reviewer."
//! conciseness = "One sentence."
//!
//! [watch]
//! patterns = ["src/**/*.rs"]
//! ignore = [".git/**", "target/**"]
//! ```
//!
//! # Environment
//!
//! - `NARRATE_ENDPOINT` (falls back to `OLLAMA_HOST`) overrides `[model] endpoint`
//! - `NARRATE_MODEL` overrides `[model] name`

use crate::diff::DiffStrategy;
use crate::inference::{DEFAULT_ENDPOINT, DEFAULT_MODEL, generate_url};
use crate::prompt::PromptStyle;
use crate::tracker::{DEFAULT_CACHE_SIZE, DEFAULT_RESET_THRESHOLD, TrackerSettings, TrackingMode};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory holding narrate's files inside the watched directory.
pub const NARRATE_DIR: &str = ".narrate";

/// Config file name inside [`NARRATE_DIR`].
pub const CONFIG_FILE: &str = "narrate.toml";

/// Model endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the model server
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model name passed with every request
    #[serde(default = "default_model")]
    pub name: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            name: default_model(),
        }
    }
}

/// Change tracking settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default)]
    pub mode: TrackingMode,
    /// Diff strategy; the mode's default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffStrategy>,
    /// Fragments kept per file
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    /// Added lines above which the baseline is reset
    #[serde(default = "default_reset_threshold")]
    pub reset_threshold: usize,
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_reset_threshold() -> usize {
    DEFAULT_RESET_THRESHOLD
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            mode: TrackingMode::default(),
            diff: None,
            cache_size: default_cache_size(),
            reset_threshold: default_reset_threshold(),
        }
    }
}

/// Which files are watched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Globs relative to the watched directory
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,
    /// Globs that are never reported
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

fn default_patterns() -> Vec<String> {
    vec!["**/*".to_string()]
}

fn default_ignore() -> Vec<String> {
    [".git/**", "target/**", "node_modules/**", ".narrate/**"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            patterns: default_patterns(),
            ignore: default_ignore(),
        }
    }
}

/// The complete narrate.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrateToml {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub prompt: PromptStyle,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl NarrateToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse narrate.toml")
    }

    /// Load from `<narrate_dir>/narrate.toml`, or defaults if it doesn't exist.
    pub fn load_or_default(narrate_dir: &Path) -> Result<Self> {
        let config_path = narrate_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize narrate.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(e) = generate_url(&self.model.endpoint) {
            warnings.push(e.to_string());
        }
        if self.model.name.trim().is_empty() {
            warnings.push("[model] name is empty".to_string());
        }
        if self.tracking.cache_size == 0 {
            warnings.push("[tracking] cache_size is 0; a cache of 1 will be used".to_string());
        }
        if self.tracking.reset_threshold == 0 {
            warnings.push(
                "[tracking] reset_threshold is 0; every added line will reset the baseline"
                    .to_string(),
            );
        }
        if self.watch.patterns.is_empty() {
            warnings.push("[watch] patterns is empty; no file will be reported".to_string());
        }
        for pattern in self.watch.patterns.iter().chain(&self.watch.ignore) {
            if let Err(e) = glob::Pattern::new(pattern) {
                warnings.push(format!("Invalid glob '{}': {}", pattern, e));
            }
        }

        warnings
    }
}

/// Values given on the command line; `None`/empty means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub mode: Option<TrackingMode>,
    pub diff: Option<DiffStrategy>,
    pub cache_size: Option<usize>,
    pub reset_threshold: Option<usize>,
    pub patterns: Vec<String>,
}

/// Fully layered configuration.
#[derive(Debug, Clone)]
pub struct NarrateConfig {
    /// Watched directory (canonical)
    pub root: PathBuf,
    /// `<root>/.narrate`
    pub narrate_dir: PathBuf,
    /// Parsed narrate.toml
    pub toml: NarrateToml,
    pub overrides: CliOverrides,
}

impl NarrateConfig {
    /// Load configuration for the watched directory `root`.
    pub fn new(root: PathBuf) -> Result<Self> {
        Self::with_overrides(root, CliOverrides::default())
    }

    pub fn with_overrides(root: PathBuf, overrides: CliOverrides) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve watch directory {}", root.display()))?;
        let narrate_dir = root.join(NARRATE_DIR);
        let toml = NarrateToml::load_or_default(&narrate_dir)?;

        Ok(Self {
            root,
            narrate_dir,
            toml,
            overrides,
        })
    }

    pub fn config_path(&self) -> PathBuf {
        self.narrate_dir.join(CONFIG_FILE)
    }

    /// Model server base URL (CLI → env → file).
    pub fn endpoint(&self) -> String {
        self.endpoint_with(|key| std::env::var(key).ok())
    }

    fn endpoint_with(&self, env: impl Fn(&str) -> Option<String>) -> String {
        if let Some(endpoint) = &self.overrides.endpoint {
            return endpoint.clone();
        }
        if let Some(endpoint) = env("NARRATE_ENDPOINT").filter(|v| !v.is_empty()) {
            return endpoint;
        }
        if let Some(host) = env("OLLAMA_HOST").filter(|v| !v.is_empty()) {
            return if host.contains("://") {
                host
            } else {
                format!("http://{}", host)
            };
        }
        self.toml.model.endpoint.clone()
    }

    /// Model name (CLI → env → file).
    pub fn model(&self) -> String {
        self.model_with(|key| std::env::var(key).ok())
    }

    fn model_with(&self, env: impl Fn(&str) -> Option<String>) -> String {
        self.overrides
            .model
            .clone()
            .or_else(|| env("NARRATE_MODEL").filter(|v| !v.is_empty()))
            .unwrap_or_else(|| self.toml.model.name.clone())
    }

    /// Tracker settings (CLI → file → per-mode defaults).
    pub fn tracker_settings(&self) -> TrackerSettings {
        let tracking = &self.toml.tracking;
        let mode = self.overrides.mode.unwrap_or(tracking.mode);
        let diff = self
            .overrides
            .diff
            .or(tracking.diff)
            .unwrap_or_else(|| mode.default_diff());

        TrackerSettings {
            mode,
            diff,
            cache_size: self.overrides.cache_size.unwrap_or(tracking.cache_size),
            reset_threshold: self
                .overrides
                .reset_threshold
                .unwrap_or(tracking.reset_threshold),
        }
    }

    /// Include globs (CLI replaces the file's list).
    pub fn patterns(&self) -> Vec<String> {
        if self.overrides.patterns.is_empty() {
            self.toml.watch.patterns.clone()
        } else {
            self.overrides.patterns.clone()
        }
    }

    pub fn ignore(&self) -> Vec<String> {
        self.toml.watch.ignore.clone()
    }

    pub fn style(&self) -> &PromptStyle {
        &self.toml.prompt
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.toml.validate();
        if let Some(endpoint) = &self.overrides.endpoint
            && let Err(e) = generate_url(endpoint)
        {
            warnings.push(e.to_string());
        }
        warnings
    }
}
