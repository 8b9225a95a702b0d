use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const ENV_BASE_URL: &str = "TFS_BASE_URL";
pub const ENV_PROJECT: &str = "TFS_PROJECT";
pub const ENV_PAT: &str = "TFS_PAT";

const REDACTED_PAT: &str = "***";

/// Persisted client settings. A value is never mutated in place: merging and
/// redaction both return new values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub project: String,
    pub pat: String,
    /// State literals for the `my` listing's fallback filter. Empty means
    /// the built-in pair.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub default_states: Vec<String>,
}

impl Config {
    /// Overlay non-empty fields of `overlay` onto `self`.
    pub fn merged(mut self, overlay: Config) -> Config {
        if !overlay.base_url.is_empty() {
            self.base_url = overlay.base_url;
        }
        if !overlay.project.is_empty() {
            self.project = overlay.project;
        }
        if !overlay.pat.is_empty() {
            self.pat = overlay.pat;
        }
        if !overlay.default_states.is_empty() {
            self.default_states = overlay.default_states;
        }
        self
    }

    /// Copy with the PAT masked. Applying it twice is a no-op, so a redacted
    /// value can be passed around without ever recovering the token.
    pub fn redacted(&self) -> Config {
        if self.pat.is_empty() {
            return self.clone();
        }
        Config {
            pat: REDACTED_PAT.to_string(),
            ..self.clone()
        }
    }
}

fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tfs")
        .join("config.toml")
}

pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_path);
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config from {}", path.display()))?;
    let config = toml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(config)
}

pub fn save(path: Option<&Path>, config: &Config) -> Result<()> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write {}", path.display()))
}

pub fn from_env() -> Config {
    Config {
        base_url: env::var(ENV_BASE_URL).unwrap_or_default(),
        project: env::var(ENV_PROJECT).unwrap_or_default(),
        pat: env::var(ENV_PAT).unwrap_or_default(),
        default_states: Vec::new(),
    }
}

/// When the base URL carries the project as its last path segment, strip it;
/// the gateway appends the project itself. Returns `None` when nothing needs
/// stripping.
pub fn normalized_base_url(base_url: &str, project: &str) -> Option<String> {
    if base_url.is_empty() || project.is_empty() {
        return None;
    }
    let trimmed = base_url.trim_end_matches('/');
    let tail_start = trimmed.len().checked_sub(project.len() + 1)?;
    if !trimmed.is_char_boundary(tail_start) {
        return None;
    }
    let (head, tail) = trimmed.split_at(tail_start);
    if !tail.starts_with('/') || !tail[1..].eq_ignore_ascii_case(project) {
        return None;
    }
    Some(head.trim_end_matches('/').to_string())
}
