//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SolError};

/// Hard ceiling for `render.max_atom_depth`.
pub const MAX_ATOM_DEPTH_CEILING: usize = 64;

/// Full configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub render: RenderConfig,
    pub sync: SyncConfig,
    pub notifications: NotificationConfig,
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
}

/// View projection knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RenderConfig {
    /// Nesting bound for conditional atoms during projection.
    pub max_atom_depth: usize,
    /// Character width of a full histogram bar in terminal rendering.
    pub bar_width: usize,
    /// Text shown next to the warning glyph when a conditional has no match.
    pub not_found_label: String,
    /// Glyph drawn for icon names without a known glyph.
    pub fallback_glyph: String,
}

/// Map synchronization knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Namespace kinds (`/area/...` → `area`) whose ids are highlighted.
    /// Empty means every namespace is highlightable.
    pub highlightable_kinds: Vec<String>,
}

/// Transient message settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    pub ttl_ms: u64,
    pub max_visible: usize,
}

/// Event journal settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub jsonl_path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
}

/// Filesystem paths used by sol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_atom_depth: 16,
            bar_width: 24,
            not_found_label: "value not found".to_string(),
            fallback_glyph: "\u{25a1}".to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            highlightable_kinds: vec!["path".to_string(), "area".to_string()],
        }
    }
}

impl SyncConfig {
    /// Whether ids in `namespace` should be published as highlights.
    #[must_use]
    pub fn is_highlightable(&self, kind: Option<&str>) -> bool {
        if self.highlightable_kinds.is_empty() {
            return true;
        }
        kind.is_some_and(|k| self.highlightable_kinds.iter().any(|h| h == k))
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 4_000,
            max_visible: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let data = data_dir();
        Self {
            enabled: false,
            jsonl_path: data.join("events.jsonl"),
            fallback_path: Some(env::temp_dir().join("sol-events.jsonl")),
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_file: home_dir().join(".config").join("sol").join("config.toml"),
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[SOL-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join("sol")
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| SolError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(SolError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for journal entries.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("SOL_RENDER_MAX_ATOM_DEPTH") {
            self.render.max_atom_depth = parse_env("SOL_RENDER_MAX_ATOM_DEPTH", &raw)?;
        }
        if let Some(raw) = lookup("SOL_RENDER_BAR_WIDTH") {
            self.render.bar_width = parse_env("SOL_RENDER_BAR_WIDTH", &raw)?;
        }
        if let Some(raw) = lookup("SOL_RENDER_NOT_FOUND_LABEL") {
            self.render.not_found_label = raw;
        }
        if let Some(raw) = lookup("SOL_SYNC_HIGHLIGHTABLE_KINDS") {
            self.sync.highlightable_kinds = raw
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(raw) = lookup("SOL_NOTIFICATIONS_TTL_MS") {
            self.notifications.ttl_ms = parse_env("SOL_NOTIFICATIONS_TTL_MS", &raw)?;
        }
        if let Some(raw) = lookup("SOL_NOTIFICATIONS_MAX_VISIBLE") {
            self.notifications.max_visible = parse_env("SOL_NOTIFICATIONS_MAX_VISIBLE", &raw)?;
        }
        if let Some(raw) = lookup("SOL_LOG_ENABLED") {
            self.logging.enabled = parse_env("SOL_LOG_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("SOL_LOG_JSONL_PATH") {
            self.logging.jsonl_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("SOL_LOG_MAX_SIZE_BYTES") {
            self.logging.max_size_bytes = parse_env("SOL_LOG_MAX_SIZE_BYTES", &raw)?;
        }
        Ok(())
    }

    /// Lowercase and dedupe namespace kinds so lookups are exact.
    fn normalize(&mut self) {
        let mut kinds: Vec<String> = self
            .sync
            .highlightable_kinds
            .iter()
            .map(|k| k.trim().trim_matches('/').to_ascii_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        kinds.sort();
        kinds.dedup();
        self.sync.highlightable_kinds = kinds;
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_ATOM_DEPTH_CEILING).contains(&self.render.max_atom_depth) {
            return Err(SolError::InvalidConfig {
                details: format!(
                    "render.max_atom_depth must be in [1, {MAX_ATOM_DEPTH_CEILING}], got {}",
                    self.render.max_atom_depth
                ),
            });
        }
        if self.render.bar_width < 4 {
            return Err(SolError::InvalidConfig {
                details: format!(
                    "render.bar_width must be >= 4, got {}",
                    self.render.bar_width
                ),
            });
        }
        if self.render.fallback_glyph.trim().is_empty() {
            return Err(SolError::InvalidConfig {
                details: "render.fallback_glyph must not be blank".to_string(),
            });
        }
        if self.notifications.ttl_ms == 0 {
            return Err(SolError::InvalidConfig {
                details: "notifications.ttl_ms must be > 0".to_string(),
            });
        }
        if self.notifications.max_visible == 0 {
            return Err(SolError::InvalidConfig {
                details: "notifications.max_visible must be >= 1".to_string(),
            });
        }
        if self.logging.max_size_bytes < 1024 {
            return Err(SolError::InvalidConfig {
                details: format!(
                    "logging.max_size_bytes ({}) must be >= 1024",
                    self.logging.max_size_bytes
                ),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| SolError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
