//! Configuration loading and management.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{FixedOffset, Local, Offset, TimeDelta};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use hb_core::{
    DEFAULT_HEARTBEATS_TIMEOUT, NormalizerConfig, PlaceholderPolicy, RetentionPolicy, User,
    UserId,
};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// User that commands act as unless `--user` is given.
    pub user: String,

    /// Longest gap between heartbeats still counted as continuous activity.
    pub heartbeats_timeout_secs: i64,

    /// Drop durations without a project from aggregation.
    pub exclude_unknown_projects: bool,

    /// Oldest heartbeat accepted at import.
    pub heartbeat_max_age_secs: i64,

    /// Months of history visible to reports; 0 keeps everything.
    pub data_retention_months: u32,

    /// Offset that defines calendar days. Defaults to the host's offset.
    pub utc_offset_minutes: Option<i32>,

    /// File suffix to language name, applied when a heartbeat has none.
    pub language_mappings: BTreeMap<String, String>,

    pub placeholder_policy: PlaceholderPolicy,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("hb.db"),
            user: "default".to_string(),
            heartbeats_timeout_secs: DEFAULT_HEARTBEATS_TIMEOUT.num_seconds(),
            exclude_unknown_projects: false,
            heartbeat_max_age_secs: NormalizerConfig::default().max_age.num_seconds(),
            data_retention_months: 0,
            utc_offset_minutes: None,
            language_mappings: default_language_mappings(),
            placeholder_policy: PlaceholderPolicy::default(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // HB_DATABASE_PATH, HB_USER, ...
        figment = figment.merge(Env::prefixed("HB_"));

        figment.extract()
    }

    /// Builds the acting user, preferring `name_override` over the
    /// configured name.
    pub fn user(&self, name_override: Option<&str>) -> anyhow::Result<User> {
        let name = name_override.unwrap_or(&self.user);
        let id = UserId::new(name).with_context(|| format!("invalid user name {name:?}"))?;
        Ok(User::new(id)
            .with_heartbeats_timeout(non_negative_secs(
                "heartbeats_timeout_secs",
                self.heartbeats_timeout_secs,
            )?)
            .with_exclude_unknown_projects(self.exclude_unknown_projects)
            .with_utc_offset(self.utc_offset()?))
    }

    fn utc_offset(&self) -> anyhow::Result<FixedOffset> {
        match self.utc_offset_minutes {
            Some(minutes) => minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .with_context(|| format!("utc_offset_minutes out of range: {minutes}")),
            None => Ok(Local::now().offset().fix()),
        }
    }

    pub fn normalizer_config(&self) -> anyhow::Result<NormalizerConfig> {
        Ok(NormalizerConfig {
            max_age: non_negative_secs("heartbeat_max_age_secs", self.heartbeat_max_age_secs)?,
            language_mappings: self.language_mappings.clone(),
            placeholder_policy: self.placeholder_policy,
        })
    }

    pub const fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.data_retention_months)
    }
}

fn non_negative_secs(field: &str, secs: i64) -> anyhow::Result<TimeDelta> {
    anyhow::ensure!(secs >= 0, "{field} must not be negative: {secs}");
    TimeDelta::try_seconds(secs).with_context(|| format!("{field} out of range: {secs}"))
}

fn default_language_mappings() -> BTreeMap<String, String> {
    [
        ("astro", "Astro"),
        ("cjs", "JavaScript"),
        ("ipynb", "Python"),
        ("jsx", "JSX"),
        ("svelte", "Svelte"),
        ("tsx", "TSX"),
        ("vue", "Vue"),
    ]
    .into_iter()
    .map(|(suffix, language)| (suffix.to_string(), language.to_string()))
    .collect()
}

/// Returns the platform-specific config directory for hb.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hb"))
}

/// Returns the platform-specific data directory for hb.
///
/// On Linux: `~/.local/share/hb`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("hb"))
}
