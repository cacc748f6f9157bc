use std::ffi::OsString;
use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub jira: JiraConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub suggest: SuggestConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct JiraConfig {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    /// Directory for the cached reference data. Defaults to
    /// $XDG_CACHE_HOME/jiraq or ~/.cache/jiraq when unset.
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default = "default_max_age_secs")]
    pub projects_max_age_secs: u64,
    #[serde(default = "default_max_age_secs")]
    pub issuetypes_max_age_secs: u64,
    #[serde(default = "default_max_age_secs")]
    pub statuses_max_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            projects_max_age_secs: default_max_age_secs(),
            issuetypes_max_age_secs: default_max_age_secs(),
            statuses_max_age_secs: default_max_age_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SuggestConfig {
    #[serde(default = "default_suggest_limit")]
    pub limit: usize,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            limit: default_suggest_limit(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found at {path}. expected at $XDG_CONFIG_HOME/jiraq/config.toml or ~/.config/jiraq/config.toml")]
    MissingConfigFile { path: PathBuf },
    #[error("failed to resolve config path: HOME is not set and XDG_CONFIG_HOME is unset")]
    MissingHomeDirectory,
    #[error("failed to read config file at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse TOML config at {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load() -> Result<AppConfig, ConfigError> {
    let path = resolve_config_path()?;
    load_from(&path)
}

pub fn load_from(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
    let path = path.to_path_buf();
    let raw = std::fs::read_to_string(&path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::MissingConfigFile { path: path.clone() }
        } else {
            ConfigError::ReadFailed {
                path: path.clone(),
                source,
            }
        }
    })?;

    let cfg = toml::from_str::<AppConfig>(&raw).map_err(|source| ConfigError::ParseFailed {
        path: path.clone(),
        source,
    })?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn resolve_config_path() -> Result<PathBuf, ConfigError> {
    let xdg_config_home = std::env::var_os("XDG_CONFIG_HOME");
    let home = std::env::var_os("HOME");
    resolve_config_path_from_env(xdg_config_home, home)
}

fn resolve_config_path_from_env(
    xdg_config_home: Option<OsString>,
    home: Option<OsString>,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = xdg_config_home.filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir).join("jiraq").join("config.toml"));
    }

    let home = home
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingHomeDirectory)?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("jiraq")
        .join("config.toml"))
}

impl CacheConfig {
    /// Directory the cache blobs live in, honoring an explicit setting
    /// before the XDG fallbacks.
    pub fn resolve_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.dir {
            return Ok(PathBuf::from(dir));
        }
        let xdg_cache_home = std::env::var_os("XDG_CACHE_HOME");
        let home = std::env::var_os("HOME");
        resolve_cache_dir_from_env(xdg_cache_home, home)
    }
}

fn resolve_cache_dir_from_env(
    xdg_cache_home: Option<OsString>,
    home: Option<OsString>,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = xdg_cache_home.filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir).join("jiraq"));
    }

    let home = home
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingHomeDirectory)?;
    Ok(PathBuf::from(home).join(".cache").join("jiraq"))
}

impl AppConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.jira.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "jira.base_url must not be empty".into(),
            ));
        }
        if self.jira.email.trim().is_empty() {
            return Err(ConfigError::Invalid("jira.email must not be empty".into()));
        }
        if self.jira.api_token.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "jira.api_token must not be empty".into(),
            ));
        }
        if let Some(dir) = &self.cache.dir {
            if dir.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "cache.dir must not be empty when set".into(),
                ));
            }
        }
        if self.cache.projects_max_age_secs == 0 {
            return Err(ConfigError::Invalid(
                "cache.projects_max_age_secs must be > 0".into(),
            ));
        }
        if self.cache.issuetypes_max_age_secs == 0 {
            return Err(ConfigError::Invalid(
                "cache.issuetypes_max_age_secs must be > 0".into(),
            ));
        }
        if self.cache.statuses_max_age_secs == 0 {
            return Err(ConfigError::Invalid(
                "cache.statuses_max_age_secs must be > 0".into(),
            ));
        }
        if self.suggest.limit == 0 {
            return Err(ConfigError::Invalid("suggest.limit must be > 0".into()));
        }

        Ok(())
    }
}

// one week, matching how rarely projects and statuses change
const fn default_max_age_secs() -> u64 {
    604_800
}

const fn default_suggest_limit() -> usize {
    3
}
