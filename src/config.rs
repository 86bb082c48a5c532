//! Immutable run configuration.
//!
//! Configuration is read once from an optional TOML file, completed from
//! defaults and the environment, validated, and then passed by reference to
//! every component at construction. Nothing reads configuration globally.
//!
//! ```toml
//! max_pages = 20
//!
//! [api]
//! requests_per_minute = 120
//!
//! [mods]
//! blacklisted_tags = ["optimization", "library"]
//!
//! [textures]
//! min_mc_version = "1.18"
//! max_resolution = 64
//!
//! [downloads]
//! links_file = "download_links.txt"
//! concurrent_downloads = 8
//! ```

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::catalog::ContentKind;
use crate::download::DEFAULT_CONCURRENCY;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "harvester.toml";

/// Environment variable consulted for the API token when the file has none.
pub const AUTH_TOKEN_ENV: &str = "HARVESTER_API_TOKEN";

const DEFAULT_BASE_URL: &str = "https://api.modrinth.com/v2";
const DEFAULT_REQUESTS_PER_MINUTE: u32 = 290;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_SIZE: u32 = 50;
const DEFAULT_MAX_PAGES: u32 = 10;
const DEFAULT_MIN_MC_VERSION: &str = "1.16";
const DEFAULT_MAX_RESOLUTION: u32 = 32;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of its accepted range.
    #[error("{0}")]
    Invalid(String),
}

/// Catalog API settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// API root, e.g. `https://api.modrinth.com/v2`.
    pub base_url: String,
    /// Request budget shared by every kind. `0` disables governing.
    pub requests_per_minute: u32,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Items per catalog page.
    pub page_size: u32,
    /// Value of the `Authorization` header, when set.
    pub auth_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            auth_token: None,
        }
    }
}

/// Per-kind overrides as written in the file. Missing values fall back to
/// the kind's defaults (see [`KindSettings::defaults`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KindSection {
    /// Category tags that reject an item.
    pub blacklisted_tags: Option<BTreeSet<String>>,
    /// Minimum supported game version (texture packs).
    pub min_mc_version: Option<String>,
    /// Maximum accepted resolution (texture packs).
    pub max_resolution: Option<u32>,
    /// Progress file path.
    pub progress_file: Option<PathBuf>,
    /// Output file path.
    pub output_file: Option<PathBuf>,
}

/// Resolved settings for one content kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSettings {
    /// The kind these settings apply to.
    pub kind: ContentKind,
    /// Category tags that reject an item.
    pub blacklisted_tags: BTreeSet<String>,
    /// Minimum supported game version (texture packs).
    pub min_mc_version: String,
    /// Maximum accepted resolution (texture packs).
    pub max_resolution: u32,
    /// Progress file path.
    pub progress_file: PathBuf,
    /// Output file path.
    pub output_file: PathBuf,
}

impl KindSettings {
    /// Built-in defaults for `kind`.
    #[must_use]
    pub fn defaults(kind: ContentKind) -> Self {
        let (tags, progress_file, output_file): (&[&str], &str, &str) = match kind {
            ContentKind::Mod => (
                &["optimization", "library"],
                "mods_progress.json",
                "mod_links.json",
            ),
            ContentKind::Texture => (&[], "textures_progress.json", "texture_links.json"),
            ContentKind::DataPack => (
                &["utility"],
                "datapacks_progress.json",
                "datapack_links.json",
            ),
        };
        Self {
            kind,
            blacklisted_tags: tags.iter().map(|tag| (*tag).to_string()).collect(),
            min_mc_version: DEFAULT_MIN_MC_VERSION.to_string(),
            max_resolution: DEFAULT_MAX_RESOLUTION,
            progress_file: PathBuf::from(progress_file),
            output_file: PathBuf::from(output_file),
        }
    }

    fn with_overrides(mut self, section: &KindSection) -> Self {
        if let Some(tags) = &section.blacklisted_tags {
            self.blacklisted_tags.clone_from(tags);
        }
        if let Some(version) = &section.min_mc_version {
            self.min_mc_version.clone_from(version);
        }
        if let Some(resolution) = section.max_resolution {
            self.max_resolution = resolution;
        }
        if let Some(path) = &section.progress_file {
            self.progress_file.clone_from(path);
        }
        if let Some(path) = &section.output_file {
            self.output_file.clone_from(path);
        }
        self
    }
}

/// Download stage settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadConfig {
    /// Link list file (`<url> - <status>` lines).
    pub links_file: PathBuf,
    /// Directory receiving downloaded artifacts.
    pub destination_dir: PathBuf,
    /// Maximum simultaneous transfers.
    pub concurrent_downloads: usize,
    /// Per-request timeout for artifact transfers.
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            links_file: PathBuf::from("download_links.txt"),
            destination_dir: PathBuf::from("downloads"),
            concurrent_downloads: DEFAULT_CONCURRENCY,
            timeout_secs: 300,
        }
    }
}

/// Complete configuration for a harvester run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    /// Catalog API settings.
    pub api: ApiConfig,
    /// Pages scanned per kind (`0..max_pages`).
    pub max_pages: u32,
    /// Mod overrides.
    pub mods: KindSection,
    /// Texture pack overrides.
    pub textures: KindSection,
    /// Data pack overrides.
    pub datapacks: KindSection,
    /// Download stage settings.
    pub downloads: DownloadConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            max_pages: DEFAULT_MAX_PAGES,
            mods: KindSection::default(),
            textures: KindSection::default(),
            datapacks: KindSection::default(),
            downloads: DownloadConfig::default(),
        }
    }
}

impl HarvestConfig {
    /// Loads configuration.
    ///
    /// With `path`, that file must exist. Without it, [`DEFAULT_CONFIG_FILE`]
    /// in the working directory is used when present, defaults otherwise.
    /// The API token falls back to [`AUTH_TOKEN_ENV`]. The result is validated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or a
    /// value is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    debug!("no config file, using defaults");
                    Self::default()
                }
            }
        };

        if config.api.auth_token.is_none() {
            config.api.auth_token = env::var(AUTH_TOKEN_ENV).ok().filter(|t| !t.is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file without validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Parses TOML text without validation.
    ///
    /// # Errors
    ///
    /// Returns the TOML error for malformed input or unknown keys.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Validates values against their accepted ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(invalid("api.base_url", "\"\"", "a non-empty URL"));
        }
        if self.api.requests_per_minute > 6000 {
            return Err(invalid(
                "api.requests_per_minute",
                self.api.requests_per_minute,
                "range 0..=6000",
            ));
        }
        check_range("api.timeout_secs", self.api.timeout_secs, 1, 3600)?;
        check_range("api.page_size", u64::from(self.api.page_size), 1, 100)?;
        check_range("downloads.timeout_secs", self.downloads.timeout_secs, 1, 3600)?;
        check_range(
            "downloads.concurrent_downloads",
            u64::try_from(self.downloads.concurrent_downloads).unwrap_or(u64::MAX),
            1,
            100,
        )?;
        Ok(())
    }

    /// Resolved settings for `kind`.
    #[must_use]
    pub fn kind(&self, kind: ContentKind) -> KindSettings {
        let section = match kind {
            ContentKind::Mod => &self.mods,
            ContentKind::Texture => &self.textures,
            ContentKind::DataPack => &self.datapacks,
        };
        KindSettings::defaults(kind).with_overrides(section)
    }
}

fn check_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, value, &format!("range {min}..={max}")))
    }
}

fn invalid(field: &str, value: impl std::fmt::Display, expected: &str) -> ConfigError {
    ConfigError::Invalid(format!(
        "Invalid config value for `{field}`: {value}. Expected {expected}"
    ))
}
