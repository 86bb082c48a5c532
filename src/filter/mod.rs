//! Per-kind eligibility filters.
//!
//! [`ItemFilter`] is a closed set of variants, one per [`ContentKind`], chosen
//! once at construction. Each variant decides whether a [`CatalogItem`] is
//! accepted and, on acceptance, builds the normalized [`ResultRecord`].
//!
//! Rejection is a normal outcome ([`Verdict::Rejected`]); only failures of
//! the version lookup surface as errors.

mod resolution;
mod version;

pub use resolution::extract_resolution;
pub use version::{any_version_at_least, version_at_least};

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{CatalogError, CatalogItem, ContentKind, VersionDetail, VersionLookup};
use crate::config::KindSettings;

/// Normalized output unit written to a kind's output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Item title.
    pub name: String,
    /// Catalog project identifier; output is deduplicated on it.
    #[serde(default)]
    pub project_id: String,
    /// Latest version label.
    pub version: String,
    /// Extracted resolution (texture packs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<u32>,
    /// Declared game versions (texture packs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minecraft_versions: Option<Vec<String>>,
    /// URL of the latest version's first file; `null` when it has none.
    pub download_url: Option<String>,
    /// Icon reference.
    pub icon_url: Option<String>,
}

impl ResultRecord {
    fn from_version(item: &CatalogItem, version: &VersionDetail) -> Self {
        Self {
            name: item.title.clone(),
            project_id: item.project_id.clone(),
            version: version.version_number.clone(),
            resolution: None,
            minecraft_versions: None,
            download_url: version.primary_url().map(str::to_string),
            icon_url: item.icon_url.clone(),
        }
    }
}

/// Why an item was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// A category tag is blacklisted.
    Tags {
        /// The first blacklisted tag found.
        tag: String,
    },
    /// No declared game version reaches the configured minimum.
    Version,
    /// Extracted resolution exceeds the configured maximum.
    ResolutionTooHigh {
        /// The extracted resolution.
        resolution: u32,
    },
    /// The project has no versions.
    NoVersion,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tags { .. } => write!(f, "tags"),
            Self::Version => write!(f, "version"),
            Self::ResolutionTooHigh { .. } => write!(f, "resolution too high"),
            Self::NoVersion => write!(f, "no version"),
        }
    }
}

/// Outcome of evaluating one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The item passed every check.
    Accepted(ResultRecord),
    /// The item was filtered out.
    Rejected(RejectReason),
}

/// Tag blacklist used by mods and data packs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    blacklisted_tags: BTreeSet<String>,
}

impl TagFilter {
    /// Creates a filter rejecting any of `blacklisted_tags`.
    #[must_use]
    pub fn new(blacklisted_tags: BTreeSet<String>) -> Self {
        Self { blacklisted_tags }
    }

    fn blacklisted_tag<'a>(&self, item: &'a CatalogItem) -> Option<&'a str> {
        item.categories
            .iter()
            .map(String::as_str)
            .find(|tag| self.blacklisted_tags.contains(*tag))
    }
}

/// Version and resolution limits for texture packs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureFilter {
    min_mc_version: String,
    max_resolution: u32,
}

impl TextureFilter {
    /// Creates a filter requiring at least `min_mc_version` and at most
    /// `max_resolution`.
    #[must_use]
    pub fn new(min_mc_version: impl Into<String>, max_resolution: u32) -> Self {
        Self {
            min_mc_version: min_mc_version.into(),
            max_resolution,
        }
    }
}

/// Eligibility filter for one content kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemFilter {
    /// Mods: tag blacklist.
    Mod(TagFilter),
    /// Texture packs: version gate and resolution cap.
    Texture(TextureFilter),
    /// Data packs: tag blacklist.
    DataPack(TagFilter),
}

impl ItemFilter {
    /// Builds the variant matching `settings.kind`.
    #[must_use]
    pub fn from_settings(settings: &KindSettings) -> Self {
        match settings.kind {
            ContentKind::Mod => Self::Mod(TagFilter::new(settings.blacklisted_tags.clone())),
            ContentKind::Texture => Self::Texture(TextureFilter::new(
                settings.min_mc_version.clone(),
                settings.max_resolution,
            )),
            ContentKind::DataPack => {
                Self::DataPack(TagFilter::new(settings.blacklisted_tags.clone()))
            }
        }
    }

    /// The kind this filter handles.
    #[must_use]
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Mod(_) => ContentKind::Mod,
            Self::Texture(_) => ContentKind::Texture,
            Self::DataPack(_) => ContentKind::DataPack,
        }
    }

    /// Evaluates one item.
    ///
    /// Cheap local checks run first; the version lookup is only issued for
    /// items that pass them.
    ///
    /// # Errors
    ///
    /// Returns the [`CatalogError`] of a failed version lookup.
    pub async fn evaluate(
        &self,
        item: &CatalogItem,
        versions: &dyn VersionLookup,
    ) -> Result<Verdict, CatalogError> {
        match self {
            Self::Mod(tags) | Self::DataPack(tags) => {
                if let Some(tag) = tags.blacklisted_tag(item) {
                    return Ok(Verdict::Rejected(RejectReason::Tags {
                        tag: tag.to_string(),
                    }));
                }
                let Some(version) = versions.latest_version(&item.project_id).await? else {
                    return Ok(Verdict::Rejected(RejectReason::NoVersion));
                };
                Ok(Verdict::Accepted(ResultRecord::from_version(item, &version)))
            }
            Self::Texture(limits) => {
                if !any_version_at_least(&item.versions, &limits.min_mc_version) {
                    return Ok(Verdict::Rejected(RejectReason::Version));
                }
                let resolution = extract_resolution(&item.description);
                if resolution > limits.max_resolution {
                    return Ok(Verdict::Rejected(RejectReason::ResolutionTooHigh {
                        resolution,
                    }));
                }
                let Some(version) = versions.latest_version(&item.project_id).await? else {
                    return Ok(Verdict::Rejected(RejectReason::NoVersion));
                };
                debug!(project_id = %item.project_id, resolution, "texture pack accepted");
                let mut record = ResultRecord::from_version(item, &version);
                record.resolution = Some(resolution);
                record.minecraft_versions = Some(item.versions.clone());
                Ok(Verdict::Accepted(record))
            }
        }
    }
}
