//! Remote content catalog access.
//!
//! This module wraps the catalog's two endpoints used by the harvester:
//!
//! - `GET {base}/search` - offset/limit pagination filtered by a project-type
//!   facet, returning a `hits` array of [`CatalogItem`]s
//! - `GET {base}/project/{id}/version` - version history of one project, newest
//!   first, of which only the head ([`VersionDetail`]) is used
//!
//! Both are issued through [`CatalogClient`], which passes every request
//! through the shared [`RateGovernor`](crate::RateGovernor).

mod client;
mod error;

pub use client::{CatalogClient, VersionLookup};
pub use error::CatalogError;

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Content kinds understood by the harvester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// Mods (`project_type:mod`).
    Mod,
    /// Texture / resource packs (`project_type:resourcepack`).
    Texture,
    /// Data packs (`project_type:datapack`).
    DataPack,
}

impl ContentKind {
    /// Every kind, in the order a full harvest runs them.
    pub const ALL: [Self; 3] = [Self::Mod, Self::Texture, Self::DataPack];

    /// Returns the CLI/config label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mod => "mods",
            Self::Texture => "textures",
            Self::DataPack => "datapacks",
        }
    }

    /// Returns the catalog's project type for this kind.
    #[must_use]
    pub fn project_type(&self) -> &'static str {
        match self {
            Self::Mod => "mod",
            Self::Texture => "resourcepack",
            Self::DataPack => "datapack",
        }
    }

    /// Returns the JSON-encoded `facets` query value selecting this kind.
    #[must_use]
    pub fn facets(&self) -> String {
        format!("[[\"project_type:{}\"]]", self.project_type())
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mods" | "mod" => Ok(Self::Mod),
            "textures" | "texture" | "resourcepacks" | "resourcepack" => Ok(Self::Texture),
            "datapacks" | "datapack" => Ok(Self::DataPack),
            other => Err(format!(
                "invalid content kind: {other} (expected mods, textures or datapacks)"
            )),
        }
    }
}

/// One hit of the search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogItem {
    /// Display title.
    pub title: String,
    /// Stable project identifier.
    pub project_id: String,
    /// Category tags.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Declared supported game versions.
    #[serde(default)]
    pub versions: Vec<String>,
    /// Free-text author description.
    #[serde(default)]
    pub description: String,
    /// Icon reference.
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// Search endpoint response body.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<CatalogItem>,
}

/// A downloadable file of a version.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionFile {
    /// Direct download URL.
    pub url: String,
    /// Server-side filename, when given.
    #[serde(default)]
    pub filename: Option<String>,
}

/// Most recent version record of a project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionDetail {
    /// Version label.
    pub version_number: String,
    /// Downloadable files, primary first.
    #[serde(default)]
    pub files: Vec<VersionFile>,
    /// Publication timestamp.
    #[serde(default)]
    pub date_published: Option<String>,
}

impl VersionDetail {
    /// URL of the first file, if the version has any files.
    #[must_use]
    pub fn primary_url(&self) -> Option<&str> {
        self.files.first().map(|file| file.url.as_str())
    }
}
