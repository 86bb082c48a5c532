//! Best-effort texture resolution extraction from free-text descriptions.
//!
//! Patterns are tried in a fixed priority order and the first one that matches
//! anywhere in the text wins:
//!
//! 1. explicit phrasing: `64x resolution` (also `64x текстуры`, `64x ресурспак`)
//! 2. a dimension pair: `1920x1080`, `16 x 16`
//! 3. a bare multiplier: `16x`
//!
//! The order must not change: it decides which number wins when a description
//! contains several candidates, and therefore which packs pass the filter.

use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static RESOLUTION_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)(\d+)x\s*(?:resolution|текстуры|ресурспак)")
            .expect("valid explicit-resolution regex"),
        Regex::new(r"(?i)(\d+)\s*x\s*\d+").expect("valid dimension-pair regex"),
        Regex::new(r"(?i)(\d+)x").expect("valid multiplier regex"),
    ]
});

/// Extracts the pack resolution from a description, or `0` when no pattern
/// matches.
///
/// Numbers too large for `u32` saturate, so they always exceed any configured
/// maximum.
///
/// # Examples
///
/// ```
/// use harvester_core::filter::extract_resolution;
///
/// assert_eq!(extract_resolution("Download the 64x resolution pack"), 64);
/// assert_eq!(extract_resolution("1920x1080 screenshot"), 1920);
/// assert_eq!(extract_resolution("a nice 16x pack"), 16);
/// assert_eq!(extract_resolution("vanilla but better"), 0);
/// ```
#[must_use]
pub fn extract_resolution(description: &str) -> u32 {
    RESOLUTION_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(description))
        .and_then(|captures| captures.get(1))
        .map_or(0, |digits| digits.as_str().parse().unwrap_or(u32::MAX))
}
