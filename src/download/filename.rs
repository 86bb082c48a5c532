//! Local file naming for downloaded artifacts.

use std::collections::HashSet;
use std::path::{Component, Path};

use url::Url;

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
/// Dot-only names (`.`, `..`) are rewritten so they cannot escape the
/// destination directory.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Local filename for `url`: its final path segment, percent-decoded and
/// sanitized, or `None` when the path has no usable final segment.
pub(crate) fn filename_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    if decoded.trim().is_empty() {
        return None;
    }
    Some(sanitize_filename(&decoded))
}

/// Filename used when the URL has no usable segment; `index` is the link's
/// position in the list so concurrent fallbacks never collide.
pub(crate) fn fallback_filename(index: usize) -> String {
    format!("download_{index}.bin")
}

/// Claims a filename not yet in `taken` within one batch.
///
/// Example: `pack.zip`, then `pack_2.zip`, `pack_3.zip`, ...
pub(crate) fn claim_unique_name(filename: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(filename.clone()) {
        return filename;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename.as_str(), ""),
    };

    let mut suffix = 2usize;
    loop {
        let candidate = format!("{stem}_{suffix}{ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}
