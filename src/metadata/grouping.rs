use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use super::extract::strip_leading_noise;
use super::VideoMetadata;

static NON_SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9\s-]").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Derives the key that clusters uploads of the same series season (or the
/// same movie), e.g. `series-breaking-bad-s01-e05` or `movie-the-matrix`.
///
/// Returns `None` when no usable name can be found. Only ASCII letters and
/// digits survive sanitizing, so a purely Arabic title is ungroupable.
pub fn build_grouping_key(
    metadata: &VideoMetadata,
    caption: Option<&str>,
    file_name: Option<&str>,
) -> Option<String> {
    let base = match metadata.series_name.as_deref() {
        Some(name) => name.trim().to_string(),
        None => base_name_from_upload(caption, file_name),
    };
    if base.is_empty() {
        return None;
    }

    let name = slugify(&base);
    if name.is_empty() {
        return None;
    }

    if metadata.season_number.is_none() && metadata.episode_number.is_none() {
        return Some(format!("movie-{name}"));
    }

    let mut key = format!("series-{name}");
    if let Some(season) = metadata.season_number {
        key.push_str(&format!("-s{season:02}"));
    }
    if let Some(episode) = metadata.episode_number {
        key.push_str(&format!("-e{episode:02}"));
    }
    Some(key)
}

/// First caption line with leading numbering stripped; the file name stem
/// stands in when there is no caption at all.
fn base_name_from_upload(caption: Option<&str>, file_name: Option<&str>) -> String {
    let first_line = caption
        .unwrap_or_default()
        .split('\n')
        .next()
        .unwrap_or_default();
    if !first_line.trim().is_empty() {
        return strip_leading_noise(first_line).to_string();
    }

    let stem = file_name
        .map(Path::new)
        .and_then(Path::file_stem)
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .replace(['.', '_'], " ");
    strip_leading_noise(&stem).to_string()
}

fn slugify(name: &str) -> String {
    let kept = NON_SLUG_RE.replace_all(name, "");
    WHITESPACE_RE
        .replace_all(kept.trim(), "-")
        .to_lowercase()
}
