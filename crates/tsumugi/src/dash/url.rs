use std::collections::HashSet;

use url::Url;

use crate::error::TsumugiResult;

pub(crate) fn is_absolute_url(s: &str) -> bool {
    s.starts_with("http://")
        || s.starts_with("https://")
        || s.starts_with("file://")
        || s.starts_with("ftp://")
}

/// Drop every repeated non-empty path segment, keeping its first occurrence.
///
/// Some players hand out media URLs with the asset UUID doubled in the path
/// (`/v/3f2a/3f2a/manifest.mpd`), which the origin answers with 404. Empty segments are kept
/// where they are, so leading, trailing and doubled slashes survive.
pub fn remove_duplicate_path_segments(url: &str) -> TsumugiResult<Url> {
    let mut url = Url::parse(url)?;

    let mut seen = HashSet::new();
    let path = url
        .path()
        .split('/')
        .filter(|segment| segment.is_empty() || seen.insert(*segment))
        .collect::<Vec<_>>()
        .join("/");
    url.set_path(&path);

    Ok(url)
}

/// Directory URL that relative segment names are resolved against.
///
/// This is the directory of the manifest URL, keeping its query, or the MPD-level `BaseURL`
/// resolved against it.
pub fn base_url(manifest_url: &Url, mpd_base_url: Option<&str>) -> TsumugiResult<Url> {
    let mut base = manifest_url.join("./")?;
    base.set_query(manifest_url.query());
    base.set_fragment(None);

    match mpd_base_url.map(str::trim).filter(|s| !s.is_empty()) {
        Some(mpd_base_url) => merge_baseurls(&base, mpd_base_url),
        None => Ok(base),
    }
}

pub fn merge_baseurls(current: &Url, new: &str) -> TsumugiResult<Url> {
    if is_absolute_url(new) {
        Ok(Url::parse(new)?)
    } else {
        // The query of the current URL (the manifest URL or a BaseURL) is carried over, unless
        // the new URL has one of its own.
        //
        // merge_baseurls(https://example.com/manifest.mpd?auth=secret, /video42.mp4) =>
        //   https://example.com/video42.mp4?auth=secret
        //
        // merge_baseurls(https://example.com/manifest.mpd?auth=old, /video42.mp4?auth=new) =>
        //   https://example.com/video42.mp4?auth=new
        let mut merged = current.join(new)?;
        if merged.query().is_none() {
            merged.set_query(current.query());
        }
        Ok(merged)
    }
}
