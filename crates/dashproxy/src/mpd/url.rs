use url::Url;

use super::document::Document;
use crate::error::ProxyResult;

pub fn is_absolute_url(s: &str) -> bool {
    s.starts_with("http://")
        || s.starts_with("https://")
        || s.starts_with("file://")
        || s.starts_with("ftp://")
}

pub fn merge_baseurls(current: &Url, new: &str) -> ProxyResult<Url> {
    if is_absolute_url(new) {
        Ok(Url::parse(new)?)
    } else {
        // We are careful to merge the query portion of the current URL (which is either the
        // original manifest URL, or the URL that it redirected to, or the value of a BaseURL
        // element in the manifest) with the new URL. But if the new URL already has a query string,
        // it takes precedence.
        //
        // Examples
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

/// Everything up to and including the last `/` of the path. The query is kept.
pub fn directory_of(url: &Url) -> ProxyResult<Url> {
    let mut directory = url.join("./")?;
    directory.set_query(url.query());
    Ok(directory)
}

/// Base URL that relative segment paths of `mpd` are resolved against.
///
/// Starts from the directory of the manifest URL. A `Location` element replaces it, then an
/// MPD level `BaseURL` either replaces it (absolute) or is appended to it (relative).
pub fn resolve_base_url(manifest_url: &Url, mpd: &Document) -> ProxyResult<Url> {
    let root = mpd.root();
    let mut base_url = directory_of(manifest_url)?;

    if let Some(location) = mpd.find(root, "Location").and_then(|node| mpd.text(node)) {
        base_url = directory_of(&merge_baseurls(manifest_url, location.trim())?)?;
    }

    if let Some(mpd_base_url) = mpd.find(root, "BaseURL").and_then(|node| mpd.text(node)) {
        let mpd_base_url = mpd_base_url.trim();
        base_url = if is_absolute_url(mpd_base_url) {
            directory_of(&Url::parse(mpd_base_url)?)?
        } else {
            merge_baseurls(&base_url, mpd_base_url)?
        };
    }

    Ok(base_url)
}
