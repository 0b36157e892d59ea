use std::path::{Component, Path, PathBuf};

use crate::{error::ProxyResult, mpd::url::is_absolute_url};

/// The directory a stream is mirrored into.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// Create `relative` and all of its parents. Existing directories are not an error.
    pub async fn ensure_dir(&self, relative: &Path) -> ProxyResult<PathBuf> {
        let path = self.resolve(relative);
        tokio::fs::create_dir_all(&path).await?;
        Ok(path)
    }

    /// Write `contents` to `relative`, replacing any existing file.
    pub async fn write(&self, relative: &Path, contents: &[u8]) -> ProxyResult<PathBuf> {
        let path = self.resolve(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }
}

/// Local path of a downloaded file, relative to the output directory.
///
/// `subdir` is the period `BaseURL` (ignored when it is an absolute URL), `rendered` the
/// rendered template. Query strings and fragments are dropped, and `..` or root components
/// can not escape the output directory.
pub fn segment_path(subdir: Option<&str>, rendered: &str) -> PathBuf {
    let mut path = PathBuf::new();
    if let Some(subdir) = subdir.filter(|s| !is_absolute_url(s)) {
        push_sanitized(&mut path, strip_query(subdir));
    }

    let rendered = strip_query(rendered);
    if is_absolute_url(rendered) {
        match url::Url::parse(rendered) {
            Ok(url) => push_sanitized(&mut path, url.path()),
            Err(_) => push_sanitized(&mut path, rendered),
        }
    } else {
        push_sanitized(&mut path, rendered);
    }
    path
}

fn strip_query(s: &str) -> &str {
    s.split(['?', '#']).next().unwrap_or(s)
}

fn push_sanitized(path: &mut PathBuf, relative: &str) {
    for component in Path::new(relative).components() {
        if let Component::Normal(part) = component {
            path.push(part);
        }
    }
}
