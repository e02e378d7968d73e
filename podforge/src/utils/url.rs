//! URL validation and classification helpers.

use std::path::PathBuf;

use url::Url;

use crate::{Error, Result};

/// Validate that `raw` is an absolute http(s) URL.
pub fn require_http_url(raw: &str) -> Result<Url> {
    let parsed =
        Url::parse(raw).map_err(|e| Error::invalid_input(format!("malformed URL '{raw}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(Error::invalid_input(format!(
            "unsupported URL scheme '{other}' in '{raw}'"
        ))),
    }
}

/// Resolve a reference that may point at a local file.
///
/// Returns the local path for `file://` URLs and for plain paths that exist
/// on disk; remote http(s) references return `None`.
pub fn as_local_path(reference: &str) -> Option<PathBuf> {
    if let Ok(parsed) = Url::parse(reference) {
        return match parsed.scheme() {
            "file" => parsed.to_file_path().ok(),
            _ => None,
        };
    }
    let path = PathBuf::from(reference);
    path.exists().then_some(path)
}
