//! Key server URL construction.

use keywatch_types::FetchError;

/// Resolves an index entry against the archive host.
///
/// Entries that are already absolute URLs are returned unchanged. Relative
/// entries are joined to `base` with exactly one `/` between them.
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] if the entry is empty or the base is
/// not an http(s) URL.
///
/// # Example
///
/// ```
/// use keywatch_fetch::url::archive_url;
///
/// let url = archive_url("https://keys.example.org/", "/mn/2020-08-01.zip").unwrap();
/// assert_eq!(url, "https://keys.example.org/mn/2020-08-01.zip");
/// ```
pub fn archive_url(base: &str, path: &str) -> Result<String, FetchError> {
    let path = path.trim();
    if path.is_empty() {
        return Err(FetchError::InvalidUrl("empty archive path".to_string()));
    }
    if is_http(path) {
        return Ok(path.to_string());
    }
    if !is_http(base) {
        return Err(FetchError::InvalidUrl(format!(
            "archive host '{base}' is not an http(s) URL"
        )));
    }

    Ok(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    ))
}

fn is_http(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}
