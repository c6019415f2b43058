//! Archive index parsing.

/// Parses the archive index body into archive paths, oldest first.
///
/// The index is one path per line. Surrounding whitespace is trimmed and
/// blank lines are skipped; order is preserved.
#[must_use]
pub fn parse_index(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
