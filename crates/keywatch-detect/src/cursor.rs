//! Resume cursor over the remote archive index.

/// Returns the index of the first archive after `last_processed`.
///
/// Starts from zero when `last_processed` is not in the index, either because
/// nothing was processed yet or because the server rotated it out.
#[must_use]
pub fn start_index(remote_paths: &[String], last_processed: &str) -> usize {
    remote_paths
        .iter()
        .position(|path| path == last_processed)
        .map_or(0, |idx| (idx + 1).min(remote_paths.len()))
}

/// Selects the contiguous run of archives to process next.
///
/// The result starts right after `last_processed` and holds at most
/// `capacity` paths.
#[must_use]
pub fn select_targets(remote_paths: &[String], last_processed: &str, capacity: u32) -> Vec<String> {
    let start = start_index(remote_paths, last_processed);
    let end = start
        .saturating_add(capacity as usize)
        .min(remote_paths.len());

    remote_paths[start..end].to_vec()
}
