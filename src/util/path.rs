/// Turns a configured prefix into its key form: no leading slash, exactly one
/// trailing slash, or empty.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// `prefix` must already be normalized.
pub fn apply_prefix(prefix: &str, path: &str) -> String {
    format!("{}{}", prefix, path.trim_start_matches('/'))
}

/// `prefix` must already be normalized. Keys outside the prefix come back
/// unchanged.
pub fn remove_prefix<'a>(prefix: &str, key: &'a str) -> &'a str {
    key.strip_prefix(prefix).unwrap_or(key)
}

/// Directory paths end in exactly one slash unless they are the root.
pub fn normalize_dir(directory: &str) -> String {
    if directory.is_empty() {
        return String::new();
    }

    format!("{}/", directory.trim_end_matches('/'))
}

pub fn is_dir_key(key: &str) -> bool {
    key.ends_with('/')
}
