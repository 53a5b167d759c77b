//! Script and folder path validation
//!
//! Script paths live in a flat virtual namespace of the form
//! `/segment/segment/name.sh`. Lookups are exact-string matches against stored
//! paths, so validation only normalizes the leading slash and whitelists
//! characters; it never canonicalizes `.` or `..` segments.

use crate::types::{GateError, Result};

/// Required suffix for every script path
pub const SCRIPT_SUFFIX: &str = ".sh";

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '.' | '-')
}

/// Normalize and validate a script path.
///
/// Rules, applied in order: prepend `/` if absent, require the `.sh` suffix,
/// reject any character outside `[A-Za-z0-9_/.-]`, reject a folder segment
/// ending in `.sh` (it would collide with a script of the same path).
pub fn validate_script_path(raw: &str) -> Result<String> {
    let path = if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("/{raw}")
    };

    if !path.ends_with(SCRIPT_SUFFIX) {
        return Err(GateError::InvalidPath("path must end with .sh".into()));
    }

    if let Some(bad) = path.chars().find(|c| !is_path_char(*c)) {
        return Err(GateError::InvalidPath(format!(
            "path contains invalid character {bad:?}"
        )));
    }

    if let Some((folders, _)) = path.rsplit_once('/') {
        if folders.split('/').any(|segment| segment.ends_with(SCRIPT_SUFFIX)) {
            return Err(GateError::InvalidPath(
                "folder segments must not end with .sh".into(),
            ));
        }
    }

    Ok(path)
}

/// Normalize and validate a folder path.
///
/// Same character whitelist as scripts; a trailing `/` is dropped, no segment
/// may end in `.sh`, and the root itself is not a valid folder record.
pub fn validate_folder_path(raw: &str) -> Result<String> {
    let trimmed = raw.trim_end_matches('/');
    let path = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };

    if path == "/" {
        return Err(GateError::InvalidPath("folder path must not be the root".into()));
    }
    if path.split('/').any(|segment| segment.ends_with(SCRIPT_SUFFIX)) {
        return Err(GateError::InvalidPath("folder segments must not end with .sh".into()));
    }
    if path.contains("//") {
        return Err(GateError::InvalidPath("folder path contains an empty segment".into()));
    }
    if let Some(bad) = path.chars().find(|c| !is_path_char(*c)) {
        return Err(GateError::InvalidPath(format!(
            "path contains invalid character {bad:?}"
        )));
    }

    Ok(path)
}

/// Last segment of a path (`/a/b/c.sh` -> `c.sh`)
pub fn leaf_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parent of a path; top-level entries have `/` as parent
pub fn parent_path(path: &str) -> String {
    match path.trim_start_matches('/').rsplit_once('/') {
        Some((parent, _)) => format!("/{parent}"),
        None => "/".to_string(),
    }
}

/// Every proper ancestor folder of a path, shallowest first, with its name.
///
/// `/a/b/c.sh` yields `[("/a", "a"), ("/a/b", "b")]`. Empty segments
/// produced by doubled slashes are skipped.
pub fn ancestor_folders(path: &str) -> Vec<(String, String)> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() <= 1 {
        return Vec::new();
    }

    let mut prefix = String::new();
    segments[..segments.len() - 1]
        .iter()
        .map(|segment| {
            prefix.push('/');
            prefix.push_str(segment);
            (prefix.clone(), segment.to_string())
        })
        .collect()
}
