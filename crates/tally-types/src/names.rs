//! Path and name rules for booked entries.
//!
//! Paths are directory-like and absolute:
//! - Must start with `/`
//! - A missing trailing `/` is appended (`/metrics` becomes `/metrics/`)
//! - Must not contain empty components (`//`)
//! - Must not contain `.` or `..` components
//! - Must not contain whitespace or control characters
//!
//! Names are the leaf of the hierarchy:
//! - Must be non-empty and must not be `.` or `..`
//! - Must not contain `/`, whitespace or control characters

use crate::error::{TypeError, TypeResult};

fn has_forbidden_char(s: &str) -> Option<char> {
    s.chars().find(|c| c.is_whitespace() || c.is_control())
}

/// Validate a path and return it in canonical `/a/b/` form.
///
/// # Examples
///
/// ```
/// use tally_types::names::normalize_path;
///
/// assert_eq!(normalize_path("/metrics").unwrap(), "/metrics/");
/// assert_eq!(normalize_path("/").unwrap(), "/");
/// assert!(normalize_path("metrics/").is_err());
/// assert!(normalize_path("/a//b/").is_err());
/// ```
pub fn normalize_path(path: &str) -> TypeResult<String> {
    let invalid = |reason: String| TypeError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    if !path.starts_with('/') {
        return Err(invalid("path must start with '/'".into()));
    }
    if let Some(ch) = has_forbidden_char(path) {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }

    let trimmed = path.trim_end_matches('/');
    if trimmed.len() + 1 < path.len() {
        return Err(invalid("must not contain consecutive slashes '//'".into()));
    }

    // `trimmed` is empty for the root path.
    for component in trimmed.split('/').skip(1) {
        if component.is_empty() {
            return Err(invalid("must not contain consecutive slashes '//'".into()));
        }
        if component == "." || component == ".." {
            return Err(invalid(format!("relative component {component:?}")));
        }
    }

    let mut canonical = trimmed.to_string();
    canonical.push('/');
    Ok(canonical)
}

/// Validate a leaf name.
///
/// ```
/// use tally_types::names::validate_name;
///
/// assert!(validate_name("events").is_ok());
/// assert!(validate_name("a/b").is_err());
/// ```
pub fn validate_name(name: &str) -> TypeResult<()> {
    let invalid = |reason: String| TypeError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name must not be empty".into()));
    }
    if name == "." || name == ".." {
        return Err(invalid("name must not be a relative component".into()));
    }
    if name.contains('/') {
        return Err(invalid("name must not contain '/'".into()));
    }
    if let Some(ch) = has_forbidden_char(name) {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }
    Ok(())
}

/// Iterate over the directory components of a canonical path.
///
/// `"/detector/tracks/"` yields `"detector"` then `"tracks"`; the root path
/// yields nothing.
pub fn path_components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}
