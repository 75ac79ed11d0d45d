//! Ref path validation following git-style conventions.
//!
//! Valid ref paths:
//! - Must start with `refs/` and have at least one component after it
//! - Must not contain whitespace, control characters, `~`, `^`, `:`, `?`,
//!   `*`, `[`, `\`
//! - Must not contain `..` or `@{`
//! - Must not end with `/`, `.` or `.lock`
//! - Must not contain consecutive slashes (`//`)
//! - Components must be non-empty and must not start with `.`

use crate::error::{RefError, Result};

/// Characters that are forbidden anywhere in a ref path or remote name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

const REFS_PREFIX: &str = "refs/";

fn invalid_ref(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidRefName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a full ref path such as `refs/build-number/android`.
///
/// # Examples
///
/// ```
/// use buildnum_refs::names::validate_ref_name;
///
/// assert!(validate_ref_name("refs/heads/main").is_ok());
/// assert!(validate_ref_name("refs/build-number/default").is_ok());
/// assert!(validate_ref_name("main").is_err());
/// assert!(validate_ref_name("refs/bad..name").is_err());
/// ```
pub fn validate_ref_name(name: &str) -> Result<()> {
    let Some(rest) = name.strip_prefix(REFS_PREFIX) else {
        return Err(invalid_ref(name, "must start with 'refs/'"));
    };
    if rest.is_empty() {
        return Err(invalid_ref(name, "must name a ref below 'refs/'"));
    }

    if let Some(ch) = name
        .chars()
        .find(|c| FORBIDDEN_CHARS.contains(c) || c.is_control())
    {
        return Err(invalid_ref(name, format!("contains forbidden character: {ch:?}")));
    }
    if name.contains("..") {
        return Err(invalid_ref(name, "must not contain '..'"));
    }
    if name.contains("@{") {
        return Err(invalid_ref(name, "must not contain '@{'"));
    }
    if name.ends_with('/') || name.ends_with('.') {
        return Err(invalid_ref(name, "must not end with '/' or '.'"));
    }
    if name.ends_with(".lock") {
        return Err(invalid_ref(name, "must not end with '.lock'"));
    }
    if name.contains("//") {
        return Err(invalid_ref(name, "must not contain consecutive slashes '//'"));
    }

    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid_ref(name, "path components must not be empty"));
        }
        if component.starts_with('.') {
            return Err(invalid_ref(
                name,
                format!("component must not start with '.': {component:?}"),
            ));
        }
    }

    Ok(())
}

/// Validate a remote name. Must be a simple identifier (no slashes).
pub fn validate_remote_name(name: &str) -> Result<()> {
    let invalid = |reason: String| RefError::InvalidRemoteName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("remote name must not be empty".into()));
    }
    if name.contains('/') {
        return Err(invalid("remote name must not contain '/'".into()));
    }
    if name.starts_with('.') || name.contains("..") {
        return Err(invalid("remote name must not start with '.' or contain '..'".into()));
    }
    if let Some(ch) = name
        .chars()
        .find(|c| FORBIDDEN_CHARS.contains(c) || c.is_control())
    {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }
    Ok(())
}

/// The last path component of a ref, e.g. `android` for
/// `refs/build-number/android`.
pub fn short_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
