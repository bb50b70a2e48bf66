use crate::error::{Error, Result};

/// Join `path` onto an optional remote base directory.
///
/// Absolute paths win over the base; without a base a relative path is
/// returned as-is (resolved against the login directory by the remote shell).
pub fn join_remote_path(base_path: Option<&str>, path: &str) -> Result<String> {
    let path = path.trim();

    if path.is_empty() {
        return Err(Error::validation_invalid_argument(
            "path",
            "Path cannot be empty",
            None,
            None,
        ));
    }

    if path.starts_with('/') {
        return Ok(path.to_string());
    }

    let Some(base) = base_path.map(str::trim).filter(|b| !b.is_empty()) else {
        return Ok(path.to_string());
    };

    if base.ends_with('/') {
        Ok(format!("{}{}", base, path))
    } else {
        Ok(format!("{}/{}", base, path))
    }
}

/// Last path segment of a URL or remote path, ignoring query strings.
pub fn basename(path: &str) -> &str {
    let without_query = path.split(['?', '#']).next().unwrap_or(path);
    let trimmed = without_query.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
