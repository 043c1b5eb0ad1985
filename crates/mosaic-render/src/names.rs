//! Handle and template-name helpers.

use std::path::Path;

/// Returns true if `location` is a handle (starts with the handle prefix).
pub fn is_handle(location: &str, prefix: &str) -> bool {
    !prefix.is_empty() && location.starts_with(prefix)
}

/// Strips the handle prefix, if present.
pub fn bare_handle<'a>(handle: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return handle;
    }
    handle.strip_prefix(prefix).unwrap_or(handle)
}

/// Formats a bare handle as a template name (`card` -> `@card`).
pub fn prefixed_handle(handle: &str, prefix: &str) -> String {
    format!("{prefix}{}", bare_handle(handle, prefix))
}

/// The path of `path` relative to `root`, with `/` separators.
///
/// Paths outside `root` are returned unchanged.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let Ok(relative) = path.strip_prefix(root) else {
        return path.to_string_lossy().into_owned();
    };
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
