//! Project path helpers. Project paths are `/`-rooted and use `/` on every platform.

/// Collapses `.`, `..` and repeated separators, always yielding a rooted path.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Resolves `reference` the way ordering attributes do: absolute references
/// are project paths, anything else is relative to `base_dir`.
pub fn resolve(base_dir: &str, reference: &str) -> String {
    if reference.starts_with('/') {
        normalize(reference)
    } else {
        normalize(&format!("{base_dir}/{reference}"))
    }
}

/// True when `dir` equals `parent` or is nested under it.
pub fn is_within(dir: &str, parent: &str) -> bool {
    if parent == "/" {
        return true;
    }
    dir == parent
        || dir
            .strip_prefix(parent)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}
