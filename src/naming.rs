//! Conflict-safe naming helpers.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::metadata::split_name;

static NUMBERED_SUFFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(.*?) \((\d+)\)$").ok());

/// Returns a path that does not collide with an unrelated existing file.
///
/// `target` comes back unchanged when it is free or when it already is the
/// file being moved (`excluding_self`). Otherwise any trailing `" (n)"` is
/// stripped from the stem and `"stem (1).ext"`, `"stem (2).ext"`, ... are
/// probed until a free name turns up.
pub fn unique_path(target: &Path, excluding_self: Option<&Path>) -> PathBuf {
    if !target.exists() {
        return target.to_path_buf();
    }
    if let Some(own) = excluding_self
        && is_same_file(target, own)
    {
        return target.to_path_buf();
    }

    let parent = target.parent().unwrap_or_else(|| Path::new(""));
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, extension) = split_name(&file_name);
    let base = strip_numbered_suffix(&stem);

    let mut n: u64 = 1;
    loop {
        let candidate_name = if extension.is_empty() {
            format!("{base} ({n})")
        } else {
            format!("{base} ({n}).{extension}")
        };
        let candidate = parent.join(candidate_name);
        let is_own = excluding_self.is_some_and(|own| is_same_file(&candidate, own));
        if !candidate.exists() || is_own {
            return candidate;
        }
        n += 1;
    }
}

/// Strips a trailing `" (n)"` from a file stem.
pub fn strip_numbered_suffix(stem: &str) -> String {
    NUMBERED_SUFFIX
        .as_ref()
        .and_then(|re| re.captures(stem))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| stem.to_string())
}

/// True when both paths name the same file on disk.
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return a.exists();
    }
    same_file_identity(a, b)
}

#[cfg(unix)]
fn same_file_identity(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_file_identity(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(ca), Ok(cb)) => {
            ca == cb || ca.to_string_lossy().to_lowercase() == cb.to_string_lossy().to_lowercase()
        }
        _ => false,
    }
}

/// True when the paths differ only by letter case.
///
/// A plain rename between such paths is a no-op on case-insensitive
/// filesystems, so the executor routes it through a temporary name.
pub fn is_case_only_change(from: &Path, to: &Path) -> bool {
    from != to && from.to_string_lossy().to_lowercase() == to.to_string_lossy().to_lowercase()
}

/// Temporary sibling name used for two-step renames.
pub fn temporary_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_name = format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple());
    path.with_file_name(temp_name)
}
