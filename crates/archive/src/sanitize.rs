use std::path::{Component, Path, PathBuf};

use crate::ExtractionError;

/// Splits a raw entry name into path segments.
///
/// Backslashes count as separators; empty and `.` segments are dropped.
/// Returns `None` for absolute names: a leading separator or a drive
/// prefix such as `C:`.
pub(crate) fn entry_segments(raw: &str) -> Option<Vec<String>> {
    let normalized = raw.replace('\\', "/");
    if normalized.starts_with('/') || has_drive_prefix(&normalized) {
        return None;
    }

    Some(
        normalized
            .split('/')
            .filter(|seg| !seg.is_empty() && *seg != ".")
            .map(str::to_string)
            .collect(),
    )
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Drops the first segment when every entry has at least two segments and
/// all of them share it. Returns the stripped segment.
pub(crate) fn strip_common_root(entries: &mut [Vec<String>]) -> Option<String> {
    let first = entries.first()?.first()?.clone();
    let shared = entries
        .iter()
        .all(|segments| segments.len() >= 2 && segments[0] == first);
    if !shared {
        return None;
    }

    for segments in entries.iter_mut() {
        segments.remove(0);
    }
    Some(first)
}

/// Resolves `segments` lexically under `dest`.
///
/// `..` pops a previously pushed segment; popping past `dest` or ending on
/// `dest` itself yields `None`, as does any segment that is not a plain
/// file name on this platform.
pub(crate) fn resolve_within(dest: &Path, segments: &[String]) -> Option<PathBuf> {
    let mut relative: Vec<&str> = Vec::with_capacity(segments.len());
    for seg in segments {
        if seg == ".." {
            relative.pop()?;
            continue;
        }
        if !is_file_name(seg) {
            return None;
        }
        relative.push(seg);
    }

    if relative.is_empty() {
        return None;
    }

    let mut path = dest.to_path_buf();
    path.extend(relative);
    Some(path)
}

fn is_file_name(segment: &str) -> bool {
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Checks that a caller-supplied base name is a single plain file name.
pub(crate) fn validate_base_name(name: &str) -> Result<(), ExtractionError> {
    if name.is_empty() {
        return Err(ExtractionError::InvalidBaseName("empty name".into()));
    }
    if name.contains(['/', '\\']) || has_drive_prefix(name) || !is_file_name(name) {
        return Err(ExtractionError::InvalidBaseName(name.to_string()));
    }
    Ok(())
}
