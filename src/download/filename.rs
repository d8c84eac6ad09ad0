//! Filename sanitization and destination path resolution for downloads.
//!
//! Track titles come straight from third-party backends, so they are treated
//! as untrusted: the result is always a single path segment that stays inside
//! the destination directory.

use std::path::{Component, Path, PathBuf};

use super::constants::{MAX_FILENAME_BYTES, PARTIAL_SUFFIX};
use super::error::DownloadError;

/// Device names Windows refuses as filenames, with or without an extension.
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Stem used when the song name sanitizes to nothing.
const FALLBACK_STEM: &str = "track";

/// Sanitizes a filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems
/// (`/ \ : * ? " < > |`) and control characters with `_`, trims leading and
/// trailing dots and spaces (no hidden files, no `..`), and escapes Windows
/// device names.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let sanitized = sanitized
        .trim_end_matches(['.', ' '])
        .trim_start_matches(['.', ' ']);

    if sanitized.is_empty() {
        return "_".to_string();
    }

    let sanitized = if is_safe_filename_segment(sanitized) {
        sanitized.to_string()
    } else {
        sanitized.replace('.', "_")
    };

    if is_windows_reserved(&sanitized) {
        format!("_{sanitized}")
    } else {
        sanitized
    }
}

/// Builds the on-disk filename `sanitize(song_name + "." + ext)`.
///
/// The extension is sanitized separately so a hostile `ext` cannot smuggle in
/// separators, and the stem is shortened (on a char boundary) so the whole
/// name fits [`MAX_FILENAME_BYTES`].
#[must_use]
pub fn track_filename(song_name: &str, ext: &str) -> String {
    let ext = sanitize_filename(ext.trim().trim_start_matches('.'));
    let ext = truncate_to_bytes(&ext, 16);
    let stem = song_name.trim();
    let stem = if stem.is_empty() || sanitize_filename(stem).trim_matches('_').is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem.to_string()
    };

    let budget = MAX_FILENAME_BYTES.saturating_sub(ext.len() + 1);
    let stem = truncate_to_bytes(&stem, budget);
    sanitize_filename(&format!("{stem}.{ext}"))
}

/// Joins `filename` under `dir`, refusing anything but a direct child.
pub(crate) fn destination_path(dir: &Path, filename: &str) -> Result<PathBuf, DownloadError> {
    let mut components = Path::new(filename).components();
    let is_single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !is_single_normal {
        return Err(DownloadError::UnsafePath {
            dir: dir.to_path_buf(),
            name: filename.to_string(),
        });
    }
    Ok(dir.join(filename))
}

/// Path of the hidden in-progress sibling of `final_path`.
pub(crate) fn partial_path(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    final_path.with_file_name(format!(".{name}{PARTIAL_SUFFIX}"))
}

fn truncate_to_bytes(value: &str, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

fn is_windows_reserved(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name).trim_end();
    WINDOWS_RESERVED_NAMES
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
