//! Plain-text rendering of search results and source listings.

use std::fmt::Write as _;

use musicdl_core::{ResultIndex, SourceDescriptor, SourceRegistry, SourceReport};

const SONG_WIDTH: usize = 32;
const SINGER_WIDTH: usize = 20;
const ALBUM_WIDTH: usize = 20;
const SOURCE_WIDTH: usize = 14;

/// Renders one line per row: `#  Singer  Song  Size  Duration  Album  Source`.
pub(crate) fn render_results(index: &ResultIndex, registry: &SourceRegistry) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>3}  {}  {}  {:>9}  {:>8}  {}  {}",
        "#",
        pad("Singer", SINGER_WIDTH),
        pad("Song", SONG_WIDTH),
        "Size",
        "Duration",
        pad("Album", ALBUM_WIDTH),
        "Source",
    );
    for (ordinal, track) in index.iter() {
        let source = registry
            .display_name_for(&track.source)
            .unwrap_or_else(|| track.source.to_string());
        let _ = writeln!(
            out,
            "{:>3}  {}  {}  {:>9}  {:>8}  {}  {}",
            ordinal,
            pad(&track.singers, SINGER_WIDTH),
            pad(&track.song_name, SONG_WIDTH),
            clip(&track.file_size, 9),
            clip(&track.duration, 8),
            pad(&track.album, ALBUM_WIDTH),
            clip(&source, SOURCE_WIDTH),
        );
    }
    out
}

/// One line per failed source, for the summary under the table.
pub(crate) fn render_failures(reports: &[SourceReport], registry: &SourceRegistry) -> String {
    let mut out = String::new();
    for report in reports.iter().filter(|r| r.failed()) {
        let name = registry
            .display_name_for(&report.source)
            .unwrap_or_else(|| report.source.to_string());
        let _ = writeln!(
            out,
            "! {name}: {}",
            report.failure.as_deref().unwrap_or("failed")
        );
    }
    out
}

/// `id  display name` per registered source.
pub(crate) fn render_sources(descriptors: &[SourceDescriptor]) -> String {
    let width = descriptors
        .iter()
        .map(|d| d.id.as_str().chars().count())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for descriptor in descriptors {
        let _ = writeln!(
            out,
            "{:<width$}  {}",
            descriptor.id.as_str(),
            descriptor.display_name
        );
    }
    out
}

/// Truncates to `width` chars, marking the cut with `…`.
fn clip(value: &str, width: usize) -> String {
    let value = value.trim();
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut clipped: String = value.chars().take(width.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

fn pad(value: &str, width: usize) -> String {
    format!("{:<width$}", clip(value, width))
}
