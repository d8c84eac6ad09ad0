//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Search several music sources at once and download a track.
///
/// Results from every enabled source are listed with a row number; pick a
/// row with `--pick` or at the prompt to download it.
#[derive(Parser, Debug)]
#[command(name = "musicdl")]
#[command(author, version, about)]
pub struct Args {
    /// Keyword to search for (song, artist or album; may be several words)
    #[arg(value_name = "KEYWORD")]
    pub keyword: Vec<String>,

    /// Source to query, by id or display name (repeatable; default: last used, else all)
    #[arg(short = 's', long = "source", value_name = "SOURCE")]
    pub sources: Vec<String>,

    /// Row number to download without prompting
    #[arg(short, long, value_name = "ROW")]
    pub pick: Option<usize>,

    /// Directory to save downloads into (remembered for next time)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Source configuration file (default: $XDG_CONFIG_HOME/musicdl/sources.json)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Preferences file (default: $XDG_CONFIG_HOME/musicdl/config.json)
    #[arg(long, value_name = "FILE")]
    pub prefs: Option<PathBuf>,

    /// Verify TLS certificates of download hosts
    #[arg(long)]
    pub strict_tls: bool,

    /// List configured sources and exit
    #[arg(long)]
    pub list_sources: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// The search keyword, words joined by single spaces.
    ///
    /// `None` when no keyword words were given at all; an explicit empty
    /// string (`musicdl ""`) is a valid, if unproductive, query.
    pub fn keyword(&self) -> Option<String> {
        if self.keyword.is_empty() {
            None
        } else {
            Some(self.keyword.join(" "))
        }
    }
}
