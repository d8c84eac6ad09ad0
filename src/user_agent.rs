//! Shared User-Agent strings for search and download HTTP clients.
//!
//! Sources may override the User-Agent through their configured headers; these
//! defaults apply when a source does not.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/CharlesPikachu/musicdl";

/// Browser-like User-Agent sent to music CDNs that reject tool identifiers.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default User-Agent for download requests.
#[must_use]
pub(crate) fn default_download_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("musicdl/{version} (+{PROJECT_UA_URL})")
}

/// Default User-Agent for source search requests.
#[must_use]
pub(crate) fn default_search_user_agent() -> String {
    BROWSER_USER_AGENT.to_string()
}
