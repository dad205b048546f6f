//! Detection script discovery.
//!
//! The protected page embeds the script as a plain
//! `<script type="text/javascript" src="/...">` tag, optionally carrying a
//! nonce. Only that single shape is recognised.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ScriptPathError {
    #[error("no script path found")]
    NotFound,
    #[error("invalid script url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

static SCRIPT_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"<script type="text/javascript"\s+(?:nonce="[^"]*"\s+)?src="([A-Za-z\d/\-_]+)"></script>"#,
    )
    .expect("invalid script path regex")
});

/// Finds the first detection script path in an HTML document.
///
/// The result is a path, eg. `/akam/13/abc`; join it with the site origin
/// yourself or use [`scrape_script_url`].
pub fn scrape_script_path(html: &str) -> Result<String, ScriptPathError> {
    SCRIPT_PATH_RE
        .captures(html)
        .and_then(|captures| captures.get(1))
        .map(|path| path.as_str().to_string())
        .ok_or(ScriptPathError::NotFound)
}

/// Same as [`scrape_script_path`], joined onto the origin of `site`.
pub fn scrape_script_url(html: &str, site: &Url) -> Result<Url, ScriptPathError> {
    let path = scrape_script_path(html)?;
    Ok(site.join(&path)?)
}
