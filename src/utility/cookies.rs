//! `_abck` cookie inspection.
//!
//! The cookie value is a `~`-separated list of fields. Malformed values are
//! never an error: they simply cannot confirm either state.

const FIELD_SEPARATOR: char = '~';

/// Returns true when the `_abck` cookie is accepted by the protected site.
///
/// Requires at least two fields; the second one must be `0`.
pub fn is_cookie_valid(abck: &str) -> bool {
    abck.split(FIELD_SEPARATOR).nth(1) == Some("0")
}

/// Returns true when the `_abck` cookie has not been invalidated.
///
/// Requires at least four fields; an invalidated cookie carries `-1` in the
/// fourth one.
pub fn is_cookie_no_longer_valid(abck: &str) -> bool {
    matches!(abck.split(FIELD_SEPARATOR).nth(3), Some(field) if field != "-1")
}
