//! Free-standing helpers around the provider I/O.
//!
//! - [`cookies`]: `_abck` cookie state checks
//! - [`script`]: detection script discovery in HTML
//! - [`xor`]: repeating-key XOR used to decrypt obfuscated responses

pub mod cookies;
pub mod script;
pub mod xor;

pub use cookies::{is_cookie_no_longer_valid, is_cookie_valid};
pub use script::{ScriptPathError, scrape_script_path, scrape_script_url};
pub use xor::xor;
