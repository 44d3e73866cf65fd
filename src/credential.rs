//! Credential gate for the Groq API key.
//!
//! The key is an opaque string. It is never logged or echoed whole: both
//! `Debug` and `Display` render the masked form.

use crate::config::RuntimeConfig;
use crate::error::{Result, SheetMindError};
use std::fmt;

/// Blocking notice shown whenever no usable credential is present.
pub const MISSING_KEY_NOTICE: &str = "⚠️ Debes introducir tu Groq API Key para continuar.";

/// A validated, non-placeholder API key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Accept a raw value, rejecting empty and placeholder strings.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if is_placeholder(&raw) {
            None
        } else {
            Some(Self(raw.trim().to_string()))
        }
    }

    /// The raw key, for request authorization only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Stable content fingerprint used for agent cache keying.
    pub fn fingerprint(&self) -> String {
        blake3::hash(self.0.as_bytes()).to_hex().to_string()
    }

    /// Masked rendition safe for logs and UI echoes.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "****".to_string();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", head, tail)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", self.masked())
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

/// Placeholder values count as absent, not as credentials.
fn is_placeholder(s: &str) -> bool {
    let t = s.trim();
    t.is_empty()
        || t.contains("${")
        || t.eq_ignore_ascii_case("your-api-key-here")
        || t.eq_ignore_ascii_case("changeme")
}

/// Resolve the effective credential for one interaction.
///
/// Order: session-supplied value first, then the GROQ_API_KEY environment
/// fallback captured in the runtime config. Absence blocks everything
/// downstream; the caller must not touch the table or the agent afterwards.
pub fn resolve(session_key: Option<&ApiKey>, runtime: &RuntimeConfig) -> Result<ApiKey> {
    if let Some(key) = session_key {
        return Ok(key.clone());
    }
    if let Some(key) = runtime.groq_api_key.as_deref().and_then(ApiKey::new) {
        return Ok(key);
    }
    Err(SheetMindError::Credential {
        message: MISSING_KEY_NOTICE.to_string(),
    })
}
