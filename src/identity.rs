//! OpenID identifiers and their normalization
//!
//! Every identifier that reaches a record, a login attempt or the verifier
//! has been through an [`IdentityNormalizer`]. The default
//! [`OpenIdNormalizer`] canonicalizes URLs and passes XRIs through.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

static XRI_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^xri://").unwrap());

/// Leading characters of an XRI global context symbol or cross-reference
const XRI_PREFIXES: [char; 6] = ['=', '@', '+', '$', '!', '('];

/// A normalized OpenID identifier (URL or XRI)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap an identifier that is already in normalized form.
    ///
    /// Stores and verifiers use this when handing back identifiers they
    /// previously received from a normalizer.
    #[must_use]
    pub fn new(normalized: impl Into<String>) -> Self {
        Self(normalized.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Whether this identity is an XRI rather than a URL
    #[must_use]
    pub fn is_xri(&self) -> bool {
        self.0.starts_with(&XRI_PREFIXES[..])
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A user-supplied identifier that cannot be used for OpenID
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{input} is not an OpenID identifier")]
pub struct NormalizationError {
    pub input: String,
}

impl NormalizationError {
    fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
        }
    }
}

/// Canonicalizes user input into an [`Identity`]
pub trait IdentityNormalizer: Send + Sync {
    /// Normalize a non-blank identifier
    ///
    /// # Errors
    ///
    /// Returns an error if the input is neither a usable URL nor an XRI
    fn normalize(&self, raw: &str) -> Result<Identity, NormalizationError>;
}

/// Default normalizer following the OpenID 2.0 identifier rules
///
/// - surrounding whitespace and a leading `xri://` are removed
/// - XRIs (`=name`, `@org`, ...) are returned unchanged
/// - anything else is treated as a URL: `http://` is assumed when no
///   `http(s)` scheme is given, the fragment is dropped, and scheme and host
///   are lower-cased with an explicit root path
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenIdNormalizer;

impl IdentityNormalizer for OpenIdNormalizer {
    fn normalize(&self, raw: &str) -> Result<Identity, NormalizationError> {
        let trimmed = raw.trim();
        let identifier = XRI_SCHEME.replace(trimmed, "");
        let identifier = identifier.trim();

        if identifier.is_empty() {
            return Err(NormalizationError::new(trimmed));
        }

        if identifier.starts_with(&XRI_PREFIXES[..]) {
            return Ok(Identity::new(identifier));
        }

        let with_scheme = if identifier
            .get(..4)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http"))
        {
            identifier.to_string()
        } else {
            format!("http://{identifier}")
        };

        let without_fragment = with_scheme
            .split_once('#')
            .map_or(with_scheme.as_str(), |(head, _)| head);

        let url = Url::parse(without_fragment).map_err(|_| NormalizationError::new(trimmed))?;

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(NormalizationError::new(trimmed));
        }

        Ok(Identity::new(url.to_string()))
    }
}
