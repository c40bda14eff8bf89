//! URL canonicalization and seed list resolution.

use url::Url;

/// Error type for URL canonicalization and seed resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for outpost_core::Error {
    fn from(err: UrlError) -> Self {
        outpost_core::Error::InvalidUrl(err.to_string())
    }
}

/// Canonicalize a URL string for consistent store identities.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    let lowered = parsed.host_str().map(str::to_lowercase);
    if let Some(host) = lowered {
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// A seed list member resolved against the application origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedUrl {
    /// Same-origin member; population is mandatory as a unit.
    Local(Url),
    /// Cross-origin member; population is best-effort and isolated.
    External(Url),
}

impl SeedUrl {
    pub fn url(&self) -> &Url {
        match self {
            Self::Local(url) | Self::External(url) => url,
        }
    }
}

/// Resolve a seed list member against the application origin.
///
/// Relative members (`./`, `index.html`, `/icon.png`) join onto the origin
/// and are always local. Absolute members are local only when their origin
/// matches; anything else is external.
pub fn resolve_seed(origin: &Url, member: &str) -> Result<SeedUrl, UrlError> {
    let trimmed = member.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    if trimmed.contains("://") {
        let url = canonicalize(trimmed)?;
        if url.origin() == origin.origin() {
            Ok(SeedUrl::Local(url))
        } else {
            Ok(SeedUrl::External(url))
        }
    } else {
        let mut joined = origin
            .join(trimmed)
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        joined.set_fragment(None);
        Ok(SeedUrl::Local(joined))
    }
}
