//! Request classification.
//!
//! Each intercepted request is routed to one of three strategies from its
//! URL alone. Precedence: application-shell paths first, then the
//! same-origin/cross-origin split.

use outpost_core::ResourceRequest;
use url::Url;

/// Strategy bucket selected for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Network first with a plain fetch; fall back to the store.
    RefreshFirst,
    /// Network first with forced revalidation; fall back to the store, then
    /// the entry document, then a synthesized response.
    RevalidateFirst,
    /// Serve from the store when possible and refresh it in the background.
    CacheFirstBgRefresh,
}

/// Origin/path classification of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Application shell: entry document, site root, or the manifest.
    Shell,
    /// Other same-origin resource.
    SameOrigin,
    /// Cross-origin resource (CDN-hosted scripts, styles, fonts).
    CrossOrigin,
}

/// Whether a path names the entry document or the site root.
pub(crate) fn is_entry_path(path: &str, entry_document: &str) -> bool {
    path.is_empty() || path == "/" || path.ends_with('/') || path.ends_with(entry_document)
}

/// Classifies intercepted requests into strategy buckets.
#[derive(Debug, Clone)]
pub struct Router {
    origin: Url,
    entry_document: String,
    manifest: String,
    revalidate_shell: bool,
}

impl Router {
    pub fn new(
        origin: Url,
        entry_document: impl Into<String>,
        manifest: impl Into<String>,
        revalidate_shell: bool,
    ) -> Self {
        Self {
            origin,
            entry_document: entry_document.into(),
            manifest: manifest.into(),
            revalidate_shell,
        }
    }

    /// Origin/path classification, computed before strategy selection.
    pub fn classification(&self, request: &ResourceRequest) -> Classification {
        let path = request.url.path();
        if is_entry_path(path, &self.entry_document) || path.ends_with(&self.manifest) {
            Classification::Shell
        } else if request.url.origin() == self.origin.origin() {
            Classification::SameOrigin
        } else {
            Classification::CrossOrigin
        }
    }

    /// Strategy bucket for an intercepted request.
    pub fn classify(&self, request: &ResourceRequest) -> Strategy {
        match self.classification(request) {
            Classification::Shell => {
                if self.revalidate_shell {
                    Strategy::RevalidateFirst
                } else {
                    Strategy::RefreshFirst
                }
            }
            Classification::SameOrigin | Classification::CrossOrigin => {
                Strategy::CacheFirstBgRefresh
            }
        }
    }
}
