//! Network transport for outpost.
//!
//! This crate provides the transport capability consumed by the worker: a
//! trait describing a network fetch that resolves to a response snapshot,
//! an HTTP implementation built on reqwest, and URL canonicalization plus
//! seed list resolution.

pub mod transport;
pub mod url;

pub use self::url::{SeedUrl, UrlError, canonicalize, resolve_seed};
pub use transport::{CacheMode, FetchOptions, HttpTransport, Transport, TransportConfig};
