//! Formula sources.
//!
//! Fetching turns a source locator into bytes; unpacking turns those bytes
//! into a source tree inside a build sandbox.

pub mod archive;
pub mod fetch;

pub use archive::{extract_tarball, unpack_source};
pub use fetch::{DefaultFetcher, FetchError, Fetcher, FileFetcher, HttpFetcher};
