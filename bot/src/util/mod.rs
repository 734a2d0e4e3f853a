//! Shared utilities.

pub mod http;

pub use http::{apply_headers, build_client, build_headers, USER_AGENT};
