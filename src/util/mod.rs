//! Utility functions shared by the CLI and the library.
//!
//! - **URL validation**: feed URLs must be http(s) and, unless allowed, public

mod url_validator;

pub use url_validator::{validate_feed_url, HostPolicy, UrlValidationError};
