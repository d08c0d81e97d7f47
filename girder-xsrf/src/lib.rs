//! # Girder XSRF Protection
//!
//! Cookie-to-header XSRF protection for the Girder HTTP client.
//!
//! ## Features
//!
//! - ✅ **Cookie-to-header pattern** - echoes a server-set cookie into a
//!   request header
//! - ✅ **Configurable** - cookie and header names
//! - ✅ **Interceptor integration** - drops into any client's chain
//! - ✅ **Origin-scoped** - absolute URLs and safe methods pass through
//! - ✅ **Never overwrites** - an existing header always wins
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use girder_http::HttpClient;
//! use girder_xsrf::{CookieSource, XsrfConfig, XsrfInterceptor};
//!
//! struct AmbientCookies;
//!
//! impl CookieSource for AmbientCookies {
//!     fn cookie(&self) -> String {
//!         "XSRF-TOKEN=abc123".to_string()
//!     }
//! }
//!
//! let client = HttpClient::builder()
//!     .interceptor(XsrfInterceptor::from_cookie(
//!         Arc::new(AmbientCookies),
//!         XsrfConfig::default(),
//!     ))
//!     .build();
//! ```

pub mod config;
pub mod extractor;
pub mod interceptor;

pub use config::XsrfConfig;
pub use extractor::{
    CookieSource, CookieXsrfTokenExtractor, XsrfTokenExtractor, parse_cookie_value,
};
pub use interceptor::XsrfInterceptor;
