// Girder - the HTTP client layer of the Girder framework
//
// This library provides an immutable request/response model, an interceptor
// chain over typed response event streams, and pluggable transport backends.

// Re-export the HTTP client layer
pub use girder_http::*;

// Re-export optional crates
#[cfg(feature = "xsrf")]
pub use girder_xsrf;

// Prelude for common imports
pub mod prelude {
    pub use girder_http::prelude::*;

    #[cfg(feature = "xsrf")]
    pub use girder_xsrf::{CookieSource, CookieXsrfTokenExtractor, XsrfConfig, XsrfInterceptor};
}
