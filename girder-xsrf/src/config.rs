/// Default cookie the server is expected to set.
pub const DEFAULT_COOKIE_NAME: &str = "XSRF-TOKEN";

/// Default header the token is echoed into.
pub const DEFAULT_HEADER_NAME: &str = "X-XSRF-TOKEN";

/// XSRF protection configuration
#[derive(Debug, Clone)]
pub struct XsrfConfig {
    /// Cookie name the token is read from
    pub cookie_name: String,

    /// Header name the token is written to
    pub header_name: String,
}

impl Default for XsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            header_name: DEFAULT_HEADER_NAME.to_string(),
        }
    }
}

impl XsrfConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cookie name
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set the header name
    pub fn with_header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = XsrfConfig::default();
        assert_eq!(config.cookie_name, "XSRF-TOKEN");
        assert_eq!(config.header_name, "X-XSRF-TOKEN");
    }

    #[test]
    fn test_custom_names() {
        let config = XsrfConfig::new()
            .with_cookie_name("MY-TOKEN")
            .with_header_name("X-MY-TOKEN");
        assert_eq!(config.cookie_name, "MY-TOKEN");
        assert_eq!(config.header_name, "X-MY-TOKEN");
    }
}
