use std::time::Duration;

use reqwest::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_PAGE: u32 = 0;
pub const DEFAULT_PER_PAGE: u32 = 20;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base URL `{0}`")]
    InvalidBaseUrl(String),
    #[error("base URL `{0}` must use http or https")]
    UnsupportedScheme(String),
    #[error("page size must be at least 1")]
    ZeroPageSize,
}

/// Where the license API lives and how listing pages are requested.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    base_url: Url,
    page: u32,
    per_page: u32,
    timeout: Option<Duration>,
}

impl ServiceConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let url =
            Url::parse(base_url).map_err(|_| ConfigError::InvalidBaseUrl(base_url.to_string()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::UnsupportedScheme(base_url.to_string()));
        }
        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidBaseUrl(base_url.to_string()));
        }

        Ok(Self {
            base_url: url,
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            timeout: None,
        })
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Result<Self, ConfigError> {
        if per_page == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        self.per_page = per_page;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL).expect("default base URL is valid")
    }
}
