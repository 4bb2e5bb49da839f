use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::FetchError;

/// Suffixes (last three characters of a link target) treated as images.
const IMAGE_SUFFIXES: &[&str] = &["jpg", "png", "gif"];

pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP fetcher with a per-request timeout. No retries.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wp-archiver/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpFetcher { client })
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self.client.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }
        Ok(resp.bytes()?.to_vec())
    }
}

/// Suffix match on the raw link target, case-sensitive. `x.xjpg` matches;
/// `x.JPG` and `x.jpg?w=300` do not.
pub fn is_image_link(href: &str) -> bool {
    IMAGE_SUFFIXES.iter().any(|ext| href.ends_with(ext))
}

/// Prefix site-relative links with the base URL, joined by one slash.
pub fn resolve_link(href: &str, base_url: &str) -> String {
    if href.starts_with(base_url) {
        href.to_string()
    } else {
        format!("{}/{}", base_url, href.trim_start_matches('/'))
    }
}

/// Last `/`-delimited segment of a URL.
pub fn filename_from_url(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}
