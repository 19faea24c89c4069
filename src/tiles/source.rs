//! Where tile bytes come from on a cache miss.

use reqwest::blocking::Client;

use super::key::TileKey;
use crate::config::CacheConfig;
use crate::errors::{CacheError, FetchError};
use crate::log::debug;

/// Fetches the encoded image for one tile. Called from worker threads.
pub trait TileSource: Send + Sync {
    fn fetch(&self, key: &TileKey) -> Result<Vec<u8>, FetchError>;
}

/// Fetches tiles from the provider's public tile servers
#[derive(Debug, Clone)]
pub struct HttpTileSource {
    client: Client,
}

impl HttpTileSource {
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CacheError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }
}

impl TileSource for HttpTileSource {
    fn fetch(&self, key: &TileKey) -> Result<Vec<u8>, FetchError> {
        let url = key.url();
        debug!(%url, "fetching tile");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| request_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url,
            });
        }

        let bytes = response.bytes().map_err(|e| request_error(&url, e))?;
        Ok(bytes.to_vec())
    }
}

fn request_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}
