//! Remote fetch seam and its HTTP implementation

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use kiosk_core::{KioskError, KioskResult};

/// Body of a download, consumed chunk by chunk
#[async_trait]
pub trait ByteStream: Send {
    /// Total size if the server announced one
    fn content_length(&self) -> Option<u64>;

    /// Next chunk, `None` at the end of the body
    async fn next_chunk(&mut self) -> KioskResult<Option<Bytes>>;
}

/// Where manifests and assets come from
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetch a whole (small) document
    async fn fetch_manifest(&self, url: &str) -> KioskResult<Bytes>;

    /// Start streaming a (large) asset
    async fn open_download(&self, url: &str) -> KioskResult<Box<dyn ByteStream>>;
}

/// HTTP(S) fetcher
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(connect_timeout: Duration) -> KioskResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("kioskd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KioskError::Fetch(format!("http client: {}", e)))?;
        Ok(HttpFetcher { client })
    }

    async fn get(&self, url: &str) -> KioskResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KioskError::Fetch(format!("GET {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KioskError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch_manifest(&self, url: &str) -> KioskResult<Bytes> {
        self.get(url)
            .await?
            .bytes()
            .await
            .map_err(|e| KioskError::Fetch(format!("read manifest body: {}", e)))
    }

    async fn open_download(&self, url: &str) -> KioskResult<Box<dyn ByteStream>> {
        let response = self.get(url).await?;
        Ok(Box::new(HttpByteStream { response }))
    }
}

struct HttpByteStream {
    response: reqwest::Response,
}

#[async_trait]
impl ByteStream for HttpByteStream {
    fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    async fn next_chunk(&mut self) -> KioskResult<Option<Bytes>> {
        self.response
            .chunk()
            .await
            .map_err(|e| KioskError::Fetch(format!("download interrupted: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let fetcher = HttpFetcher::new(Duration::from_millis(200)).unwrap();
        // Nothing listens on the discard port
        let err = fetcher
            .fetch_manifest("http://127.0.0.1:9/manifest.json")
            .await
            .unwrap_err();
        assert!(matches!(err, KioskError::Fetch(_)));
    }
}
