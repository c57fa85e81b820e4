use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::time::Instant;
use tokio::time::{Duration, sleep};
use tracing::{debug, error, warn};

const DEFAULT_RELAY_URL: &str = "https://publisher.walrus-testnet.walrus.space";
const DEFAULT_AGGREGATOR_URL: &str = "https://aggregator.walrus-testnet.walrus.space";
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct WalrusConfig {
    pub relay_url: String,
    pub aggregator_url: String,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for WalrusConfig {
    fn default() -> Self {
        Self {
            relay_url: env::var("WALRUS_RELAY_URL")
                .unwrap_or_else(|_| DEFAULT_RELAY_URL.to_string()),
            aggregator_url: env::var("WALRUS_AGGREGATOR_URL")
                .unwrap_or_else(|_| DEFAULT_AGGREGATOR_URL.to_string()),
            max_retries: env::var("WALRUS_MAX_RETRIES")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_MAX_RETRIES),
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

/// Result of a blob upload. The blob id doubles as the content hash in
/// Walrus's model; `uri` is the `walrus://` form the contract stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalrusUploadResult {
    pub uri: String,
    pub blob_id: String,
    pub hash: String,
}

/// Extract the blob id from either upload response variant.
pub fn parse_blob_id(info: &Value) -> Option<String> {
    info.pointer("/newlyCreated/blobObject/blobId")
        .or_else(|| info.pointer("/alreadyCertified/blobId"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub struct WalrusClient {
    config: WalrusConfig,
    client: reqwest::Client,
}

impl WalrusClient {
    pub fn new() -> Self {
        Self::with_config(WalrusConfig::default())
    }

    pub fn with_config(config: WalrusConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Upload a blob with a single-shot PUT, retrying on any transport
    /// error or non-2xx response up to the configured bound with a fixed
    /// inter-attempt delay.
    pub async fn upload(&self, data: Vec<u8>) -> Result<WalrusUploadResult> {
        let url = format!("{}/v1/blobs", self.config.relay_url);
        let max_retries = self.config.max_retries;
        let mut last_error = None;

        for attempt in 1..=max_retries {
            debug!("Uploading {} bytes to Walrus (attempt {}/{})", data.len(), attempt, max_retries);
            let start = Instant::now();

            match self.try_upload(&url, data.clone()).await {
                Ok(result) => {
                    debug!(
                        "Uploaded to Walrus in {:?}, blobId: {}",
                        start.elapsed(),
                        result.blob_id
                    );
                    return Ok(result);
                }
                Err(e) => {
                    if attempt < max_retries {
                        warn!(
                            "Walrus upload failed (attempt {}/{}): {}. Retrying in {:?}...",
                            attempt, max_retries, e, self.config.retry_delay
                        );
                        last_error = Some(e);
                        sleep(self.config.retry_delay).await;
                    } else {
                        error!("Walrus upload failed after {} attempts: {}", max_retries, e);
                        return Err(anyhow!(
                            "Walrus upload failed after {} attempts: {}",
                            max_retries,
                            e
                        ));
                    }
                }
            }
        }

        // max_retries of zero only
        Err(last_error.unwrap_or_else(|| anyhow!("Walrus upload attempted zero times")))
    }

    async fn try_upload(&self, url: &str, data: Vec<u8>) -> Result<WalrusUploadResult> {
        let response = self
            .client
            .put(url)
            .header("Content-Type", "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send request: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Walrus upload failed: {} {} {}",
                status,
                status.canonical_reason().unwrap_or("Unknown error"),
                body
            ));
        }

        let info: Value = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse response: {}", e))?;

        let blob_id = parse_blob_id(&info)
            .ok_or_else(|| anyhow!("Failed to get blob ID from Walrus response"))?;

        Ok(WalrusUploadResult {
            uri: format!("walrus://{}", blob_id),
            hash: blob_id.clone(),
            blob_id,
        })
    }

    /// Read a blob back from the aggregator. Reads are not retried; the
    /// retry budget belongs to the upload path.
    pub async fn read_blob(&self, blob_id: &str) -> Result<Vec<u8>> {
        if blob_id.is_empty() {
            return Err(anyhow!("blobId is not provided"));
        }

        let url = format!("{}/v1/blobs/{}", self.config.aggregator_url, blob_id);
        debug!("Reading Walrus blob: {}", blob_id);
        let start = Instant::now();

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send request: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            error!(
                "Walrus read failed: {} {}",
                status,
                status.canonical_reason().unwrap_or("Unknown error")
            );
            return Err(anyhow!("Walrus read failed: {}", status));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| anyhow!("Failed to read response: {}", e))?;
        debug!("Read {} bytes in {:?}", bytes.len(), start.elapsed());
        Ok(bytes.to_vec())
    }

    /// Derive the browsable aggregator URL for a `walrus://` URI or a
    /// bare blob id. Pure string transform, no network.
    pub fn view_url(&self, uri: &str) -> String {
        let blob_id = uri.strip_prefix("walrus://").unwrap_or(uri);
        format!("{}/v1/blobs/{}", self.config.aggregator_url, blob_id)
    }
}

impl Default for WalrusClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> WalrusClient {
        WalrusClient::with_config(WalrusConfig {
            relay_url: "http://relay.example".to_string(),
            aggregator_url: "http://aggregator.example".to_string(),
            max_retries: 3,
            retry_delay: Duration::from_millis(10),
        })
    }

    #[test]
    fn blob_id_from_newly_created() {
        let info = json!({"newlyCreated": {"blobObject": {"blobId": "abc123"}}});
        assert_eq!(parse_blob_id(&info).as_deref(), Some("abc123"));
    }

    #[test]
    fn blob_id_from_already_certified() {
        let info = json!({"alreadyCertified": {"blobId": "xyz789", "endEpoch": 53}});
        assert_eq!(parse_blob_id(&info).as_deref(), Some("xyz789"));
    }

    #[test]
    fn missing_blob_id_is_none() {
        assert_eq!(parse_blob_id(&json!({})), None);
        assert_eq!(parse_blob_id(&json!({"newlyCreated": {}})), None);
    }

    #[test]
    fn view_url_from_uri_and_bare_id() {
        let client = client();
        assert_eq!(
            client.view_url("walrus://abc123"),
            "http://aggregator.example/v1/blobs/abc123"
        );
        assert_eq!(
            client.view_url("abc123"),
            "http://aggregator.example/v1/blobs/abc123"
        );
    }
}
