use crate::error::MarketplaceError;
use anyhow::Result;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::OnceLock;
use tracing::debug;

/// One event returned by the fullnode's event query.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    /// Fully qualified event type tag, including any type parameters
    /// (e.g. `0x2::kiosk::ItemListed<0x..::types::FightMomentNFT>`)
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event fields as rendered JSON
    #[serde(rename = "parsedJson", default)]
    pub parsed_json: Value,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(rename = "timestampMs", default)]
    pub timestamp_ms: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventPage {
    #[serde(default)]
    data: Vec<EventEnvelope>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<EventPage>,
    #[serde(default)]
    error: Option<Value>,
}

fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(reqwest::Client::new)
}

static RPC_URL: OnceLock<String> = OnceLock::new();

/// Record the fullnode URL for event queries. Called once during
/// initialization with the same URL the gRPC client connects to.
pub fn set_query_url(url: &str) {
    let _ = RPC_URL.set(url.to_string());
}

fn query_url() -> Result<&'static str> {
    RPC_URL
        .get()
        .map(|s| s.as_str())
        .ok_or_else(|| anyhow::anyhow!("event query URL not initialized"))
}

/// Query the most recent `limit` events of the given Move event type,
/// newest first.
///
/// The gRPC surface exposes no per-type event index, so this goes over the
/// fullnode's JSON-RPC `suix_queryEvents` method. The fullnode serves both
/// protocols on the same endpoint.
pub async fn query_events(event_type: &str, limit: usize) -> Result<Vec<EventEnvelope>> {
    let url = query_url()?;

    debug!("Querying up to {} events of type {}", limit, event_type);

    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "suix_queryEvents",
        "params": [
            { "MoveEventType": event_type },
            null,
            limit,
            true, // descending: newest first
        ],
    });

    let response = http_client()
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(|e| {
            MarketplaceError::RpcConnectionError(format!("Event query failed: {}", e))
        })?;

    if !response.status().is_success() {
        return Err(MarketplaceError::RpcConnectionError(format!(
            "Event query failed: HTTP {}",
            response.status()
        ))
        .into());
    }

    let rpc: RpcResponse = response.json().await.map_err(|e| {
        MarketplaceError::ParseError(format!("Failed to parse event query response: {}", e))
    })?;

    if let Some(err) = rpc.error {
        return Err(MarketplaceError::RpcConnectionError(format!(
            "Event query failed: {}",
            err
        ))
        .into());
    }

    let events = rpc.result.map(|page| page.data).unwrap_or_default();
    debug!("Event query returned {} events", events.len());
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_event_page() {
        let raw = r#"{
            "jsonrpc": "2.0",
            "result": {
                "data": [
                    {
                        "id": {"txDigest": "abc", "eventSeq": "0"},
                        "packageId": "0x2",
                        "transactionModule": "kiosk",
                        "sender": "0xsender",
                        "type": "0x2::kiosk::ItemListed<0xp::types::FightMomentNFT>",
                        "parsedJson": {"id": "0xnft", "kiosk": "0xkiosk", "price": "5000"},
                        "timestampMs": "1700000000000"
                    }
                ],
                "nextCursor": null,
                "hasNextPage": false
            },
            "id": 1
        }"#;
        let rpc: RpcResponse = serde_json::from_str(raw).unwrap();
        let page = rpc.result.unwrap();
        assert_eq!(page.data.len(), 1);
        let event = &page.data[0];
        assert!(event.event_type.contains("ItemListed"));
        assert_eq!(event.parsed_json["price"], "5000");
        assert_eq!(event.sender.as_deref(), Some("0xsender"));
    }

    #[test]
    fn tolerates_missing_parsed_json() {
        let raw = r#"{"result": {"data": [{"type": "0xp::types::NFTMinted"}]}, "id": 1}"#;
        let rpc: RpcResponse = serde_json::from_str(raw).unwrap();
        let page = rpc.result.unwrap();
        assert_eq!(page.data[0].parsed_json, serde_json::Value::Null);
        assert!(page.data[0].sender.is_none());
    }

    #[test]
    fn surfaces_rpc_error_payload() {
        let raw = r#"{"error": {"code": -32602, "message": "bad params"}, "id": 1}"#;
        let rpc: RpcResponse = serde_json::from_str(raw).unwrap();
        assert!(rpc.error.is_some());
        assert!(rpc.result.is_none());
    }
}
