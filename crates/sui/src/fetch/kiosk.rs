use crate::constants::LISTING_EVENT_PAGE_SIZE;
use crate::error::MarketplaceError;
use crate::events::{EventEnvelope, query_events};
use crate::fetch::nft::{FightMomentNFT, parse_nft};
use crate::object::fetch_object_fields_batch;
use crate::parse::get_string;
use crate::state::SharedSuiState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use sui_rpc::field::{FieldMask, FieldMaskUtil};
use sui_rpc::proto::sui::rpc::v2 as proto;
use tracing::debug;

/// The generic kiosk listing event type. Emitted as
/// `ItemListed<T>`; filtering to this marketplace's NFT happens on the
/// event's type tag.
const ITEM_LISTED_EVENT: &str = "0x2::kiosk::ItemListed";

const KIOSK_OWNER_CAP_TYPE: &str = "0x2::kiosk::KioskOwnerCap";

/// A kiosk and the capability proving the right to manage it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserKiosk {
    pub kiosk_id: String,
    pub cap_id: String,
}

/// A marketplace listing: the listed NFT joined with the price and kiosk
/// captured from the listing event. Derived view, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KioskListing {
    pub nft_id: String,
    pub kiosk_id: String,
    /// Price in MIST
    pub price: u64,
    /// Always empty: the ItemListed event stream does not carry the
    /// seller's address.
    pub seller: String,
    pub nft: FightMomentNFT,
}

/// Enumerate the kiosk/capability pairs a user owns, from their
/// KioskOwnerCap objects. The cap's `for` field links the kiosk.
pub async fn fetch_user_kiosk_caps(user_address: &str) -> Result<Vec<UserKiosk>> {
    let mut client = SharedSuiState::get_instance().get_sui_client();
    let mut state = client.state_client();

    let mut request = proto::ListOwnedObjectsRequest::default();
    request.owner = Some(user_address.to_string());
    request.page_size = Some(100);
    request.read_mask = Some(FieldMask::from_paths(["object_id", "json"]));
    request.object_type = Some(KIOSK_OWNER_CAP_TYPE.to_string());

    let resp = state
        .list_owned_objects(request)
        .await
        .map_err(|e| {
            MarketplaceError::RpcConnectionError(format!(
                "Failed to list kiosk caps for {}: {}",
                user_address, e
            ))
        })?
        .into_inner();

    let mut kiosks = Vec::new();
    for obj in resp.objects {
        let Some(cap_id) = obj.object_id else { continue };
        let kiosk_id = obj.json.as_ref().and_then(|json| match &json.kind {
            Some(prost_types::value::Kind::StructValue(fields)) => get_string(fields, "for"),
            _ => None,
        });
        if let Some(kiosk_id) = kiosk_id {
            kiosks.push(UserKiosk { kiosk_id, cap_id });
        }
    }

    debug!("Found {} kiosks for {}", kiosks.len(), user_address);
    Ok(kiosks)
}

/// Enumerate just the kiosk ids a user owns.
pub async fn fetch_user_kiosks(user_address: &str) -> Result<Vec<String>> {
    Ok(fetch_user_kiosk_caps(user_address)
        .await?
        .into_iter()
        .map(|kiosk| kiosk.kiosk_id)
        .collect())
}

pub(crate) struct ListingEvent {
    pub nft_id: String,
    pub kiosk_id: String,
    pub price: u64,
}

fn json_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Keep the listing events for this marketplace's NFT type and pull out
/// the item/kiosk/price triple.
pub(crate) fn filter_listing_events(
    events: &[EventEnvelope],
    nft_type: &str,
) -> Vec<ListingEvent> {
    events
        .iter()
        .filter(|event| event.event_type.contains(nft_type))
        .filter_map(|event| {
            Some(ListingEvent {
                nft_id: event.parsed_json.get("id")?.as_str()?.to_string(),
                kiosk_id: event.parsed_json.get("kiosk")?.as_str()?.to_string(),
                price: json_u64(event.parsed_json.get("price")?)?,
            })
        })
        .collect()
}

/// Enumerate marketplace listings from recent ItemListed events.
///
/// Zero matching events is an empty result, not an error. Listings whose
/// NFT can no longer be fetched (e.g. already delisted or sold) are
/// skipped.
pub async fn fetch_marketplace_listings() -> Result<Vec<KioskListing>> {
    let events = query_events(ITEM_LISTED_EVENT, LISTING_EVENT_PAGE_SIZE).await?;

    let listings = filter_listing_events(&events, "FightMomentNFT");
    if listings.is_empty() {
        return Ok(Vec::new());
    }

    let nft_ids: Vec<String> = listings.iter().map(|l| l.nft_id.clone()).collect();
    let objects = fetch_object_fields_batch(&nft_ids).await?;

    let mut result = Vec::new();
    for (listing, fields) in listings.into_iter().zip(objects) {
        let Some(fields) = fields else {
            debug!("Listed NFT {} no longer fetchable; skipping", listing.nft_id);
            continue;
        };
        match parse_nft(&fields, &listing.nft_id) {
            Ok(nft) => result.push(KioskListing {
                nft_id: listing.nft_id,
                kiosk_id: listing.kiosk_id,
                price: listing.price,
                seller: String::new(),
                nft,
            }),
            Err(e) => debug!("Skipping undecodable listed NFT {}: {}", listing.nft_id, e),
        }
    }

    debug!("Fetched {} marketplace listings", result.len());
    Ok(result)
}
