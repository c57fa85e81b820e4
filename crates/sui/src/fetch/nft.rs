use crate::constants::MINT_EVENT_PAGE_SIZE;
use crate::error::MarketplaceError;
use crate::events::query_events;
use crate::object::fetch_object_fields_batch;
use crate::parse::{get_string, get_struct, get_u64};
use crate::state::SharedSuiState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A minted Fight Moment NFT. Immutable after creation; custody moves
/// through kiosk listing and purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FightMomentNFT {
    pub id: String,
    pub moment_id: String,
    pub match_id: String,
    pub fighter_a: String,
    pub fighter_b: String,
    pub moment_type: String,
    pub video_uri: String,
    pub thumbnail_uri: String,
    pub serial_number: u64,
    pub minted_at: u64,
    pub collection_id: String,
    pub creator: String,
}

/// Project a raw field map into a FightMomentNFT.
pub fn parse_nft(
    fields: &prost_types::Struct,
    object_id: &str,
) -> std::result::Result<FightMomentNFT, MarketplaceError> {
    let required = |name: &str| {
        get_string(fields, name).ok_or_else(|| {
            MarketplaceError::ParseError(format!(
                "FightMomentNFT {} is missing field '{}'",
                object_id, name
            ))
        })
    };
    let required_u64 = |name: &str| {
        get_u64(fields, name).ok_or_else(|| {
            MarketplaceError::ParseError(format!(
                "FightMomentNFT {} is missing field '{}'",
                object_id, name
            ))
        })
    };

    let media = get_struct(fields, "media");
    let media_string = |name: &str| {
        media
            .and_then(|m| get_string(m, name))
            .unwrap_or_default()
    };

    Ok(FightMomentNFT {
        id: object_id.to_string(),
        moment_id: required("moment_id")?,
        match_id: required("match_id")?,
        fighter_a: required("fighter_a")?,
        fighter_b: required("fighter_b")?,
        moment_type: required("moment_type")?,
        video_uri: media_string("video_uri"),
        thumbnail_uri: media_string("thumbnail_uri"),
        serial_number: required_u64("serial_number")?,
        minted_at: required_u64("minted_at")?,
        collection_id: get_string(fields, "collection_id").unwrap_or_default(),
        creator: get_string(fields, "creator").unwrap_or_default(),
    })
}

/// Enumerate the NFTs a user minted, from recent NFTMinted events.
pub async fn fetch_user_nfts(user_address: &str) -> Result<Vec<FightMomentNFT>> {
    let package_id = SharedSuiState::get_instance().package_id();
    let event_type = format!("{}::types::NFTMinted", package_id);

    let events = query_events(&event_type, MINT_EVENT_PAGE_SIZE).await?;

    let nft_ids: Vec<String> = events
        .iter()
        .filter(|event| {
            event
                .parsed_json
                .get("minter")
                .and_then(|v| v.as_str())
                .is_some_and(|minter| minter == user_address)
        })
        .filter_map(|event| event.parsed_json.get("nft_id")?.as_str().map(String::from))
        .collect();

    if nft_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut nfts = Vec::new();
    for (id, fields) in nft_ids
        .iter()
        .zip(fetch_object_fields_batch(&nft_ids).await?)
    {
        let Some(fields) = fields else {
            debug!("NFT object {} missing; skipping", id);
            continue;
        };
        match parse_nft(&fields, id) {
            Ok(nft) => nfts.push(nft),
            Err(e) => debug!("Skipping undecodable NFT {}: {}", id, e),
        }
    }

    debug!("Fetched {} NFTs for {}", nfts.len(), user_address);
    Ok(nfts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::test_support::*;

    fn nft_fields() -> prost_types::Struct {
        struct_value(vec![
            ("moment_id", string_value("0xmoment")),
            ("match_id", string_value("UFC300-001")),
            ("fighter_a", string_value("A")),
            ("fighter_b", string_value("B")),
            ("moment_type", string_value("KO")),
            ("serial_number", string_value("7")),
            ("minted_at", string_value("1700000000000")),
            ("collection_id", string_value("fight-moments-v1")),
            ("creator", string_value("0xcreator")),
            (
                "media",
                nested(vec![
                    ("video_uri", string_value("walrus://vid")),
                    ("thumbnail_uri", string_value("walrus://thumb")),
                ]),
            ),
        ])
    }

    #[test]
    fn projects_nft() {
        let nft = parse_nft(&nft_fields(), "0xnft").unwrap();
        assert_eq!(nft.serial_number, 7);
        assert_eq!(nft.minted_at, 1_700_000_000_000);
        assert_eq!(nft.thumbnail_uri, "walrus://thumb");
        assert_eq!(nft.collection_id, "fight-moments-v1");
    }

    #[test]
    fn missing_serial_number_is_an_error() {
        let mut fields = nft_fields();
        fields.fields.remove("serial_number");
        assert!(parse_nft(&fields, "0xnft").is_err());
    }
}
