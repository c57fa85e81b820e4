use crate::constants::MOMENT_EVENT_PAGE_SIZE;
use crate::error::MarketplaceError;
use crate::events::query_events;
use crate::object::{fetch_object_fields, fetch_object_fields_batch};
use crate::parse::{get_bool, get_string, get_struct, get_u64};
use crate::state::SharedSuiState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A fight scene open for minting. Shared object; supply is mutated by
/// each successful mint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintableMoment {
    pub id: String,
    pub match_id: String,
    pub fighter_a: String,
    pub fighter_b: String,
    pub moment_type: String,
    pub video_walrus_uri: String,
    pub thumbnail_walrus_uri: String,
    pub video_blob_id: String,
    pub thumbnail_blob_id: String,
    pub content_hash: String,
    pub max_supply: u64,
    pub minted_count: u64,
    pub is_active: bool,
}

impl MintableMoment {
    pub fn is_sold_out(&self) -> bool {
        self.minted_count >= self.max_supply
    }

    pub fn remaining_supply(&self) -> u64 {
        self.max_supply.saturating_sub(self.minted_count)
    }
}

/// Project a raw field map into a MintableMoment. Missing descriptive or
/// supply fields are a decode error; media fields default to empty.
pub fn parse_moment(
    fields: &prost_types::Struct,
    object_id: &str,
) -> std::result::Result<MintableMoment, MarketplaceError> {
    let required = |name: &str| {
        get_string(fields, name).ok_or_else(|| {
            MarketplaceError::ParseError(format!(
                "MintableMoment {} is missing field '{}'",
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

    Ok(MintableMoment {
        id: object_id.to_string(),
        match_id: required("match_id")?,
        fighter_a: required("fighter_a")?,
        fighter_b: required("fighter_b")?,
        moment_type: required("moment_type")?,
        video_walrus_uri: media_string("video_uri"),
        thumbnail_walrus_uri: media_string("thumbnail_uri"),
        video_blob_id: media_string("video_blob_id"),
        thumbnail_blob_id: media_string("thumbnail_blob_id"),
        content_hash: media_string("content_hash"),
        max_supply: get_u64(fields, "max_supply").ok_or_else(|| {
            MarketplaceError::ParseError(format!(
                "MintableMoment {} is missing field 'max_supply'",
                object_id
            ))
        })?,
        minted_count: get_u64(fields, "current_supply").unwrap_or(0),
        is_active: get_bool(fields, "is_active").unwrap_or(true),
    })
}

/// Enumerate mintable moments from recent MomentRegistered events.
///
/// Objects that can no longer be decoded into the expected shape are
/// skipped.
pub async fn fetch_mintable_moments() -> Result<Vec<MintableMoment>> {
    let package_id = SharedSuiState::get_instance().package_id();
    let event_type = format!("{}::types::MomentRegistered", package_id);

    let events = query_events(&event_type, MOMENT_EVENT_PAGE_SIZE).await?;

    let moment_ids: Vec<String> = events
        .iter()
        .filter_map(|event| event.parsed_json.get("moment_id")?.as_str().map(String::from))
        .collect();

    if moment_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut moments = Vec::new();
    for (id, fields) in moment_ids
        .iter()
        .zip(fetch_object_fields_batch(&moment_ids).await?)
    {
        let Some(fields) = fields else {
            debug!("Moment object {} missing; skipping", id);
            continue;
        };
        match parse_moment(&fields, id) {
            Ok(moment) => moments.push(moment),
            Err(e) => debug!("Skipping undecodable moment {}: {}", id, e),
        }
    }

    debug!("Fetched {} mintable moments", moments.len());
    Ok(moments)
}

/// Fetch a single mintable moment. Returns None when the object does not
/// exist or is not a moment.
pub async fn fetch_mintable_moment(moment_id: &str) -> Result<Option<MintableMoment>> {
    let Some(fields) = fetch_object_fields(moment_id).await? else {
        return Ok(None);
    };
    match parse_moment(&fields, moment_id) {
        Ok(moment) => Ok(Some(moment)),
        Err(e) => {
            debug!("Object {} is not a MintableMoment: {}", moment_id, e);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::test_support::*;

    fn moment_fields() -> prost_types::Struct {
        struct_value(vec![
            ("match_id", string_value("UFC300-001")),
            ("fighter_a", string_value("A")),
            ("fighter_b", string_value("B")),
            ("moment_type", string_value("KO")),
            ("max_supply", string_value("1000")),
            ("current_supply", string_value("42")),
            ("is_active", bool_value(true)),
            (
                "media",
                nested(vec![
                    ("video_uri", string_value("walrus://vid")),
                    ("thumbnail_uri", string_value("walrus://thumb")),
                    ("video_blob_id", string_value("vid")),
                    ("thumbnail_blob_id", string_value("thumb")),
                    ("content_hash", string_value("vid")),
                ]),
            ),
        ])
    }

    #[test]
    fn projects_full_field_map() {
        let moment = parse_moment(&moment_fields(), "0xmoment").unwrap();
        assert_eq!(moment.match_id, "UFC300-001");
        assert_eq!(moment.max_supply, 1000);
        assert_eq!(moment.minted_count, 42);
        assert_eq!(moment.video_walrus_uri, "walrus://vid");
        assert!(moment.is_active);
        assert!(!moment.is_sold_out());
        assert_eq!(moment.remaining_supply(), 958);
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let mut fields = moment_fields();
        fields.fields.remove("match_id");
        assert!(parse_moment(&fields, "0xmoment").is_err());

        let mut fields = moment_fields();
        fields.fields.remove("max_supply");
        assert!(parse_moment(&fields, "0xmoment").is_err());
    }

    #[test]
    fn media_fields_default_to_empty() {
        let mut fields = moment_fields();
        fields.fields.remove("media");
        let moment = parse_moment(&fields, "0xmoment").unwrap();
        assert_eq!(moment.video_walrus_uri, "");
        assert_eq!(moment.content_hash, "");
    }

    #[test]
    fn sold_out_at_max_supply() {
        let mut fields = moment_fields();
        fields.fields.insert(
            "current_supply".to_string(),
            string_value("1000"),
        );
        let moment = parse_moment(&fields, "0xmoment").unwrap();
        assert!(moment.is_sold_out());
        assert_eq!(moment.remaining_supply(), 0);
    }
}
