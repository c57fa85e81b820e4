use crate::error::MarketplaceError;
use crate::state::SharedSuiState;
use anyhow::{Context, Result, anyhow};
use sui_rpc::field::{FieldMask, FieldMaskUtil};
use sui_rpc::proto::sui::rpc::v2 as proto;
use sui_sdk_types as sui;
use sui_transaction_builder::unresolved;
use tracing::debug;

/// A transaction input resolved against the current ledger state.
///
/// Owned objects carry their full reference; shared objects carry the
/// initial shared version and the mutability the call site needs.
#[derive(Debug, Clone)]
pub enum ObjectInput {
    Owned(sui::ObjectReference),
    Shared {
        id: sui::Address,
        initial_shared_version: u64,
        mutable: bool,
    },
}

impl ObjectInput {
    pub fn id(&self) -> sui::Address {
        match self {
            ObjectInput::Owned(obj_ref) => *obj_ref.object_id(),
            ObjectInput::Shared { id, .. } => *id,
        }
    }

    /// The same input with shared mutability dropped; owned inputs are
    /// unchanged.
    pub fn immutable(self) -> Self {
        match self {
            ObjectInput::Shared {
                id,
                initial_shared_version,
                ..
            } => ObjectInput::Shared {
                id,
                initial_shared_version,
                mutable: false,
            },
            owned => owned,
        }
    }

    pub(crate) fn to_unresolved(&self) -> unresolved::Input {
        match self {
            ObjectInput::Owned(obj_ref) => unresolved::Input::owned(
                *obj_ref.object_id(),
                obj_ref.version(),
                *obj_ref.digest(),
            ),
            ObjectInput::Shared {
                id,
                initial_shared_version,
                mutable,
            } => unresolved::Input::shared(*id, *initial_shared_version, *mutable),
        }
    }
}

fn format_object_id(object_id: &str) -> String {
    if object_id.starts_with("0x") {
        object_id.to_string()
    } else {
        format!("0x{}", object_id)
    }
}

/// Fetch a raw object's rendered field map. Returns the `json` projection
/// as a prost struct for the entity parsers, or None if the object does
/// not exist.
pub async fn fetch_object_fields(object_id: &str) -> Result<Option<prost_types::Struct>> {
    let mut client = SharedSuiState::get_instance().get_sui_client();
    let formatted_id = format_object_id(object_id);
    debug!("Fetching object with ID: {}", formatted_id);

    let request = proto::GetObjectRequest {
        object_id: Some(formatted_id.clone()),
        version: None,
        read_mask: Some(FieldMask::from_paths(["object_id", "json"])),
    };

    let response = match client.ledger_client().get_object(request).await {
        Ok(resp) => resp.into_inner(),
        Err(e) => {
            if e.to_string().contains("not found") || e.to_string().contains("NotFound") {
                debug!("Object {} not found", formatted_id);
                return Ok(None);
            }
            return Err(MarketplaceError::RpcConnectionError(format!(
                "Failed to fetch object {}: {}",
                formatted_id, e
            ))
            .into());
        }
    };

    if let Some(proto_object) = response.object {
        if let Some(json_value) = proto_object.json {
            if let Some(prost_types::value::Kind::StructValue(fields)) = json_value.kind {
                return Ok(Some(fields));
            }
        }
    }

    // The object exists but has no rendered field map (wrong shape)
    Ok(None)
}

/// Fetch a raw object as serde JSON.
pub async fn fetch_object(object_id: &str) -> Result<serde_json::Value> {
    let fields = fetch_object_fields(object_id)
        .await?
        .ok_or_else(|| MarketplaceError::ObjectNotFound(object_id.to_string()))?;
    Ok(crate::parse::proto_to_json(&prost_types::Value {
        kind: Some(prost_types::value::Kind::StructValue(fields)),
    }))
}

/// Fetch the field maps for a batch of object ids, in order. Ids whose
/// objects are missing or of the wrong shape yield None.
pub async fn fetch_object_fields_batch(
    object_ids: &[String],
) -> Result<Vec<Option<prost_types::Struct>>> {
    let mut results = Vec::with_capacity(object_ids.len());
    for object_id in object_ids {
        results.push(fetch_object_fields(object_id).await?);
    }
    Ok(results)
}

/// Resolve an object id into a transaction input.
///
/// Shared objects are recognized by an owner record with a version but no
/// address; that version is the initial shared version. Shared inputs are
/// resolved mutable; use [`ObjectInput::immutable`] where the call takes a
/// read-only reference.
pub async fn resolve_object_input(object_id: sui::Address) -> Result<ObjectInput> {
    let mut client = SharedSuiState::get_instance().get_sui_client();
    let mut ledger = client.ledger_client();

    let response = ledger
        .get_object(proto::GetObjectRequest {
            object_id: Some(object_id.to_string()),
            version: None,
            read_mask: Some(FieldMask::from_paths([
                "object_id",
                "version",
                "digest",
                "owner",
            ])),
        })
        .await
        .context("Failed to get object")?
        .into_inner();

    let object = response
        .object
        .ok_or_else(|| MarketplaceError::ObjectNotFound(object_id.to_string()))?;

    let id: sui::Address = object
        .object_id
        .context("Missing object_id")?
        .parse()
        .context("Failed to parse object_id")?;
    let version = object.version.context("Missing version")?;

    // For shared objects the owner record carries the initial shared
    // version and no address.
    let initial_shared_version = object.owner.as_ref().and_then(|owner| {
        if owner.address.is_none() || owner.address.as_deref() == Some("") {
            owner.version
        } else {
            None
        }
    });

    if let Some(shared_version) = initial_shared_version {
        debug!(
            "Resolved shared object {} with initial_shared_version={}",
            id, shared_version
        );
        return Ok(ObjectInput::Shared {
            id,
            initial_shared_version: shared_version,
            mutable: true,
        });
    }

    let digest = object
        .digest
        .ok_or_else(|| anyhow!("Missing digest for owned object {}", id))?
        .parse()
        .context("Failed to parse digest")?;

    debug!("Resolved owned object {} at version {}", id, version);
    Ok(ObjectInput::Owned(sui::ObjectReference::new(
        id, version, digest,
    )))
}
