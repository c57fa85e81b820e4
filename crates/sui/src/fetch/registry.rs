use crate::constants::SIMULATION_GAS_BUDGET_MIST;
use crate::state::SharedSuiState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use sui_rpc::field::{FieldMask, FieldMaskUtil};
use sui_rpc::proto::sui::rpc::v2::{SimulateTransactionRequest, simulate_transaction_request};
use sui_sdk_types as sui;
use sui_transaction_builder::{Function, Serialized, TransactionBuilder, unresolved};
use tracing::{debug, warn};

// ---------- BCS mirror types for the registry Move structs ----------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MoveString {
    pub bytes: Vec<u8>,
}

impl MoveString {
    fn into_string(self) -> String {
        String::from_utf8(self.bytes).unwrap_or_default()
    }
}

impl From<&str> for MoveString {
    fn from(s: &str) -> Self {
        Self {
            bytes: s.as_bytes().to_vec(),
        }
    }
}

type Address32 = [u8; 32];

/// registry::MomentMetadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MomentMetadataBcs {
    pub moment_id: Address32,
    pub match_id: MoveString,
    pub fighter_a: MoveString,
    pub fighter_b: MoveString,
    pub moment_type: MoveString,
    pub video_blob_id: MoveString,
    pub thumbnail_blob_id: MoveString,
    pub max_supply: u64,
    pub current_supply: u64,
    pub creator: Address32,
    pub is_active: bool,
}

/// Registry-side metadata for a moment, read without spending fees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentMetadata {
    pub moment_id: String,
    pub match_id: String,
    pub fighter_a: String,
    pub fighter_b: String,
    pub moment_type: String,
    pub video_blob_id: String,
    pub thumbnail_blob_id: String,
    pub max_supply: u64,
    pub current_supply: u64,
    pub creator: String,
    pub is_active: bool,
}

impl From<MomentMetadataBcs> for MomentMetadata {
    fn from(raw: MomentMetadataBcs) -> Self {
        Self {
            moment_id: format!("0x{}", hex::encode(raw.moment_id)),
            match_id: raw.match_id.into_string(),
            fighter_a: raw.fighter_a.into_string(),
            fighter_b: raw.fighter_b.into_string(),
            moment_type: raw.moment_type.into_string(),
            video_blob_id: raw.video_blob_id.into_string(),
            thumbnail_blob_id: raw.thumbnail_blob_id.into_string(),
            max_supply: raw.max_supply,
            current_supply: raw.current_supply,
            creator: format!("0x{}", hex::encode(raw.creator)),
            is_active: raw.is_active,
        }
    }
}

/// Run a read-only registry call through no-fee simulated execution and
/// return the BCS bytes of its first return value.
async fn simulate_registry_call(
    function_name: &str,
    moment_id: Option<sui::Address>,
) -> Result<Option<Vec<u8>>> {
    let shared_state = SharedSuiState::get_instance();
    let Some(registry_id) = shared_state.moment_registry_id() else {
        warn!("MOMENT_REGISTRY_ID is not set; registry read returns empty");
        return Ok(None);
    };
    let package_id = shared_state.package_id();
    let mut client = shared_state.get_sui_client();

    // Read-only simulation: checks are disabled, so the zero sender and
    // placeholder gas are never validated.
    let sender = sui::Address::from_str(
        "0x0000000000000000000000000000000000000000000000000000000000000000",
    )?;
    let placeholder_digest: sui::Digest =
        "11111111111111111111111111111111".parse()?;

    let mut tb = TransactionBuilder::new();
    tb.set_sender(sender);
    tb.set_gas_budget(SIMULATION_GAS_BUDGET_MIST);
    tb.set_gas_price(1_000);
    tb.add_gas_objects(vec![unresolved::Input::owned(
        sender,
        1,
        placeholder_digest,
    )]);

    let registry_arg = tb.input(unresolved::Input::shared(registry_id, 1, false));
    let mut args = vec![registry_arg];
    if let Some(moment_id) = moment_id {
        args.push(tb.input(Serialized(&moment_id)));
    }

    let func = Function::new(
        package_id,
        "registry".parse().map_err(|e| anyhow::anyhow!("{}", e))?,
        function_name.parse().map_err(|e| anyhow::anyhow!("{}", e))?,
        vec![],
    );
    tb.move_call(func, args);

    let tx = tb.finish()?;

    let mut execution = client.execution_client();
    let request = SimulateTransactionRequest {
        transaction: Some(tx.into()),
        read_mask: Some(FieldMask::from_paths([
            "outputs",
            "transaction.effects.status",
        ])),
        checks: Some(simulate_transaction_request::TransactionChecks::Disabled as i32),
        do_gas_selection: Some(false),
    };

    let response = match execution.simulate_transaction(request).await {
        Ok(resp) => resp.into_inner(),
        Err(e) => {
            warn!("Registry simulation failed: {}", e);
            return Ok(None);
        }
    };

    let return_value = response
        .outputs
        .first()
        .and_then(|output| output.return_values.first())
        .and_then(|rv| rv.value.as_ref())
        .and_then(|bcs| bcs.value.as_ref())
        .map(|bytes| bytes.to_vec());

    if return_value.is_none() {
        debug!("Registry simulation returned no value for {}", function_name);
    }
    Ok(return_value)
}

/// Fetch all active moment metadata from the registry via no-fee
/// simulated execution. Degrades to an empty result on any failure so the
/// event-based enumeration can remain the primary path.
pub async fn fetch_moments_from_registry() -> Result<Vec<MomentMetadata>> {
    let Some(bytes) = simulate_registry_call("get_active_moments", None).await? else {
        return Ok(Vec::new());
    };

    match bcs::from_bytes::<Vec<MomentMetadataBcs>>(&bytes) {
        Ok(raw) => Ok(raw.into_iter().map(MomentMetadata::from).collect()),
        Err(e) => {
            warn!("Failed to decode registry return value: {}", e);
            Ok(Vec::new())
        }
    }
}

/// Fetch a single moment's registry metadata.
pub async fn fetch_moment_from_registry(moment_id: &str) -> Result<Option<MomentMetadata>> {
    let moment_id = sui::Address::from_str(moment_id)?;
    let Some(bytes) = simulate_registry_call("get_moment", Some(moment_id)).await? else {
        return Ok(None);
    };

    match bcs::from_bytes::<MomentMetadataBcs>(&bytes) {
        Ok(raw) => Ok(Some(raw.into())),
        Err(e) => {
            warn!("Failed to decode registry return value: {}", e);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MomentMetadataBcs {
        MomentMetadataBcs {
            moment_id: [1u8; 32],
            match_id: "UFC300-001".into(),
            fighter_a: "A".into(),
            fighter_b: "B".into(),
            moment_type: "KO".into(),
            video_blob_id: "vid".into(),
            thumbnail_blob_id: "thumb".into(),
            max_supply: 1000,
            current_supply: 17,
            creator: [2u8; 32],
            is_active: true,
        }
    }

    #[test]
    fn metadata_bcs_round_trip() {
        let encoded = bcs::to_bytes(&vec![sample(), sample()]).unwrap();
        let decoded: Vec<MomentMetadataBcs> = bcs::from_bytes(&encoded).unwrap();
        assert_eq!(decoded.len(), 2);
        let metadata: MomentMetadata = decoded.into_iter().next().unwrap().into();
        assert_eq!(metadata.match_id, "UFC300-001");
        assert_eq!(metadata.max_supply, 1000);
        assert_eq!(metadata.current_supply, 17);
        assert!(metadata.moment_id.starts_with("0x01"));
        assert!(metadata.is_active);
    }

    #[test]
    fn garbage_bytes_do_not_decode() {
        assert!(bcs::from_bytes::<Vec<MomentMetadataBcs>>(&[0xff, 0xff, 0xff]).is_err());
    }
}
