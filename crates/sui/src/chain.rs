use anyhow::{Result, anyhow};
use std::env;
use std::str::FromStr;
use sui_rpc::Client as GrpcClient;
use sui_rpc::proto::sui::rpc::v2 as proto;
use sui_sdk_types as sui;
use tracing::debug;

/// Resolve the fullnode URL:
/// 1. explicit `rpc_url` argument,
/// 2. `SUI_RPC_URL`,
/// 3. `SUI_RPC_URL_<CHAIN>` for the selected chain,
/// 4. the public `https://fullnode.<chain>.sui.io:443` endpoint.
///
/// The chain comes from `chain_override`, then `SUI_CHAIN`, defaulting to
/// testnet. Only devnet/testnet/mainnet are accepted.
pub fn resolve_rpc_url(rpc_url: Option<String>, chain_override: Option<String>) -> Result<String> {
    if let Some(url) = rpc_url {
        return Ok(url);
    }
    if let Ok(custom_url) = env::var("SUI_RPC_URL") {
        return Ok(custom_url);
    }

    let chain = chain_override
        .or_else(|| env::var("SUI_CHAIN").ok())
        .unwrap_or_else(|| "testnet".to_string())
        .to_lowercase();

    match chain.as_str() {
        "devnet" | "testnet" | "mainnet" => {}
        other => {
            return Err(anyhow!(
                "Invalid chain '{}'. Must be one of: devnet, testnet, mainnet",
                other
            ));
        }
    }

    if let Ok(chain_url) = env::var(format!("SUI_RPC_URL_{}", chain.to_uppercase())) {
        return Ok(chain_url);
    }

    Ok(format!("https://fullnode.{}.sui.io:443", chain))
}

/// Derive the Sui address for a 32-byte ed25519 secret key.
pub fn derive_address_from_secret_key(secret_key_bytes: &[u8; 32]) -> sui::Address {
    let signing_key = ed25519_dalek::SigningKey::from_bytes(secret_key_bytes);
    let mut pk_bytes = [0u8; 32];
    pk_bytes.copy_from_slice(signing_key.verifying_key().as_bytes());
    sui::Ed25519PublicKey::new(pk_bytes).derive_address()
}

/// Decode a secret key given as bech32 `suiprivkey...`, base64, or hex
/// (with or without a leading scheme flag byte).
fn decode_secret_key(key_part: &str) -> Result<[u8; 32]> {
    use base64ct::Encoding;

    if key_part.starts_with("suiprivkey") {
        debug!("Decoding secret key as bech32 suiprivkey");
        let (hrp, data, _variant) = bech32::decode(key_part)?;
        if hrp != "suiprivkey" {
            return Err(anyhow!("invalid bech32 hrp"));
        }
        let bytes: Vec<u8> = bech32::FromBase32::from_base32(&data)?;
        if bytes.len() != 33 {
            return Err(anyhow!("bech32 payload must be 33 bytes (flag || key)"));
        }
        if bytes[0] != 0x00 {
            return Err(anyhow!("unsupported key scheme flag; only ed25519 supported"));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes[1..]);
        return Ok(arr);
    }

    let mut bytes = match base64ct::Base64::decode_vec(key_part) {
        Ok(v) => v,
        Err(_) => {
            debug!("Secret key not base64; trying hex");
            let hex_str = key_part.strip_prefix("0x").unwrap_or(key_part);
            hex::decode(hex_str)?
        }
    };

    // Strip a scheme flag byte when present
    if !bytes.is_empty() && (bytes[0] == 0x00 || bytes.len() == 33) {
        bytes = bytes[1..].to_vec();
    }
    if bytes.len() < 32 {
        return Err(anyhow!("secret key must contain at least 32 bytes"));
    }

    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes[..32]);
    Ok(arr)
}

/// Load the signing identity from `SUI_SECRET_KEY` (and verify it against
/// `SUI_ADDRESS` when that is set).
pub fn load_sender_from_env() -> Result<(sui::Address, sui_crypto::ed25519::Ed25519PrivateKey)> {
    let raw = env::var("SUI_SECRET_KEY")?;
    // Accept `scheme:key` keystore exports
    let key_part = raw
        .split_once(':')
        .map(|(_, b)| b.to_string())
        .unwrap_or(raw);

    let arr = decode_secret_key(&key_part)?;
    let derived = derive_address_from_secret_key(&arr);

    let addr = match env::var("SUI_ADDRESS") {
        Ok(env_addr) => {
            let env_addr = sui::Address::from_str(&env_addr)?;
            if env_addr != derived {
                return Err(anyhow!(
                    "Address mismatch: SUI_ADDRESS does not match the address derived from SUI_SECRET_KEY"
                ));
            }
            env_addr
        }
        Err(_) => derived,
    };

    Ok((addr, sui_crypto::ed25519::Ed25519PrivateKey::new(arr)))
}

/// Get the reference gas price from the network.
pub async fn get_reference_gas_price(client: &mut GrpcClient) -> Result<u64> {
    let mut ledger = client.ledger_client();
    let _resp = ledger
        .get_service_info(proto::GetServiceInfoRequest::default())
        .await?
        .into_inner();
    // ServiceInfo does not expose the gas price yet; use the network floor.
    let price = 1_000u64;
    debug!("Using reference gas price: {}", price);
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_key_round_trips_through_decoder() {
        let key = [7u8; 32];
        let decoded = decode_secret_key(&hex::encode(key)).unwrap();
        assert_eq!(decoded, key);
        let decoded = decode_secret_key(&format!("0x{}", hex::encode(key))).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn flagged_key_strips_scheme_byte() {
        let mut flagged = vec![0x00];
        flagged.extend_from_slice(&[9u8; 32]);
        let decoded = decode_secret_key(&hex::encode(flagged)).unwrap();
        assert_eq!(decoded, [9u8; 32]);
    }

    #[test]
    fn short_key_is_rejected() {
        assert!(decode_secret_key(&hex::encode([1u8; 16])).is_err());
    }
}
