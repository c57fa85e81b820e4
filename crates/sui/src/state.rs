use crate::chain::load_sender_from_env;
use anyhow::Result;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::OnceLock;
use sui_crypto::ed25519::Ed25519PrivateKey;
use sui_rpc::Client;
use sui_sdk_types as sui;
use tokio::sync::Mutex;
use tracing::{info, warn};

// Global static SharedSuiState instance with initialization lock
static SHARED_SUI_STATE: OnceLock<Arc<SharedSuiState>> = OnceLock::new();
static INIT_LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();

/// Marketplace object ids resolved from the environment.
#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    /// Marketplace Move package (MOMENTS_PACKAGE_ID)
    pub package_id: sui::Address,
    /// Shared TransferPolicy<FightMomentNFT> (TRANSFER_POLICY_ID)
    pub transfer_policy_id: sui::Address,
    /// Shared MomentRegistry (MOMENT_REGISTRY_ID); registry reads degrade
    /// to empty results without it
    pub moment_registry_id: Option<sui::Address>,
    /// AdminCap (ADMIN_CAP_ID); admin operations are unavailable without it
    pub admin_cap_id: Option<sui::Address>,
    /// Collection tag (COLLECTION_ID)
    pub collection_id: String,
    /// Selected chain (SUI_CHAIN)
    pub chain: String,
}

impl MarketplaceConfig {
    /// Read the marketplace configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let package_id = required_address("MOMENTS_PACKAGE_ID")?;
        let transfer_policy_id = required_address("TRANSFER_POLICY_ID")?;
        let moment_registry_id = optional_address("MOMENT_REGISTRY_ID")?;
        let admin_cap_id = optional_address("ADMIN_CAP_ID")?;

        if moment_registry_id.is_none() {
            warn!("MOMENT_REGISTRY_ID is not set; registry reads will return empty results");
        }
        if admin_cap_id.is_none() {
            warn!("ADMIN_CAP_ID is not set; moment registration is unavailable");
        }

        Ok(Self {
            package_id,
            transfer_policy_id,
            moment_registry_id,
            admin_cap_id,
            collection_id: env::var("COLLECTION_ID")
                .unwrap_or_else(|_| "fight-moments-v1".to_string()),
            chain: env::var("SUI_CHAIN").unwrap_or_else(|_| "testnet".to_string()),
        })
    }

    /// Fully qualified FightMomentNFT type tag.
    pub fn nft_type(&self) -> String {
        format!("{}::types::FightMomentNFT", self.package_id)
    }
}

fn required_address(var: &str) -> Result<sui::Address> {
    let raw = env::var(var).map_err(|_| {
        anyhow::anyhow!("{} environment variable must be set", var)
    })?;
    sui::Address::from_str(raw.trim())
        .map_err(|e| anyhow::anyhow!("Invalid {} address format: {}", var, e))
}

fn optional_address(var: &str) -> Result<Option<sui::Address>> {
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => Ok(Some(
            sui::Address::from_str(raw.trim())
                .map_err(|e| anyhow::anyhow!("Invalid {} address format: {}", var, e))?,
        )),
        _ => Ok(None),
    }
}

pub struct SharedSuiState {
    sui_client: Client,
    sui_address: Option<sui::Address>,
    sui_private_key: Option<Ed25519PrivateKey>,
    config: MarketplaceConfig,
}

impl SharedSuiState {
    /// Check if SharedSuiState is already initialized
    pub fn is_initialized() -> bool {
        SHARED_SUI_STATE.get().is_some()
    }

    /// Initialize for browsing only: no signing identity is loaded.
    pub async fn initialize_read_only(rpc_url: &str) -> Result<()> {
        Self::initialize_inner(rpc_url, false).await
    }

    /// Initialize with the signing identity from the environment.
    pub async fn initialize(rpc_url: &str) -> Result<()> {
        Self::initialize_inner(rpc_url, true).await
    }

    async fn initialize_inner(rpc_url: &str, with_signer: bool) -> Result<()> {
        if Self::is_initialized() {
            return Ok(());
        }

        let init_lock = INIT_LOCK.get_or_init(|| Arc::new(Mutex::new(())));
        let _guard = init_lock.lock().await;

        // Another task may have initialized while we waited for the lock
        if Self::is_initialized() {
            return Ok(());
        }

        info!("Initializing SharedSuiState with RPC URL: {}", rpc_url);

        let sui_client = Client::new(rpc_url)
            .map_err(|e| anyhow::anyhow!("Failed to create Sui client: {}", e))?;

        // Event queries go over JSON-RPC against the same fullnode
        crate::events::set_query_url(rpc_url);

        let config = MarketplaceConfig::from_env()?;

        let (sui_address, sui_private_key) = if with_signer {
            let (addr, key) = load_sender_from_env()?;
            info!("Initialized SharedSuiState with address: {}", addr);
            (Some(addr), Some(key))
        } else {
            info!("Initialized SharedSuiState in read-only mode");
            (None, None)
        };

        let state = Arc::new(Self {
            sui_client,
            sui_address,
            sui_private_key,
            config,
        });

        SHARED_SUI_STATE
            .set(state)
            .map_err(|_| anyhow::anyhow!("Failed to set SharedSuiState - this should not happen"))?;

        Ok(())
    }

    /// Get the global SharedSuiState instance
    pub fn get_instance() -> Arc<SharedSuiState> {
        SHARED_SUI_STATE
            .get()
            .expect("SharedSuiState not initialized. Call SharedSuiState::initialize() first.")
            .clone()
    }

    pub(crate) fn get_sui_client(&self) -> Client {
        self.sui_client.clone()
    }

    pub fn config(&self) -> &MarketplaceConfig {
        &self.config
    }

    pub fn package_id(&self) -> sui::Address {
        self.config.package_id
    }

    pub fn transfer_policy_id(&self) -> sui::Address {
        self.config.transfer_policy_id
    }

    pub fn moment_registry_id(&self) -> Option<sui::Address> {
        self.config.moment_registry_id
    }

    pub fn admin_cap_id(&self) -> Option<sui::Address> {
        self.config.admin_cap_id
    }

    /// Get the Sui address (None in read-only mode)
    pub fn get_sui_address(&self) -> Option<sui::Address> {
        self.sui_address
    }

    /// Get the Sui address or panic (for transaction operations)
    pub fn get_sui_address_required(&self) -> sui::Address {
        self.sui_address
            .expect("Sui address should be initialized for transaction operations")
    }

    /// Get the Sui private key (None in read-only mode)
    pub(crate) fn get_sui_private_key(&self) -> Option<&Ed25519PrivateKey> {
        self.sui_private_key.as_ref()
    }

    /// Get the Sui private key or panic (for transaction operations)
    pub(crate) fn get_sui_private_key_required(&self) -> &Ed25519PrivateKey {
        self.sui_private_key
            .as_ref()
            .expect("Sui private key should be initialized for transaction operations")
    }
}
