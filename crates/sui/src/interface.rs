use crate::constants::FALLBACK_GAS_BUDGET_MIST;
use crate::error::{MarketplaceError, Result};
use crate::fetch::{KioskListing, UserKiosk, fetch_mintable_moment, fetch_user_kiosk_caps};
use crate::object::resolve_object_input;
use crate::state::SharedSuiState;
use crate::transactions::{
    CreateKioskAndMintParams, DelistNftParams, GasConfig, ListNftParams, MintAndLockParams,
    PurchaseParams, PurchaseToNewKioskParams, RegisterMomentParams, build_create_kiosk_and_mint_tx,
    build_delist_tx, build_list_tx, build_mint_and_lock_tx, build_purchase_to_new_kiosk_tx,
    build_purchase_tx, build_register_moment_tx,
};
use crate::wallet;
use anyhow::anyhow;
use std::str::FromStr;
use sui_sdk_types as sui;
use tracing::{debug, info};

/// Descriptive fields for a new moment registration; media identifiers
/// come from the completed blob uploads.
#[derive(Debug, Clone)]
pub struct RegisterMomentRequest {
    pub match_id: String,
    pub fighter_a: String,
    pub fighter_b: String,
    pub moment_type: String,
    pub video_blob_id: String,
    pub thumbnail_blob_id: String,
    pub content_hash: String,
    pub max_supply: u64,
}

/// High-level marketplace operations: pair object resolution, the pure
/// transaction builders, and the signing wallet.
pub struct MarketplaceInterface;

impl MarketplaceInterface {
    pub fn new() -> Self {
        Self
    }

    /// Build a transaction twice around a gas estimate, then sign and
    /// execute it. `min_gas_balance` is the coin balance the gas
    /// selection must find (price + budget for purchases).
    async fn execute_with_gas<F>(&self, min_gas_balance: u64, build: F) -> Result<String>
    where
        F: Fn(&GasConfig) -> Result<sui::Transaction>,
    {
        let (mut gas, guard) = wallet::prepare_gas(min_gas_balance).await?;

        gas.budget = wallet::simulation_budget();
        let draft = build(&gas)?;

        gas.budget = wallet::estimate_gas_budget(&draft).await;
        let tx = build(&gas)?;

        wallet::sign_and_execute(tx, guard).await
    }

    /// Register a new mintable moment (admin operation).
    pub async fn register_moment(&self, request: RegisterMomentRequest) -> Result<String> {
        let state = SharedSuiState::get_instance();
        let package_id = state.package_id();
        let admin_cap_id = state.admin_cap_id().ok_or(MarketplaceError::AdminCapMissing)?;
        let registry_id = state
            .moment_registry_id()
            .ok_or_else(|| anyhow!("MOMENT_REGISTRY_ID must be set to register moments"))?;

        info!("Registering moment {}", request.match_id);

        let registry = resolve_object_input(registry_id).await?;
        let admin_cap = resolve_object_input(admin_cap_id).await?;

        let params = RegisterMomentParams {
            registry,
            admin_cap,
            match_id: request.match_id,
            fighter_a: request.fighter_a,
            fighter_b: request.fighter_b,
            moment_type: request.moment_type,
            video_blob_id: request.video_blob_id,
            thumbnail_blob_id: request.thumbnail_blob_id,
            content_hash: request.content_hash,
            max_supply: request.max_supply,
        };

        self.execute_with_gas(FALLBACK_GAS_BUDGET_MIST, |gas| {
            build_register_moment_tx(package_id, &params, gas)
        })
        .await
    }

    /// Mint against a moment. First-time minters get a kiosk created in
    /// the same bundle; repeat minters mint into their existing kiosk.
    pub async fn mint(&self, moment_id: &str) -> Result<String> {
        let state = SharedSuiState::get_instance();
        let package_id = state.package_id();
        let sender = state.get_sui_address_required();
        let registry_id = state
            .moment_registry_id()
            .ok_or_else(|| anyhow!("MOMENT_REGISTRY_ID must be set to mint"))?;

        let moment = fetch_mintable_moment(moment_id)
            .await?
            .ok_or_else(|| MarketplaceError::ObjectNotFound(moment_id.to_string()))?;

        let kiosks = fetch_user_kiosk_caps(&sender.to_string()).await?;

        let registry = resolve_object_input(registry_id).await?;
        let moment_input = resolve_object_input(sui::Address::from_str(moment_id)?).await?;
        let policy = resolve_object_input(state.transfer_policy_id())
            .await?
            .immutable();

        match kiosks.into_iter().next() {
            None => {
                debug!("No kiosk for {}; minting into a new kiosk", sender);
                let params = CreateKioskAndMintParams {
                    registry,
                    moment,
                    moment_input,
                    policy,
                };
                self.execute_with_gas(FALLBACK_GAS_BUDGET_MIST, |gas| {
                    build_create_kiosk_and_mint_tx(package_id, &params, gas)
                })
                .await
            }
            Some(kiosk) => {
                debug!("Minting into existing kiosk {}", kiosk.kiosk_id);
                let kiosk_input =
                    resolve_object_input(sui::Address::from_str(&kiosk.kiosk_id)?).await?;
                let kiosk_cap =
                    resolve_object_input(sui::Address::from_str(&kiosk.cap_id)?).await?;
                let params = MintAndLockParams {
                    registry,
                    moment,
                    moment_input,
                    kiosk: kiosk_input,
                    kiosk_cap,
                    policy,
                };
                self.execute_with_gas(FALLBACK_GAS_BUDGET_MIST, |gas| {
                    build_mint_and_lock_tx(package_id, &params, gas)
                })
                .await
            }
        }
    }

    /// List an owned NFT for sale.
    pub async fn list_nft(&self, kiosk: &UserKiosk, nft_id: &str, price: u64) -> Result<String> {
        let package_id = SharedSuiState::get_instance().package_id();
        info!("Listing NFT {} for {} MIST", nft_id, price);

        let params = ListNftParams {
            kiosk: resolve_object_input(sui::Address::from_str(&kiosk.kiosk_id)?).await?,
            kiosk_cap: resolve_object_input(sui::Address::from_str(&kiosk.cap_id)?).await?,
            nft_id: sui::Address::from_str(nft_id)?,
            price,
        };

        self.execute_with_gas(FALLBACK_GAS_BUDGET_MIST, |gas| {
            build_list_tx(package_id, &params, gas)
        })
        .await
    }

    /// Take an NFT off the market.
    pub async fn delist_nft(&self, kiosk: &UserKiosk, nft_id: &str) -> Result<String> {
        let package_id = SharedSuiState::get_instance().package_id();
        info!("Delisting NFT {}", nft_id);

        let params = DelistNftParams {
            kiosk: resolve_object_input(sui::Address::from_str(&kiosk.kiosk_id)?).await?,
            kiosk_cap: resolve_object_input(sui::Address::from_str(&kiosk.cap_id)?).await?,
            nft_id: sui::Address::from_str(nft_id)?,
        };

        self.execute_with_gas(FALLBACK_GAS_BUDGET_MIST, |gas| {
            build_delist_tx(package_id, &params, gas)
        })
        .await
    }

    /// Purchase a listed NFT. Buyers without a kiosk get one created,
    /// shared and handed over in the same bundle.
    pub async fn purchase(&self, listing: &KioskListing) -> Result<String> {
        let state = SharedSuiState::get_instance();
        let package_id = state.package_id();
        let sender = state.get_sui_address_required();

        info!("Purchasing NFT {} for {} MIST", listing.nft_id, listing.price);

        let seller_kiosk =
            resolve_object_input(sui::Address::from_str(&listing.kiosk_id)?).await?;
        let policy = resolve_object_input(state.transfer_policy_id())
            .await?
            .immutable();
        let nft_id = sui::Address::from_str(&listing.nft_id)?;

        // The payment is split off the gas coin, so selection needs
        // price + budget.
        let min_gas_balance = listing.price + FALLBACK_GAS_BUDGET_MIST;

        let kiosks = fetch_user_kiosk_caps(&sender.to_string()).await?;
        match kiosks.into_iter().next() {
            Some(kiosk) => {
                let params = PurchaseParams {
                    seller_kiosk,
                    buyer_kiosk: resolve_object_input(sui::Address::from_str(&kiosk.kiosk_id)?)
                        .await?,
                    buyer_kiosk_cap: resolve_object_input(sui::Address::from_str(&kiosk.cap_id)?)
                        .await?,
                    policy,
                    nft_id,
                    price: listing.price,
                };
                self.execute_with_gas(min_gas_balance, |gas| {
                    build_purchase_tx(package_id, &params, gas)
                })
                .await
            }
            None => {
                debug!("No kiosk for {}; purchasing into a new kiosk", sender);
                let params = PurchaseToNewKioskParams {
                    seller_kiosk,
                    policy,
                    nft_id,
                    price: listing.price,
                    buyer: sender,
                };
                self.execute_with_gas(min_gas_balance, |gas| {
                    build_purchase_to_new_kiosk_tx(package_id, &params, gas)
                })
                .await
            }
        }
    }
}

impl Default for MarketplaceInterface {
    fn default() -> Self {
        Self::new()
    }
}
