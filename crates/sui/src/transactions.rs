use crate::constants::{CLOCK_INITIAL_SHARED_VERSION, CLOCK_OBJECT_ID};
use crate::error::{MarketplaceError, Result};
use crate::fetch::MintableMoment;
use crate::object::ObjectInput;
use std::str::FromStr;
use sui_sdk_types as sui;
use sui_transaction_builder::{Function, Serialized, TransactionBuilder, unresolved};

/// The Sui framework package (kiosk, transfer_policy, transfer).
const SUI_FRAMEWORK: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000002";

/// Gas data for an unsigned transaction. Resolved by the wallet layer;
/// builders only attach it.
#[derive(Debug, Clone)]
pub struct GasConfig {
    pub sender: sui::Address,
    pub payment: sui::ObjectReference,
    pub budget: u64,
    pub price: u64,
}

/// Move String argument mirror
#[derive(serde::Serialize)]
struct MoveString {
    bytes: Vec<u8>,
}

fn move_string(s: &str) -> MoveString {
    MoveString {
        bytes: s.as_bytes().to_vec(),
    }
}

fn builder_with_gas(gas: &GasConfig) -> TransactionBuilder {
    let mut tb = TransactionBuilder::new();
    tb.set_sender(gas.sender);
    tb.set_gas_budget(gas.budget);
    tb.set_gas_price(gas.price);
    tb.add_gas_objects(vec![unresolved::Input::owned(
        *gas.payment.object_id(),
        gas.payment.version(),
        *gas.payment.digest(),
    )]);
    tb
}

fn framework_address() -> sui::Address {
    sui::Address::from_str(SUI_FRAMEWORK).expect("valid framework address")
}

fn clock_input() -> unresolved::Input {
    let clock_id = sui::Address::from_str(CLOCK_OBJECT_ID).expect("valid clock object ID");
    unresolved::Input::shared(clock_id, CLOCK_INITIAL_SHARED_VERSION, false)
}

fn function(
    package: sui::Address,
    module: &str,
    name: &str,
    type_args: Vec<sui::TypeTag>,
) -> Result<Function> {
    Ok(Function::new(
        package,
        module.parse().map_err(|e| {
            MarketplaceError::TransactionBuildError(format!(
                "invalid module name '{}': {}",
                module, e
            ))
        })?,
        name.parse().map_err(|e| {
            MarketplaceError::TransactionBuildError(format!(
                "invalid function name '{}': {}",
                name, e
            ))
        })?,
        type_args,
    ))
}

fn nft_type_tag(package: sui::Address) -> Result<sui::TypeTag> {
    let tag = format!("{}::types::FightMomentNFT", package);
    sui::TypeTag::from_str(&tag).map_err(|e| {
        MarketplaceError::TransactionBuildError(format!("invalid type tag '{}': {}", tag, e))
    })
}

fn kiosk_type_tag() -> Result<sui::TypeTag> {
    sui::TypeTag::from_str("0x2::kiosk::Kiosk").map_err(|e| {
        MarketplaceError::TransactionBuildError(format!("invalid kiosk type tag: {}", e))
    })
}

/// Destructure a two-value command result. The kiosk purchase call yields
/// (item, transfer request); anything else is a build defect.
fn two_results(arg: sui::Argument, what: &str) -> Result<(sui::Argument, sui::Argument)> {
    match arg {
        sui::Argument::Result(ix) => Ok((
            sui::Argument::NestedResult(ix, 0),
            sui::Argument::NestedResult(ix, 1),
        )),
        other => Err(MarketplaceError::TransactionBuildError(format!(
            "{} did not produce a command result: {:?}",
            what, other
        ))),
    }
}

fn finish(tb: TransactionBuilder) -> Result<sui::Transaction> {
    tb.finish()
        .map_err(|e| MarketplaceError::TransactionBuildError(e.to_string()))
}

fn ensure_mintable(moment: &MintableMoment) -> Result<()> {
    if moment.is_sold_out() {
        return Err(MarketplaceError::SoldOut(moment.id.clone()));
    }
    Ok(())
}

// ---------- Moment registration ----------

#[derive(Debug, Clone)]
pub struct RegisterMomentParams {
    pub registry: ObjectInput,
    pub admin_cap: ObjectInput,
    pub match_id: String,
    pub fighter_a: String,
    pub fighter_b: String,
    pub moment_type: String,
    pub video_blob_id: String,
    pub thumbnail_blob_id: String,
    pub content_hash: String,
    pub max_supply: u64,
}

/// Build the admin registration bundle: a single `admin::register_moment`
/// call with the contract-fixed argument order. The `walrus://` URIs are
/// derived from the blob ids; the video blob id doubles as the main blob
/// id.
pub fn build_register_moment_tx(
    package: sui::Address,
    params: &RegisterMomentParams,
    gas: &GasConfig,
) -> Result<sui::Transaction> {
    let video_uri = format!("walrus://{}", params.video_blob_id);
    let thumbnail_uri = format!("walrus://{}", params.thumbnail_blob_id);

    let mut tb = builder_with_gas(gas);
    let registry_arg = tb.input(params.registry.to_unresolved());
    let admin_cap_arg = tb.input(params.admin_cap.to_unresolved());

    let args = vec![
        registry_arg,
        admin_cap_arg,
        tb.input(Serialized(&move_string(&params.match_id))),
        tb.input(Serialized(&move_string(&params.fighter_a))),
        tb.input(Serialized(&move_string(&params.fighter_b))),
        tb.input(Serialized(&move_string(&params.moment_type))),
        tb.input(Serialized(&move_string(&video_uri))),
        tb.input(Serialized(&move_string(&thumbnail_uri))),
        tb.input(Serialized(&move_string(&params.video_blob_id))),
        tb.input(Serialized(&move_string(&params.video_blob_id))),
        tb.input(Serialized(&move_string(&params.thumbnail_blob_id))),
        tb.input(Serialized(&move_string(&params.content_hash))),
        tb.input(Serialized(&params.max_supply)),
    ];

    let func = function(package, "admin", "register_moment", vec![])?;
    tb.move_call(func, args);
    finish(tb)
}

// ---------- Minting ----------

#[derive(Debug, Clone)]
pub struct CreateKioskAndMintParams {
    pub registry: ObjectInput,
    pub moment: MintableMoment,
    pub moment_input: ObjectInput,
    pub policy: ObjectInput,
}

/// First-time mint: one `accessor::create_kiosk_and_mint` call that
/// creates the caller's kiosk and mints into it. Refuses sold-out
/// moments.
pub fn build_create_kiosk_and_mint_tx(
    package: sui::Address,
    params: &CreateKioskAndMintParams,
    gas: &GasConfig,
) -> Result<sui::Transaction> {
    ensure_mintable(&params.moment)?;

    let mut tb = builder_with_gas(gas);
    let registry_arg = tb.input(params.registry.to_unresolved());
    let moment_arg = tb.input(params.moment_input.to_unresolved());
    let policy_arg = tb.input(params.policy.to_unresolved());
    let clock_arg = tb.input(clock_input());

    let func = function(package, "accessor", "create_kiosk_and_mint", vec![])?;
    tb.move_call(func, vec![registry_arg, moment_arg, policy_arg, clock_arg]);
    finish(tb)
}

#[derive(Debug, Clone)]
pub struct MintAndLockParams {
    pub registry: ObjectInput,
    pub moment: MintableMoment,
    pub moment_input: ObjectInput,
    pub kiosk: ObjectInput,
    pub kiosk_cap: ObjectInput,
    pub policy: ObjectInput,
}

/// Repeat mint into an existing kiosk: one `accessor::mint_and_lock`
/// call. Refuses sold-out moments.
pub fn build_mint_and_lock_tx(
    package: sui::Address,
    params: &MintAndLockParams,
    gas: &GasConfig,
) -> Result<sui::Transaction> {
    ensure_mintable(&params.moment)?;

    let mut tb = builder_with_gas(gas);
    let registry_arg = tb.input(params.registry.to_unresolved());
    let moment_arg = tb.input(params.moment_input.to_unresolved());
    let kiosk_arg = tb.input(params.kiosk.to_unresolved());
    let cap_arg = tb.input(params.kiosk_cap.to_unresolved());
    let policy_arg = tb.input(params.policy.to_unresolved());
    let clock_arg = tb.input(clock_input());

    let func = function(package, "accessor", "mint_and_lock", vec![])?;
    tb.move_call(
        func,
        vec![registry_arg, moment_arg, kiosk_arg, cap_arg, policy_arg, clock_arg],
    );
    finish(tb)
}

// ---------- Listing ----------

#[derive(Debug, Clone)]
pub struct ListNftParams {
    pub kiosk: ObjectInput,
    pub kiosk_cap: ObjectInput,
    pub nft_id: sui::Address,
    /// Price in MIST
    pub price: u64,
}

/// List an NFT through the generic kiosk entry point.
pub fn build_list_tx(
    package: sui::Address,
    params: &ListNftParams,
    gas: &GasConfig,
) -> Result<sui::Transaction> {
    let mut tb = builder_with_gas(gas);
    let kiosk_arg = tb.input(params.kiosk.to_unresolved());
    let cap_arg = tb.input(params.kiosk_cap.to_unresolved());
    let item_arg = tb.input(Serialized(&params.nft_id));
    let price_arg = tb.input(Serialized(&params.price));

    let func = function(
        framework_address(),
        "kiosk",
        "list",
        vec![nft_type_tag(package)?],
    )?;
    tb.move_call(func, vec![kiosk_arg, cap_arg, item_arg, price_arg]);
    finish(tb)
}

#[derive(Debug, Clone)]
pub struct DelistNftParams {
    pub kiosk: ObjectInput,
    pub kiosk_cap: ObjectInput,
    pub nft_id: sui::Address,
}

/// Delist an NFT through the generic kiosk entry point.
pub fn build_delist_tx(
    package: sui::Address,
    params: &DelistNftParams,
    gas: &GasConfig,
) -> Result<sui::Transaction> {
    let mut tb = builder_with_gas(gas);
    let kiosk_arg = tb.input(params.kiosk.to_unresolved());
    let cap_arg = tb.input(params.kiosk_cap.to_unresolved());
    let item_arg = tb.input(Serialized(&params.nft_id));

    let func = function(
        framework_address(),
        "kiosk",
        "delist",
        vec![nft_type_tag(package)?],
    )?;
    tb.move_call(func, vec![kiosk_arg, cap_arg, item_arg]);
    finish(tb)
}

// ---------- Purchase ----------

#[derive(Debug, Clone)]
pub struct PurchaseParams {
    pub seller_kiosk: ObjectInput,
    pub buyer_kiosk: ObjectInput,
    pub buyer_kiosk_cap: ObjectInput,
    pub policy: ObjectInput,
    pub nft_id: sui::Address,
    /// Price in MIST; must match the listing exactly
    pub price: u64,
}

/// Purchase into an existing kiosk. Strict command order: split the exact
/// price off gas, purchase from the seller's kiosk, lock into the buyer's
/// kiosk, confirm the transfer request. The request is consumed exactly
/// once; both the lock and the confirm reference the same policy input.
pub fn build_purchase_tx(
    package: sui::Address,
    params: &PurchaseParams,
    gas: &GasConfig,
) -> Result<sui::Transaction> {
    let nft_type = nft_type_tag(package)?;

    let mut tb = builder_with_gas(gas);
    let seller_kiosk_arg = tb.input(params.seller_kiosk.to_unresolved());
    let buyer_kiosk_arg = tb.input(params.buyer_kiosk.to_unresolved());
    let buyer_cap_arg = tb.input(params.buyer_kiosk_cap.to_unresolved());
    let policy_arg = tb.input(params.policy.to_unresolved());
    let item_arg = tb.input(Serialized(&params.nft_id));
    let price_arg = tb.input(Serialized(&params.price));

    // 1. Split the exact price off the gas coin
    let split = tb.split_coins(sui::Argument::Gas, vec![price_arg]);
    let payment = split.nested(0).ok_or_else(|| {
        MarketplaceError::TransactionBuildError("coin split produced no result".to_string())
    })?;

    // 2. Purchase: yields the item and a pending transfer request
    let purchase = function(framework_address(), "kiosk", "purchase", vec![nft_type.clone()])?;
    let purchased = tb.move_call(purchase, vec![seller_kiosk_arg, item_arg, payment]);
    let (nft, transfer_request) = two_results(purchased, "kiosk::purchase")?;

    // 3. Lock into the buyer's kiosk under the policy
    let lock = function(framework_address(), "kiosk", "lock", vec![nft_type.clone()])?;
    tb.move_call(lock, vec![buyer_kiosk_arg, buyer_cap_arg, policy_arg, nft]);

    // 4. Confirm the transfer request against the same policy
    let confirm = function(
        framework_address(),
        "transfer_policy",
        "confirm_request",
        vec![nft_type],
    )?;
    tb.move_call(confirm, vec![policy_arg, transfer_request]);

    finish(tb)
}

#[derive(Debug, Clone)]
pub struct PurchaseToNewKioskParams {
    pub seller_kiosk: ObjectInput,
    pub policy: ObjectInput,
    pub nft_id: sui::Address,
    /// Price in MIST; must match the listing exactly
    pub price: u64,
    pub buyer: sui::Address,
}

/// Purchase for a buyer without a kiosk. Same four purchase steps, plus:
/// create the kiosk before the lock references it, share it in the same
/// bundle, and hand the capability to the buyer.
pub fn build_purchase_to_new_kiosk_tx(
    package: sui::Address,
    params: &PurchaseToNewKioskParams,
    gas: &GasConfig,
) -> Result<sui::Transaction> {
    let nft_type = nft_type_tag(package)?;

    let mut tb = builder_with_gas(gas);
    let seller_kiosk_arg = tb.input(params.seller_kiosk.to_unresolved());
    let policy_arg = tb.input(params.policy.to_unresolved());
    let item_arg = tb.input(Serialized(&params.nft_id));
    let price_arg = tb.input(Serialized(&params.price));

    // 1. Split the exact price off the gas coin
    let split = tb.split_coins(sui::Argument::Gas, vec![price_arg]);
    let payment = split.nested(0).ok_or_else(|| {
        MarketplaceError::TransactionBuildError("coin split produced no result".to_string())
    })?;

    // 2. Purchase from the seller's kiosk
    let purchase = function(framework_address(), "kiosk", "purchase", vec![nft_type.clone()])?;
    let purchased = tb.move_call(purchase, vec![seller_kiosk_arg, item_arg, payment]);
    let (nft, transfer_request) = two_results(purchased, "kiosk::purchase")?;

    // 3. Create the buyer's kiosk
    let new_kiosk = function(framework_address(), "kiosk", "new", vec![])?;
    let created = tb.move_call(new_kiosk, vec![]);
    let (kiosk, kiosk_cap) = two_results(created, "kiosk::new")?;

    // 4. Lock into the new kiosk
    let lock = function(framework_address(), "kiosk", "lock", vec![nft_type.clone()])?;
    tb.move_call(lock, vec![kiosk, kiosk_cap, policy_arg, nft]);

    // 5. Confirm the transfer request
    let confirm = function(
        framework_address(),
        "transfer_policy",
        "confirm_request",
        vec![nft_type],
    )?;
    tb.move_call(confirm, vec![policy_arg, transfer_request]);

    // 6. Publish the kiosk as a shared object; an unshared kiosk is
    //    unusable by its new owner
    let share = function(
        framework_address(),
        "transfer",
        "public_share_object",
        vec![kiosk_type_tag()?],
    )?;
    tb.move_call(share, vec![kiosk]);

    // 7. Hand the capability to the buyer
    let buyer_arg = tb.input(Serialized(&params.buyer));
    tb.transfer_objects(vec![kiosk_cap], buyer_arg);

    finish(tb)
}
