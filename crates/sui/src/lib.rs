// Module declarations
pub mod chain;
pub mod coin;
pub mod constants;
pub mod error;
pub mod events;
pub mod fetch;
pub mod interface;
pub mod object;
pub mod parse;
pub mod state;
pub mod transactions;
pub mod wallet;

// Re-export commonly used types
pub use chain::{get_reference_gas_price, load_sender_from_env, resolve_rpc_url};
pub use coin::{CoinInfo, CoinLockGuard, CoinLockManager, fetch_coin, get_coin_lock_manager};
pub use constants::{MIST_PER_SUI, mist_to_sui, sui_to_mist, suiscan_url};
pub use error::{MarketplaceError, Result};
pub use fetch::{
    FightMomentNFT, KioskListing, MintableMoment, MomentMetadata, UserKiosk,
    fetch_marketplace_listings, fetch_mintable_moment, fetch_mintable_moments,
    fetch_moment_from_registry, fetch_moments_from_registry, fetch_user_kiosk_caps,
    fetch_user_kiosks, fetch_user_nfts,
};
pub use interface::MarketplaceInterface;
pub use object::{ObjectInput, fetch_object, resolve_object_input};
pub use state::SharedSuiState;
pub use transactions::{
    GasConfig, build_create_kiosk_and_mint_tx, build_delist_tx, build_list_tx,
    build_mint_and_lock_tx, build_purchase_to_new_kiosk_tx, build_purchase_tx,
    build_register_moment_tx,
};
pub use wallet::sign_and_execute;
