use crate::cache::{QueryCache, REFRESH_INTERVAL, STALE_AFTER};
use anyhow::Result;
use std::sync::OnceLock;
use sui::{
    FightMomentNFT, KioskListing, MintableMoment, UserKiosk, fetch_marketplace_listings,
    fetch_mintable_moment, fetch_mintable_moments, fetch_user_kiosk_caps, fetch_user_nfts,
};
use tracing::{debug, warn};

const MOMENTS_KEY: &str = "mintable_moments";
const LISTINGS_KEY: &str = "marketplace_listings";

fn moments_cache() -> &'static QueryCache<Vec<MintableMoment>> {
    static CACHE: OnceLock<QueryCache<Vec<MintableMoment>>> = OnceLock::new();
    CACHE.get_or_init(|| QueryCache::new(STALE_AFTER))
}

fn moment_cache() -> &'static QueryCache<Option<MintableMoment>> {
    static CACHE: OnceLock<QueryCache<Option<MintableMoment>>> = OnceLock::new();
    CACHE.get_or_init(|| QueryCache::new(STALE_AFTER))
}

fn nft_cache() -> &'static QueryCache<Vec<FightMomentNFT>> {
    static CACHE: OnceLock<QueryCache<Vec<FightMomentNFT>>> = OnceLock::new();
    CACHE.get_or_init(|| QueryCache::new(STALE_AFTER))
}

fn kiosk_cache() -> &'static QueryCache<Vec<UserKiosk>> {
    static CACHE: OnceLock<QueryCache<Vec<UserKiosk>>> = OnceLock::new();
    CACHE.get_or_init(|| QueryCache::new(STALE_AFTER))
}

fn listings_cache() -> &'static QueryCache<Vec<KioskListing>> {
    static CACHE: OnceLock<QueryCache<Vec<KioskListing>>> = OnceLock::new();
    CACHE.get_or_init(|| QueryCache::new(STALE_AFTER))
}

/// Cached view of the mintable moments.
pub async fn mintable_moments() -> Result<Vec<MintableMoment>> {
    moments_cache()
        .get_or_fetch(MOMENTS_KEY, fetch_mintable_moments)
        .await
}

/// Cached view of a single moment.
pub async fn mintable_moment(moment_id: &str) -> Result<Option<MintableMoment>> {
    moment_cache()
        .get_or_fetch(moment_id, || fetch_mintable_moment(moment_id))
        .await
}

/// Cached view of a user's NFTs.
pub async fn user_nfts(address: &str) -> Result<Vec<FightMomentNFT>> {
    nft_cache()
        .get_or_fetch(address, || fetch_user_nfts(address))
        .await
}

/// Cached view of a user's kiosk/capability pairs.
pub async fn user_kiosks(address: &str) -> Result<Vec<UserKiosk>> {
    kiosk_cache()
        .get_or_fetch(address, || fetch_user_kiosk_caps(address))
        .await
}

/// Cached view of the marketplace listings.
pub async fn marketplace_listings() -> Result<Vec<KioskListing>> {
    listings_cache()
        .get_or_fetch(LISTINGS_KEY, fetch_marketplace_listings)
        .await
}

/// Invalidate everything a successful mint changes: the moment's supply
/// and the minter's NFTs and kiosks.
pub fn invalidate_after_mint(moment_id: &str, minter: &str) {
    moments_cache().invalidate(MOMENTS_KEY);
    moment_cache().invalidate(moment_id);
    nft_cache().invalidate(minter);
    kiosk_cache().invalidate(minter);
}

/// Invalidate what listing/delisting/purchase change.
pub fn invalidate_after_trade(address: &str) {
    listings_cache().invalidate(LISTINGS_KEY);
    nft_cache().invalidate(address);
    kiosk_cache().invalidate(address);
}

/// Invalidate the moment enumeration after an admin registration.
pub fn invalidate_after_registration() {
    moments_cache().invalidate(MOMENTS_KEY);
}

/// Refresh the standing queries on a fixed interval. Errors are logged
/// and the stale entries stay usable; the next tick tries again.
pub fn spawn_background_refresh() -> tokio::task::JoinHandle<()> {
    tokio::spawn(async {
        let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
        ticker.tick().await; // the first tick fires immediately
        loop {
            ticker.tick().await;
            match fetch_mintable_moments().await {
                Ok(moments) => {
                    debug!("Background refresh: {} moments", moments.len());
                    moments_cache().put(MOMENTS_KEY, moments);
                }
                Err(e) => warn!("Background refresh of moments failed: {}", e),
            }
            match fetch_marketplace_listings().await {
                Ok(listings) => {
                    debug!("Background refresh: {} listings", listings.len());
                    listings_cache().put(LISTINGS_KEY, listings);
                }
                Err(e) => warn!("Background refresh of listings failed: {}", e),
            }
        }
    })
}
