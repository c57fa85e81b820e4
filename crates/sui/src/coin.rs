use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sui_rpc::Client as GrpcClient;
use sui_rpc::field::{FieldMask, FieldMaskUtil};
use sui_rpc::proto::sui::rpc::v2 as proto;
use sui_sdk_types as sui;
use tracing::debug;

const MAX_RETRIES: u32 = 6;
const RETRY_DELAY_MS: u64 = 500;
const SUI_COIN_TYPE: &str = "0x2::coin::Coin<0x2::sui::SUI>";

/// RAII guard for an in-use gas coin; dropping it releases the lock.
pub struct CoinLockGuard {
    manager: CoinLockManager,
    coin_id: sui::Address,
}

impl CoinLockGuard {
    pub fn coin_id(&self) -> sui::Address {
        self.coin_id
    }
}

impl Drop for CoinLockGuard {
    fn drop(&mut self) {
        self.manager.release_coin(self.coin_id);
    }
}

/// Prevents two concurrent submissions from spending the same gas coin.
#[derive(Clone)]
pub struct CoinLockManager {
    locks: Arc<Mutex<HashMap<sui::Address, Instant>>>,
    lock_timeout: Duration,
}

impl CoinLockManager {
    pub fn new(lock_timeout_seconds: u64) -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
            lock_timeout: Duration::from_secs(lock_timeout_seconds),
        }
    }

    /// Attempt to lock a coin for exclusive use.
    pub fn try_lock_coin(&self, coin_id: sui::Address) -> Option<CoinLockGuard> {
        let mut locks = self.locks.lock();

        // Drop expired locks first
        let now = Instant::now();
        locks.retain(|_, lock_time| now.duration_since(*lock_time) < self.lock_timeout);

        use std::collections::hash_map::Entry;
        match locks.entry(coin_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(entry) => {
                entry.insert(now);
                Some(CoinLockGuard {
                    manager: self.clone(),
                    coin_id,
                })
            }
        }
    }

    fn release_coin(&self, coin_id: sui::Address) {
        self.locks.lock().remove(&coin_id);
    }
}

static COIN_LOCK_MANAGER: std::sync::OnceLock<CoinLockManager> = std::sync::OnceLock::new();

pub fn get_coin_lock_manager() -> &'static CoinLockManager {
    COIN_LOCK_MANAGER.get_or_init(|| CoinLockManager::new(60))
}

#[derive(Debug, Clone)]
pub struct CoinInfo {
    pub object_ref: sui::ObjectReference,
    pub balance: u64,
}

impl CoinInfo {
    pub fn object_id(&self) -> sui::Address {
        *self.object_ref.object_id()
    }
}

/// Coin<T> BCS layout is { id: UID, balance: Balance<T> { value: u64 } }:
/// skip the 32-byte UID and read the u64.
fn extract_coin_balance_from_contents(contents: &[u8]) -> u64 {
    if contents.len() >= 40 {
        u64::from_le_bytes(contents[32..40].try_into().unwrap_or([0; 8]))
    } else {
        0
    }
}

/// Find a SUI coin with at least `min_balance` and lock it for exclusive
/// use. Retries while all suitable coins are locked by other submissions.
pub async fn fetch_coin(
    client: &mut GrpcClient,
    sender: sui::Address,
    min_balance: u64,
) -> Result<Option<(CoinInfo, CoinLockGuard)>> {
    let lock_manager = get_coin_lock_manager();

    for attempt in 1..=MAX_RETRIES {
        let mut state = client.state_client();

        let mut request = proto::ListOwnedObjectsRequest::default();
        request.owner = Some(sender.to_string());
        request.page_size = Some(100);
        request.read_mask = Some(FieldMask::from_paths([
            "object_id",
            "version",
            "digest",
            "object_type",
            "contents",
        ]));
        request.object_type = Some(SUI_COIN_TYPE.to_string());

        let resp = state.list_owned_objects(request).await?.into_inner();
        debug!(
            "Attempt {}/{}: found {} SUI coins for {}",
            attempt,
            MAX_RETRIES,
            resp.objects.len(),
            sender
        );

        let mut suitable_coins = Vec::new();
        for obj in resp.objects {
            let (Some(id_str), Some(version), Some(digest_str)) =
                (&obj.object_id, obj.version, &obj.digest)
            else {
                continue;
            };
            let object_id = sui::Address::from_str(id_str)?;
            let digest = sui::Digest::from_base58(digest_str)?;
            let object_ref = sui::ObjectReference::new(object_id, version, digest);

            let balance = obj
                .contents
                .as_ref()
                .and_then(|contents| contents.value.as_ref())
                .map(|value| extract_coin_balance_from_contents(value))
                .unwrap_or(0);

            if balance >= min_balance {
                suitable_coins.push((object_id, object_ref, balance));
            }
        }

        // Prefer the smallest sufficient coin
        suitable_coins.sort_by(|a, b| a.2.cmp(&b.2));

        for (object_id, object_ref, balance) in suitable_coins {
            if let Some(guard) = lock_manager.try_lock_coin(object_id) {
                debug!(
                    "Locked gas coin {} with balance {} MIST",
                    object_id, balance
                );
                return Ok(Some((CoinInfo { object_ref, balance }, guard)));
            }
            debug!("Coin {} is already locked", object_id);
        }

        if attempt < MAX_RETRIES {
            tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64)).await;
        }
    }

    debug!(
        "No unlocked coins with balance >= {} MIST after {} attempts",
        min_balance, MAX_RETRIES
    );
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin_id(n: u8) -> sui::Address {
        sui::Address::from_str(&format!("0x{:064x}", n)).unwrap()
    }

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let manager = CoinLockManager::new(60);
        let guard = manager.try_lock_coin(coin_id(1)).unwrap();
        assert!(manager.try_lock_coin(coin_id(1)).is_none());
        assert!(manager.try_lock_coin(coin_id(2)).is_some());
        drop(guard);
        assert!(manager.try_lock_coin(coin_id(1)).is_some());
    }

    #[test]
    fn expired_locks_are_reclaimed() {
        let manager = CoinLockManager::new(0);
        let _guard = manager.try_lock_coin(coin_id(1)).unwrap();
        // Zero timeout: the lock is already expired for the next taker.
        assert!(manager.try_lock_coin(coin_id(1)).is_some());
    }

    #[test]
    fn balance_extraction_skips_uid() {
        let mut contents = vec![0u8; 32];
        contents.extend_from_slice(&42u64.to_le_bytes());
        assert_eq!(extract_coin_balance_from_contents(&contents), 42);
        assert_eq!(extract_coin_balance_from_contents(&[0u8; 10]), 0);
    }
}
