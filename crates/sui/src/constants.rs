// Currency conversion
// 1 SUI = 1,000,000,000 MIST

pub const MIST_PER_SUI: u64 = 1_000_000_000;

/// Convert MIST to SUI for display.
pub fn mist_to_sui(mist: u64) -> f64 {
    mist as f64 / MIST_PER_SUI as f64
}

/// Convert SUI to MIST, flooring toward zero.
pub fn sui_to_mist(sui: f64) -> u64 {
    (sui * MIST_PER_SUI as f64).floor() as u64
}

// Shared system objects

/// The shared Clock object (0x6)
pub const CLOCK_OBJECT_ID: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000006";

/// Initial shared version of the Clock object
pub const CLOCK_INITIAL_SHARED_VERSION: u64 = 1;

// Event page bounds
// The fullnode exposes no per-type event index, so enumeration scans the
// most recent N events of each type.

pub const MOMENT_EVENT_PAGE_SIZE: usize = 50;
pub const MINT_EVENT_PAGE_SIZE: usize = 100;
pub const LISTING_EVENT_PAGE_SIZE: usize = 100;

// Gas budget configuration

/// Gas budget used for dry-run simulation (5 SUI), large enough for any
/// marketplace bundle so estimates are accurate
pub const SIMULATION_GAS_BUDGET_MIST: u64 = 5_000_000_000;

/// Minimum gas budget for any transaction (0.005 SUI)
pub const MIN_GAS_BUDGET_MIST: u64 = 5_000_000;

/// Maximum gas budget for any transaction (0.5 SUI)
pub const MAX_GAS_BUDGET_MIST: u64 = 500_000_000;

/// Fallback gas budget when simulation fails (0.1 SUI)
pub const FALLBACK_GAS_BUDGET_MIST: u64 = 100_000_000;

/// Suiscan explorer URL for a transaction digest.
pub fn suiscan_url(chain: &str, digest: &str) -> String {
    let network = if chain == "mainnet" { "mainnet" } else { "testnet" };
    format!("https://suiscan.xyz/{}/tx/{}", network, digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mist_sui_round_trip() {
        // Integer MIST amounts below 2^53 survive the f64 round trip.
        for mist in [0u64, 1, 999, MIST_PER_SUI, 1_234_567_890, 5 * MIST_PER_SUI] {
            assert_eq!(sui_to_mist(mist_to_sui(mist)), mist);
        }
    }

    #[test]
    fn sui_to_mist_floors() {
        // Sub-MIST precision is floored, never rounded up.
        assert_eq!(sui_to_mist(0.000000001), 1);
        assert_eq!(sui_to_mist(0.0000000019), 1);
        assert_eq!(sui_to_mist(1.5), 1_500_000_000);
    }

    #[test]
    fn suiscan_url_networks() {
        assert_eq!(
            suiscan_url("mainnet", "abc"),
            "https://suiscan.xyz/mainnet/tx/abc"
        );
        // Anything that is not mainnet renders as testnet.
        assert_eq!(
            suiscan_url("devnet", "abc"),
            "https://suiscan.xyz/testnet/tx/abc"
        );
    }
}
