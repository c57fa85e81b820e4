use crate::chain::get_reference_gas_price;
use crate::coin::{CoinLockGuard, fetch_coin};
use crate::constants::{
    FALLBACK_GAS_BUDGET_MIST, MAX_GAS_BUDGET_MIST, MIN_GAS_BUDGET_MIST, SIMULATION_GAS_BUDGET_MIST,
};
use crate::error::{MarketplaceError, Result};
use crate::state::SharedSuiState;
use crate::transactions::GasConfig;
use anyhow::{Context, anyhow};
use sui_crypto::SuiSigner;
use sui_rpc::field::{FieldMask, FieldMaskUtil};
use sui_rpc::proto::sui::rpc::v2 as proto;
use sui_rpc::proto::sui::rpc::v2::{SimulateTransactionRequest, simulate_transaction_request};
use sui_sdk_types as sui;
use tokio::time::{Duration, sleep};
use tracing::{debug, error, warn};

/// Select and lock a gas coin for a transaction of the given budget.
/// The guard must stay alive until the transaction is confirmed.
pub async fn prepare_gas(budget: u64) -> Result<(GasConfig, CoinLockGuard)> {
    let shared_state = SharedSuiState::get_instance();
    let sender = shared_state.get_sui_address_required();
    let mut client = shared_state.get_sui_client();

    let price = get_reference_gas_price(&mut client).await?;

    let (coin, guard) = fetch_coin(&mut client, sender, budget)
        .await?
        .ok_or_else(|| anyhow!("No available coins with sufficient balance for gas"))?;
    debug!(
        "Gas coin selected: id={} balance={} MIST",
        coin.object_id(),
        coin.balance
    );

    Ok((
        GasConfig {
            sender,
            payment: coin.object_ref,
            budget,
            price,
        },
        guard,
    ))
}

/// Gas budget for building a transaction whose real cost is still
/// unknown: large enough that simulation completes.
pub fn simulation_budget() -> u64 {
    SIMULATION_GAS_BUDGET_MIST
}

/// Simulate a transaction once and derive a budget from the observed gas
/// usage (2x, clamped). Falls back to a fixed budget when simulation
/// fails; submission is never retried from here.
pub async fn estimate_gas_budget(tx: &sui::Transaction) -> u64 {
    let mut client = SharedSuiState::get_instance().get_sui_client();
    let mut execution = client.execution_client();

    let request = SimulateTransactionRequest {
        transaction: Some(tx.clone().into()),
        read_mask: Some(FieldMask::from_paths([
            "transaction.effects.status",
            "transaction.effects.gas_used",
        ])),
        checks: Some(simulate_transaction_request::TransactionChecks::Enabled as i32),
        do_gas_selection: Some(false),
    };

    let response = match execution.simulate_transaction(request).await {
        Ok(resp) => resp.into_inner(),
        Err(e) => {
            warn!("Gas estimation simulation failed: {}", e);
            return FALLBACK_GAS_BUDGET_MIST;
        }
    };

    let gas_used = response
        .transaction
        .as_ref()
        .and_then(|t| t.effects.as_ref())
        .filter(|effects| {
            effects
                .status
                .as_ref()
                .map(|status| status.error.is_none())
                .unwrap_or(false)
        })
        .and_then(|effects| effects.gas_used.as_ref());

    let Some(summary) = gas_used else {
        warn!("Gas estimation simulation reported a failure; using fallback budget");
        return FALLBACK_GAS_BUDGET_MIST;
    };

    let total_used = (summary.computation_cost.unwrap_or(0)
        + summary.storage_cost.unwrap_or(0)
        + summary.non_refundable_storage_fee.unwrap_or(0))
    .saturating_sub(summary.storage_rebate.unwrap_or(0));

    let budget = (total_used * 2).clamp(MIN_GAS_BUDGET_MIST, MAX_GAS_BUDGET_MIST);
    debug!(
        "Gas estimate: {} MIST used, budget {} MIST",
        total_used, budget
    );
    budget
}

/// Surface Move aborts from transaction effects in a readable form.
fn clean_execution_error(error_str: &str) -> String {
    if !error_str.contains("MoveAbort") {
        return error_str.to_string();
    }
    let mut parts = vec![];
    if let Some(start) = error_str.find("abort_code: Some(") {
        let code_start = start + "abort_code: Some(".len();
        if let Some(end) = error_str[code_start..].find(')') {
            parts.push(format!("abort_code: {}", &error_str[code_start..code_start + end]));
        }
    }
    if let Some(start) = error_str.find("function_name: Some(\"") {
        let name_start = start + "function_name: Some(\"".len();
        if let Some(end) = error_str[name_start..].find('"') {
            parts.push(format!("function: {}", &error_str[name_start..name_start + end]));
        }
    }
    if parts.is_empty() {
        "Move execution aborted".to_string()
    } else {
        format!("MoveAbort: {}", parts.join(", "))
    }
}

fn check_transaction_effects(resp: &proto::ExecuteTransactionResponse) -> Result<()> {
    let tx_digest = resp
        .transaction
        .as_ref()
        .and_then(|t| t.digest.as_ref())
        .map(|d| d.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if let Some(ref transaction) = resp.transaction {
        if let Some(ref effects) = transaction.effects {
            if let Some(ref status) = effects.status {
                if let Some(ref error_msg) = status.error {
                    let clean_error = clean_execution_error(&format!("{:?}", error_msg));
                    error!("Transaction failed: {} (tx: {})", clean_error, tx_digest);
                    return Err(MarketplaceError::TransactionError {
                        message: clean_error,
                        tx_digest: Some(tx_digest),
                    });
                }
            }
        }
    }

    let tx_successful = resp
        .transaction
        .as_ref()
        .and_then(|t| t.effects.as_ref())
        .and_then(|e| e.status.as_ref())
        .map(|s| s.error.is_none())
        .unwrap_or(false);

    if !tx_successful {
        error!("Transaction failed despite being executed (tx: {})", tx_digest);
        return Err(MarketplaceError::TransactionError {
            message: "transaction failed despite being executed".to_string(),
            tx_digest: Some(tx_digest),
        });
    }

    Ok(())
}

/// Poll until the transaction digest is visible in the ledger.
async fn wait_for_transaction(tx_digest: &str, max_wait_ms: u64) -> Result<()> {
    let start = std::time::Instant::now();
    let mut client = SharedSuiState::get_instance().get_sui_client();
    let mut ledger = client.ledger_client();

    debug!(
        "Waiting for transaction {} to appear in ledger (max {}ms)",
        tx_digest, max_wait_ms
    );

    loop {
        if start.elapsed().as_millis() > max_wait_ms as u128 {
            return Err(anyhow!(
                "Timeout waiting for transaction {} after {}ms",
                tx_digest,
                max_wait_ms
            )
            .into());
        }

        let request = proto::GetTransactionRequest {
            digest: Some(tx_digest.to_string()),
            read_mask: Some(FieldMask::from_paths(["digest"])),
        };

        match ledger.get_transaction(request).await {
            Ok(_) => {
                debug!(
                    "Transaction {} available after {}ms",
                    tx_digest,
                    start.elapsed().as_millis()
                );
                return Ok(());
            }
            Err(e) => debug!("Transaction {} not yet available: {}", tx_digest, e),
        }

        sleep(Duration::from_millis(200)).await;
    }
}

/// Sign a built transaction with the configured key, execute it, check
/// its effects and wait for the digest. The gas guard is held until
/// confirmation so no concurrent submission reuses the coin.
pub async fn sign_and_execute(
    tx: sui::Transaction,
    gas_guard: CoinLockGuard,
) -> Result<String> {
    let shared_state = SharedSuiState::get_instance();
    let secret_key = shared_state.get_sui_private_key_required();
    let mut client = shared_state.get_sui_client();

    let signature = secret_key
        .sign_transaction(&tx)
        .context("Failed to sign transaction")?;

    let mut execution = client.execution_client();
    let request = proto::ExecuteTransactionRequest {
        transaction: Some(tx.into()),
        signatures: vec![signature.into()],
        read_mask: Some(FieldMask::from_paths([
            "transaction.digest",
            "transaction.effects.status",
        ])),
    };

    let response = execution
        .execute_transaction(request)
        .await
        .map_err(|e| {
            MarketplaceError::RpcConnectionError(format!("Failed to execute transaction: {}", e))
        })?
        .into_inner();

    check_transaction_effects(&response)?;

    let tx_digest = response
        .transaction
        .and_then(|t| t.digest)
        .context("Failed to get transaction digest")?;

    wait_for_transaction(&tx_digest, 5_000).await?;
    drop(gas_guard);

    debug!("Transaction executed: {}", tx_digest);
    Ok(tx_digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_abort_extraction() {
        let raw = r#"ExecutionError { description: "x", abort_code: Some(3), function_name: Some("mint_and_lock") }"#;
        let cleaned = clean_execution_error(&format!("MoveAbort {}", raw));
        assert!(cleaned.contains("abort_code: 3"));
        assert!(cleaned.contains("function: mint_and_lock"));
    }

    #[test]
    fn non_abort_errors_pass_through() {
        assert_eq!(
            clean_execution_error("InsufficientGas"),
            "InsufficientGas"
        );
    }
}
