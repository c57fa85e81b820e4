#[cfg(test)]
mod tests {
    use anyhow::Result;
    use std::env;

    /// Initialize the test environment. Returns false (skip) when the
    /// marketplace environment is not configured.
    async fn init_test() -> Result<bool> {
        let _ = dotenvy::dotenv();

        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        if env::var("MOMENTS_PACKAGE_ID").is_err() || env::var("TRANSFER_POLICY_ID").is_err() {
            eprintln!(
                "skipping: MOMENTS_PACKAGE_ID / TRANSFER_POLICY_ID not set (create a .env to run network tests)"
            );
            return Ok(false);
        }

        let rpc_url = sui::chain::resolve_rpc_url(None, None)?;
        sui::SharedSuiState::initialize_read_only(&rpc_url).await?;

        tracing::info!("Test environment initialized against {}", rpc_url);
        Ok(true)
    }

    #[tokio::test]
    async fn test_fetch_mintable_moments() -> Result<()> {
        if !init_test().await? {
            return Ok(());
        }

        let moments = sui::fetch_mintable_moments().await?;
        tracing::info!("Fetched {} mintable moments", moments.len());
        for moment in &moments {
            // Supply invariant holds for everything the chain returns
            assert!(moment.minted_count <= moment.max_supply);
            assert!(!moment.id.is_empty());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_marketplace_listings() -> Result<()> {
        if !init_test().await? {
            return Ok(());
        }

        let listings = sui::fetch_marketplace_listings().await?;
        tracing::info!("Fetched {} listings", listings.len());
        for listing in &listings {
            assert!(!listing.nft_id.is_empty());
            assert!(!listing.kiosk_id.is_empty());
            // Seller is a documented gap in the event stream
            assert!(listing.seller.is_empty());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_registry_read_degrades_to_empty() -> Result<()> {
        if !init_test().await? {
            return Ok(());
        }

        // Whatever the registry state, this path never errors out.
        let metadata = sui::fetch_moments_from_registry().await?;
        tracing::info!("Registry returned {} metadata records", metadata.len());
        Ok(())
    }
}
