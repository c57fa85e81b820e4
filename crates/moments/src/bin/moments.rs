use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use moments::media::{MediaFile, content_type_for_path};
use moments::{MomentForm, RegistrationFlow, queries};
use std::path::PathBuf;
use sui::interface::MarketplaceInterface;
use sui::{MarketplaceError, SharedSuiState, mist_to_sui, sui_to_mist, suiscan_url};
use walrus::WalrusClient;

#[derive(Parser)]
#[command(name = "moments")]
#[command(about = "Fight Moments marketplace client", long_about = None)]
struct Cli {
    /// Override the blockchain network (devnet, testnet, or mainnet)
    #[arg(long, global = true, env = "SUI_CHAIN")]
    chain: Option<String>,

    #[arg(long, global = true, env = "SUI_RPC_URL")]
    rpc_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the moments open for minting
    Moments,

    /// Show one moment
    Moment {
        /// The moment object ID
        id: String,
    },

    /// List the marketplace listings
    Listings,

    /// List the NFTs an address minted (defaults to the configured signer)
    Nfts {
        #[arg(long)]
        address: Option<String>,
    },

    /// List the kiosks an address owns (defaults to the configured signer)
    Kiosks {
        #[arg(long)]
        address: Option<String>,
    },

    /// Read moment metadata from the on-chain registry (no-fee simulation)
    Registry,

    /// Register a new moment: validate, upload media, submit (admin)
    Register {
        #[arg(long)]
        match_id: String,
        #[arg(long)]
        fighter_a: String,
        #[arg(long)]
        fighter_b: String,
        /// KO, SUBMISSION, DECISION, TKO, DRAW, or HIGHLIGHT
        #[arg(long, default_value = "KO")]
        moment_type: String,
        #[arg(long, default_value = "1000")]
        max_supply: u64,
        /// Path to the moment video (mp4/webm/ogg, max 30s)
        #[arg(long)]
        video: PathBuf,
        /// Path to the thumbnail image (jpeg/png/webp)
        #[arg(long)]
        thumbnail: PathBuf,
    },

    /// Mint an NFT against a moment
    Mint {
        /// The moment object ID
        moment_id: String,
    },

    /// List an owned NFT for sale
    List {
        /// The NFT object ID
        nft_id: String,
        /// Price in SUI
        price: f64,
    },

    /// Take an NFT off the market
    Delist {
        /// The NFT object ID
        nft_id: String,
    },

    /// Buy a listed NFT
    Buy {
        /// The NFT object ID of the listing
        nft_id: String,
    },

    /// Upload a file to Walrus and print its blob id
    Upload {
        file: PathBuf,
    },

    /// Print the aggregator view URL for a blob
    ViewUrl {
        blob_id: String,
    },
}

fn load_media(path: &PathBuf) -> Result<MediaFile> {
    let content_type = content_type_for_path(path)
        .ok_or_else(|| anyhow!("unrecognized media extension: {}", path.display()))?;
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(MediaFile::new(bytes, content_type))
}

async fn signer_address() -> Result<String> {
    Ok(SharedSuiState::get_instance()
        .get_sui_address()
        .ok_or_else(|| anyhow!("no signing identity configured (set SUI_SECRET_KEY)"))?
        .to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let rpc_url = sui::resolve_rpc_url(cli.rpc_url.clone(), cli.chain.clone())?;

    // Browsing commands work without a signing identity.
    let read_only = matches!(
        cli.command,
        Commands::Moments
            | Commands::Moment { .. }
            | Commands::Listings
            | Commands::Registry
            | Commands::Upload { .. }
            | Commands::ViewUrl { .. }
    ) || matches!(
        &cli.command,
        Commands::Nfts { address: Some(_) } | Commands::Kiosks { address: Some(_) }
    );

    match (read_only, &cli.command) {
        (_, Commands::ViewUrl { .. } | Commands::Upload { .. }) => {
            // Walrus-only commands need no ledger state at all
        }
        (true, _) => SharedSuiState::initialize_read_only(&rpc_url).await?,
        (false, _) => SharedSuiState::initialize(&rpc_url).await?,
    }

    let chain_name = cli.chain.clone().unwrap_or_else(|| "testnet".to_string());

    match cli.command {
        Commands::Moments => {
            let moments = queries::mintable_moments().await?;
            for moment in moments {
                let status = if moment.is_sold_out() {
                    "SOLD OUT".to_string()
                } else {
                    format!("{}/{}", moment.minted_count, moment.max_supply)
                };
                println!(
                    "{}  {}  {} vs {}  [{}]  {}",
                    moment.id, moment.match_id, moment.fighter_a, moment.fighter_b,
                    moment.moment_type, status
                );
            }
        }

        Commands::Moment { id } => match queries::mintable_moment(&id).await? {
            Some(moment) => println!("{}", serde_json::to_string_pretty(&moment)?),
            None => println!("moment {} not found", id),
        },

        Commands::Listings => {
            let listings = queries::marketplace_listings().await?;
            for listing in listings {
                println!(
                    "{}  #{}  {} vs {}  {} SUI  (kiosk {})",
                    listing.nft_id,
                    listing.nft.serial_number,
                    listing.nft.fighter_a,
                    listing.nft.fighter_b,
                    mist_to_sui(listing.price),
                    listing.kiosk_id
                );
            }
        }

        Commands::Nfts { address } => {
            let address = match address {
                Some(addr) => addr,
                None => signer_address().await?,
            };
            for nft in queries::user_nfts(&address).await? {
                println!(
                    "{}  #{}  {} vs {}  [{}]",
                    nft.id, nft.serial_number, nft.fighter_a, nft.fighter_b, nft.moment_type
                );
            }
        }

        Commands::Kiosks { address } => {
            let address = match address {
                Some(addr) => addr,
                None => signer_address().await?,
            };
            for kiosk in queries::user_kiosks(&address).await? {
                println!("kiosk {}  cap {}", kiosk.kiosk_id, kiosk.cap_id);
            }
        }

        Commands::Registry => {
            let metadata = sui::fetch_moments_from_registry().await?;
            if metadata.is_empty() {
                println!("registry returned no metadata");
            }
            for record in metadata {
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
        }

        Commands::Register {
            match_id,
            fighter_a,
            fighter_b,
            moment_type,
            max_supply,
            video,
            thumbnail,
        } => {
            let video = load_media(&video)?;
            let thumbnail = load_media(&thumbnail)?;
            let form = MomentForm {
                match_id,
                fighter_a,
                fighter_b,
                moment_type,
                max_supply,
            };

            let client = WalrusClient::new();
            let interface = MarketplaceInterface::new();
            let mut flow = RegistrationFlow::new();

            flow.upload_media(&client, &video, &thumbnail).await?;
            println!("media uploaded ({:.0}%)", flow.progress());

            let digest = flow.submit(&interface, &form).await?;
            queries::invalidate_after_registration();
            println!("registered: {}", suiscan_url(&chain_name, &digest));
        }

        Commands::Mint { moment_id } => {
            let interface = MarketplaceInterface::new();
            let digest = interface.mint(&moment_id).await?;
            queries::invalidate_after_mint(&moment_id, &signer_address().await?);
            println!("minted: {}", suiscan_url(&chain_name, &digest));
        }

        Commands::List { nft_id, price } => {
            let address = signer_address().await?;
            let kiosk = queries::user_kiosks(&address)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("no kiosk owned by {}; mint first", address))?;

            let interface = MarketplaceInterface::new();
            let digest = interface
                .list_nft(&kiosk, &nft_id, sui_to_mist(price))
                .await?;
            queries::invalidate_after_trade(&address);
            println!("listed: {}", suiscan_url(&chain_name, &digest));
        }

        Commands::Delist { nft_id } => {
            let address = signer_address().await?;
            let kiosk = queries::user_kiosks(&address)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("no kiosk owned by {}", address))?;

            let interface = MarketplaceInterface::new();
            let digest = interface.delist_nft(&kiosk, &nft_id).await?;
            queries::invalidate_after_trade(&address);
            println!("delisted: {}", suiscan_url(&chain_name, &digest));
        }

        Commands::Buy { nft_id } => {
            let listing = queries::marketplace_listings()
                .await?
                .into_iter()
                .find(|listing| listing.nft_id == nft_id)
                .ok_or_else(|| MarketplaceError::ObjectNotFound(nft_id.clone()))?;

            let interface = MarketplaceInterface::new();
            let digest = interface.purchase(&listing).await?;
            queries::invalidate_after_trade(&signer_address().await?);
            println!(
                "purchased for {} SUI: {}",
                mist_to_sui(listing.price),
                suiscan_url(&chain_name, &digest)
            );
        }

        Commands::Upload { file } => {
            let bytes = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let client = WalrusClient::new();
            let result = client.upload(bytes).await?;
            println!("blob id: {}", result.blob_id);
            println!("uri:     {}", result.uri);
            println!("view:    {}", client.view_url(&result.uri));
        }

        Commands::ViewUrl { blob_id } => {
            println!("{}", WalrusClient::new().view_url(&blob_id));
        }
    }

    Ok(())
}
