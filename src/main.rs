//! `dcore-cli`: operator tool for the DCore client engine.

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use dcore_client::blockchain::WalletExport;
use dcore_client::config::{load_config, ClientConfig};
use dcore_client::crypto::{account_name_from_email, ElGamalKeyPair};
use dcore_client::observability::logging::init_logging;
use dcore_client::observability::metrics::describe_metrics;
use dcore_client::DcoreContext;

#[derive(Parser)]
#[command(name = "dcore-cli")]
#[command(about = "Client tool for DCore networks", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "DCORE_CONFIG")]
    config: Option<PathBuf>,

    /// Node endpoint; repeat for a redundant set. Overrides the config file.
    #[arg(short, long)]
    endpoint: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and report the winning endpoint, chain id and head block
    Status,
    /// Print the ElGamal key pair derived from a private key
    Elgamal {
        #[arg(long, env = "DCORE_WIF", hide_env_values = true)]
        wif: String,
    },
    /// Print the account name derived from an email address
    AccountName {
        #[arg(long)]
        email: String,
    },
    /// Decrypt a wallet export and list its public keys
    UnlockWallet {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, env = "DCORE_WALLET_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if !cli.endpoint.is_empty() {
        config.network.endpoints = cli.endpoint.clone();
    }
    init_logging(&config.observability);
    describe_metrics();

    match cli.command {
        Commands::Status => status(config).await?,
        Commands::Elgamal { wif } => {
            let pair = ElGamalKeyPair::from_wif(&wif)?;
            println!("private: {}", pair.private_decimal());
            println!("public:  {}", pair.public_decimal());
        }
        Commands::AccountName { email } => {
            println!("{}", account_name_from_email(&email));
        }
        Commands::UnlockWallet { file, password } => {
            let export = WalletExport::load(&file)?;
            let keys = export.unlock(&password)?;
            println!("chain id: {}", export.chain_id);
            for (public, _) in &keys.ec_keys {
                println!("ec key:      {}", public);
            }
            for (public, _) in &keys.el_gamal_keys {
                println!("elgamal key: {}", public);
            }
        }
    }

    Ok(())
}

async fn status(config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let context = DcoreContext::websocket(config)?;
    let client = context.connections().connect().await?;

    let chain_id: String = client.database("get_chain_id", Vec::new()).await?;
    let props: Value = client
        .database("get_dynamic_global_properties", Vec::new())
        .await?;

    println!("endpoint:   {}", client.endpoint());
    println!("state:      {}", context.connections().state());
    println!("chain id:   {}", chain_id);
    println!(
        "head block: {}",
        props.get("head_block_number").cloned().unwrap_or(Value::Null)
    );

    context.shutdown().await;
    Ok(())
}
