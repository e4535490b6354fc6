use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use ethers::types::Address;
use red_vs_blue::{
    deployment::DEPLOYMENTS_ROOT,
    gateway::credits_to_base_units,
    round::{
        DEFAULT_BLOCK_DIV,
        RoundIndex,
    },
    session::DEFAULT_TX_AMOUNT,
};
use std::{
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:7545";
pub const DEFAULT_POLL_MS: u64 = 1000;

#[derive(Parser, Debug)]
#[command(
    name = "red-vs-blue",
    about = "Terminal client for the Red vs Blue round game",
    version
)]
pub struct Args {
    /// JSON-RPC endpoint of the ledger node
    #[arg(long, default_value = DEFAULT_RPC_URL)]
    pub rpc_url: String,

    /// RedVsBlue contract address (defaults to the last one recorded for the chain)
    #[arg(long)]
    pub contract: Option<String>,

    /// Blocks per round; must match the deployed contract
    #[arg(long, default_value_t = DEFAULT_BLOCK_DIV)]
    pub block_div: u64,

    /// Ethereum JSON keystore to sign with (defaults to the node's accounts)
    #[arg(long)]
    pub keystore: Option<String>,

    /// Block number poll interval in milliseconds
    #[arg(long, default_value_t = DEFAULT_POLL_MS)]
    pub poll_ms: u64,

    /// Initial transaction amount, in credits
    #[arg(long, default_value = DEFAULT_TX_AMOUNT)]
    pub tx_amount: String,

    /// Where contract addresses are recorded per chain
    #[arg(long, default_value = DEPLOYMENTS_ROOT)]
    pub deployments_dir: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub rpc_url: String,
    pub contract: Option<Address>,
    pub index: RoundIndex,
    pub keystore: Option<PathBuf>,
    pub poll_interval: Duration,
    pub tx_amount: String,
    pub deployments_dir: PathBuf,
}

impl AppConfig {
    pub fn from_args(args: Args) -> Result<Self> {
        let index = RoundIndex::new(args.block_div).wrap_err("invalid --block-div")?;
        if args.poll_ms == 0 {
            return Err(eyre!("--poll-ms must be positive"));
        }
        let contract = args
            .contract
            .as_deref()
            .map(|raw| {
                Address::from_str(raw.trim())
                    .map_err(|e| eyre!("Failed to parse contract address '{raw}': {e}"))
            })
            .transpose()?;
        credits_to_base_units(&args.tx_amount).wrap_err("invalid --tx-amount")?;
        Ok(Self {
            rpc_url: args.rpc_url,
            contract,
            index,
            keystore: args.keystore.as_deref().map(crate::wallets::resolve_keystore_path),
            poll_interval: Duration::from_millis(args.poll_ms),
            tx_amount: args.tx_amount,
            deployments_dir: PathBuf::from(
                shellexpand::tilde(&args.deployments_dir).into_owned(),
            ),
        })
    }
}
