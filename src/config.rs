use crate::address::{EthAddress, parse_address_list};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ADDRESSES: &str =
    "0x560a8e3b79d23b0a525e15c6f3486c6a293ddad2,0x905315602ed9a854e325f692ff82f58799beab57";

/// Starts a never ending stream that receives filtered Ethereum blocks,
/// analyzes their transactions and notifies when a transaction is doing a
/// pure Ether transfer (from/to) or an ERC20 transfer (from/to) involving
/// one of the tracked addresses.
#[derive(Debug, Parser)]
#[command(name = "tracker")]
pub struct Cli {
    /// List of addresses to track, comma separated
    #[arg(short = 'a', long, default_value = DEFAULT_ADDRESSES)]
    pub addresses: String,

    /// File containing the last cursor ever seen; when present, the cursor
    /// in it is used to reconnect to the last seen block
    #[arg(short = 'c', long, default_value = "cursor.txt")]
    pub cursor_file: PathBuf,

    /// Endpoint to connect the stream of blocks to
    #[arg(short = 'e', long, default_value = "wss://api.streamingfast.io:443")]
    pub endpoint: String,

    /// Endpoint issuing short-lived API tokens
    #[arg(long, default_value = "https://auth.streamingfast.io/v1/auth/issue")]
    pub auth_endpoint: String,

    /// How often current stream state is logged, in seconds
    #[arg(short = 'f', long, default_value_t = 30)]
    pub status_frequency_secs: u64,

    /// Block number to start from when no previous cursor exists
    #[arg(short = 's', long, default_value_t = 11_878_000)]
    pub start_block: u64,

    /// Skip SSL certificate verification
    #[arg(short = 'i', long)]
    pub skip_ssl_verify: bool,
}

#[derive(Debug)]
pub struct Config {
    pub addresses: Vec<EthAddress>,
    pub cursor_file: PathBuf,
    pub endpoint: String,
    pub auth_endpoint: String,
    pub status_interval: Duration,
    pub start_block: u64,
    pub skip_tls_verify: bool,
    pub api_key: String,
}

impl Config {
    pub fn resolve(cli: &Cli) -> Result<Self> {
        dotenv::dotenv().ok();

        let api_key = std::env::var("STREAMINGFAST_API_KEY").context(
            "the environment variable STREAMINGFAST_API_KEY must be set to a valid API key value",
        )?;

        let addresses = parse_address_list(&cli.addresses)
            .with_context(|| format!("invalid addresses flag {:?}", cli.addresses))?;

        Ok(Config {
            addresses,
            cursor_file: cli.cursor_file.clone(),
            endpoint: cli.endpoint.clone(),
            auth_endpoint: cli.auth_endpoint.clone(),
            status_interval: Duration::from_secs(cli.status_frequency_secs),
            start_block: cli.start_block,
            skip_tls_verify: cli.skip_ssl_verify,
            api_key,
        })
    }
}
