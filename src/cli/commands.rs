use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ledger-node")]
pub struct Opt {
    #[arg(long, global = true, help = "TOML file with node settings")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "startnode", about = "Start a ledger node")]
    StartNode {
        #[arg(long, help = "Address to listen on, overrides NODE_ADDRESS")]
        address: Option<String>,
        #[arg(long, value_delimiter = ',', help = "Peers to connect to, overrides PEERS")]
        peers: Vec<String>,
        #[arg(long = "mining-address", help = "Mine pending transactions, paying rewards to ADDRESS")]
        mining_address: Option<String>,
    },
    #[command(name = "createwallet", about = "Create a new key-chain wallet")]
    Createwallet {
        #[arg(help = "Password the wallet keys are derived from")]
        password: String,
    },
    #[command(name = "newaddress", about = "Derive the next address of a wallet")]
    NewAddress {
        #[arg(help = "Wallet id")]
        wallet: String,
        #[arg(help = "Wallet password")]
        password: String,
    },
    #[command(name = "getbalance", about = "Get the balance of the target address")]
    GetBalance {
        #[arg(help = "The address")]
        address: String,
    },
    #[command(name = "send", about = "Queue a transaction from one of the wallet's addresses")]
    Send {
        #[arg(help = "Wallet id")]
        wallet: String,
        #[arg(help = "Wallet password")]
        password: String,
        #[arg(help = "Source address")]
        from: String,
        #[arg(help = "Destination address")]
        to: String,
        #[arg(help = "Amount to send")]
        amount: i64,
        #[arg(long, help = "Change address, defaults to the source address")]
        change: Option<String>,
        #[arg(long, help = "Also post the transaction to the node at ADDR")]
        node: Option<String>,
    },
    #[command(name = "mine", about = "Mine a block from the pending transactions")]
    Mine {
        #[arg(help = "Address receiving the reward, defaults to MINING_ADDRESS")]
        address: Option<String>,
    },
    #[command(name = "printchain", about = "Print all blocks of the chain")]
    Printchain,
}
