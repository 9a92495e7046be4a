// Entry point of the ledger node binary
use clap::Parser;
use ledger_node::network::{peer, spawn_broadcaster};
use ledger_node::storage::balance;
use ledger_node::{Command, Ledger, Opt, Server, SledStore, Wallets, GLOBAL_CONFIG};
use log::{error, info, LevelFilter};
use std::process;
use std::sync::mpsc::channel;

fn main() {
    // Info by default; RUST_LOG still wins
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();
    if let Some(path) = &opt.config {
        if let Err(e) = GLOBAL_CONFIG.load_file(path) {
            error!("Error: {e}");
            process::exit(1);
        }
    }

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

// Every node keeps its chain, pool and wallets in one sled database
fn open_store() -> ledger_node::Result<SledStore> {
    let path = GLOBAL_CONFIG.node_data_path();
    info!("Using data directory {}", path.display());
    SledStore::open(path)
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::StartNode {
            address,
            peers,
            mining_address,
        } => {
            if let Some(address) = address {
                GLOBAL_CONFIG.set_node_addr(address);
            }
            if !peers.is_empty() {
                GLOBAL_CONFIG.set_peers(&peers);
            }
            if let Some(mining_address) = mining_address {
                GLOBAL_CONFIG.set_mining_addr(mining_address);
            }
            let addr = GLOBAL_CONFIG.get_node_addr();
            let mining_addr = GLOBAL_CONFIG.get_mining_addr();
            if let Some(mining_addr) = &mining_addr {
                println!("Mining is on. Address to receive rewards: {mining_addr}");
            }

            let mut ledger = Ledger::open(Box::new(open_store()?))?;
            let (sender, receiver) = channel();
            ledger.set_event_sender(sender);

            let server = Server::new(ledger.into_shared()).with_mining_addr(mining_addr);
            spawn_broadcaster(receiver, server.get_nodes(), addr.clone());
            server.run(&addr, &GLOBAL_CONFIG.get_peers())?
        }
        Command::Createwallet { password } => {
            let mut wallets = Wallets::open(Box::new(open_store()?))?;
            let id = wallets.create_wallet(&password)?;
            println!("Your new wallet: {id}")
        }
        Command::NewAddress { wallet, password } => {
            let mut wallets = Wallets::open(Box::new(open_store()?))?;
            wallets.authenticate(&wallet, &password)?;
            let address = wallets.generate_address(&wallet)?;
            println!("Your new address: {address}")
        }
        Command::GetBalance { address } => {
            let ledger = Ledger::open(Box::new(open_store()?))?;
            let balance = balance(ledger.blocks(), &address)?;
            println!("Balance of {address}: {balance}");
        }
        Command::Send {
            wallet,
            password,
            from,
            to,
            amount,
            change,
            node,
        } => {
            let store = open_store()?;
            let mut ledger = Ledger::open(Box::new(store.clone()))?;
            let wallets = Wallets::open(Box::new(store))?;
            wallets.authenticate(&wallet, &password)?;

            let transaction =
                wallets.create_transaction(&ledger, &wallet, &from, &to, amount, change.as_deref())?;
            let transaction = ledger.add_transaction(transaction, false)?;
            if let Some(node) = node {
                peer::post_transaction(&node, &transaction)?;
                println!("Posted to {node}");
            }
            println!("Transaction {} is pending", transaction.get_id())
        }
        Command::Mine { address } => {
            let address = address
                .or_else(|| GLOBAL_CONFIG.get_mining_addr())
                .ok_or("No reward address given and MINING_ADDRESS is not set")?;
            let mut ledger = Ledger::open(Box::new(open_store()?))?;
            let block = ledger.assemble_candidate(&address)?;
            let block = ledger.add_block(block, false)?;
            println!("Mined block {} ({})", block.get_index(), block.get_hash())
        }
        Command::Printchain => {
            let ledger = Ledger::open(Box::new(open_store()?))?;
            for block in ledger.blocks() {
                println!("Block #{}", block.get_index());
                println!("Prev. hash: {}", block.get_previous_hash());
                println!("Cur. hash: {}", block.get_hash());
                println!("Timestamp: {}", block.get_timestamp());
                println!("Nonce: {}", block.get_nonce());
                for tx in block.get_transactions() {
                    println!("- Transaction {} ({})", tx.get_id(), tx.get_type());
                    for input in tx.get_inputs() {
                        println!(
                            "-- Input tx = {}, index = {}, amount = {}, from = {}",
                            input.get_transaction(),
                            input.get_index(),
                            input.get_amount(),
                            input.get_address()
                        )
                    }
                    for output in tx.get_outputs() {
                        println!(
                            "-- Output amount = {}, to = {}",
                            output.get_amount(),
                            output.get_address()
                        )
                    }
                }
                println!()
            }
            let info = ledger.info();
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }
    Ok(())
}
