use crate::core::{Block, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::{Nodes, SyncOutcome};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const TCP_CONNECT_TIMEOUT: u64 = 5000;
const TCP_IO_TIMEOUT: u64 = 30000;

/// Attempts per peer exchange before the peer is given up on
pub const PEER_RETRIES: usize = 2;

/// One request per connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    Ping,
    GetLatestBlock,
    PostLatestBlock { addr_from: String, block: Block },
    GetBlocks,
    PostTransaction { transaction: Transaction },
    GetConfirmations { transaction_id: String },
    AddPeer { addr: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Pong,
    Block(Block),
    Blocks(Vec<Block>),
    Transaction(Transaction),
    Sync(SyncOutcome),
    Confirmations(u64),
    Ok,
    Error { message: String },
}

fn parse_addr(addr: &str) -> Result<SocketAddr> {
    addr.parse::<SocketAddr>()
        .map_err(|e| BlockchainError::Network(format!("Invalid address {addr}: {e}")))
}

fn exchange(addr: SocketAddr, request: &Request) -> Result<Response> {
    let mut stream = TcpStream::connect_timeout(&addr, Duration::from_millis(TCP_CONNECT_TIMEOUT))
        .map_err(|e| BlockchainError::Network(format!("Failed to connect to {addr}: {e}")))?;
    stream
        .set_write_timeout(Some(Duration::from_millis(TCP_IO_TIMEOUT)))
        .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;
    stream
        .set_read_timeout(Some(Duration::from_millis(TCP_IO_TIMEOUT)))
        .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))?;

    serde_json::to_writer(&stream, request)
        .map_err(|e| BlockchainError::Network(format!("Failed to send request: {e}")))?;
    stream
        .flush()
        .map_err(|e| BlockchainError::Network(format!("Failed to send request: {e}")))?;
    let _ = stream.shutdown(Shutdown::Write);

    serde_json::from_reader(BufReader::new(&stream))
        .map_err(|e| BlockchainError::Network(format!("Failed to read response from {addr}: {e}")))
}

// Retries transport failures only; a peer's `Response::Error` is returned as is
fn deliver(addr: &str, request: &Request) -> Result<Response> {
    let socket_addr = parse_addr(addr)?;
    let mut last_error = BlockchainError::Network(format!("No attempt made to reach {addr}"));
    for attempt in 1..=PEER_RETRIES {
        match exchange(socket_addr, request) {
            Ok(response) => return Ok(response),
            Err(e) => {
                debug!("Attempt {attempt} to reach {addr} failed: {e}");
                last_error = e;
            }
        }
    }
    Err(last_error)
}

/// Sends `request` to `addr`, retrying up to `PEER_RETRIES` times
pub fn send_request(addr: &str, request: &Request) -> Result<Response> {
    match deliver(addr, request)? {
        Response::Error { message } => {
            Err(BlockchainError::Network(format!("Peer {addr} refused: {message}")))
        }
        response => Ok(response),
    }
}

fn unexpected(addr: &str, response: Response) -> BlockchainError {
    BlockchainError::Network(format!("Unexpected response from {addr}: {response:?}"))
}

pub fn ping(addr: &str) -> Result<()> {
    match send_request(addr, &Request::Ping)? {
        Response::Pong => Ok(()),
        other => Err(unexpected(addr, other)),
    }
}

pub fn get_latest_block(addr: &str) -> Result<Block> {
    match send_request(addr, &Request::GetLatestBlock)? {
        Response::Block(block) => Ok(block),
        other => Err(unexpected(addr, other)),
    }
}

pub fn get_blocks(addr: &str) -> Result<Vec<Block>> {
    match send_request(addr, &Request::GetBlocks)? {
        Response::Blocks(blocks) => Ok(blocks),
        other => Err(unexpected(addr, other)),
    }
}

/// Announces our tip to `addr`
pub fn post_latest_block(addr: &str, addr_from: &str, block: &Block) -> Result<SyncOutcome> {
    let request = Request::PostLatestBlock {
        addr_from: addr_from.to_string(),
        block: block.clone(),
    };
    match send_request(addr, &request)? {
        Response::Sync(outcome) => Ok(outcome),
        other => Err(unexpected(addr, other)),
    }
}

pub fn post_transaction(addr: &str, transaction: &Transaction) -> Result<Transaction> {
    let request = Request::PostTransaction {
        transaction: transaction.clone(),
    };
    match send_request(addr, &request)? {
        Response::Transaction(tx) => Ok(tx),
        other => Err(unexpected(addr, other)),
    }
}

pub fn get_confirmations(addr: &str, transaction_id: &str) -> Result<u64> {
    let request = Request::GetConfirmations {
        transaction_id: transaction_id.to_string(),
    };
    match send_request(addr, &request)? {
        Response::Confirmations(count) => Ok(count),
        other => Err(unexpected(addr, other)),
    }
}

/// Asks `addr` to add `peer` to its peer list
pub fn add_peer(addr: &str, peer: &str) -> Result<()> {
    let request = Request::AddPeer {
        addr: peer.to_string(),
    };
    match send_request(addr, &request)? {
        Response::Ok => Ok(()),
        other => Err(unexpected(addr, other)),
    }
}

/// Fires `request` at every known peer on its own thread.
/// A peer that stays unreachable after `PEER_RETRIES` attempts is evicted;
/// one that answers with an error is kept.
pub fn broadcast(nodes: &Arc<Nodes>, request: Request) -> Vec<JoinHandle<()>> {
    nodes
        .addresses()
        .into_iter()
        .map(|peer| {
            let request = request.clone();
            let nodes = Arc::clone(nodes);
            thread::spawn(move || match deliver(&peer, &request) {
                Ok(Response::Error { message }) => warn!("Peer {peer} refused: {message}"),
                Ok(_) => {}
                Err(e) => {
                    warn!("Peer {peer} unreachable, evicting it: {e}");
                    nodes.evict_node(&peer);
                }
            })
        })
        .collect()
}
