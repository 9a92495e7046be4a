use crate::core::{Block, CandidateTemplate, LedgerEvent, SharedLedger, TRANSACTIONS_PER_BLOCK};
use crate::error::{BlockchainError, Result};
use crate::network::peer::{self, Request, Response};
use crate::network::{Nodes, PeerSync, SyncOutcome, SyncState};
use log::{error, info, warn};
use serde_json::Deserializer;
use std::collections::HashMap;
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const TCP_READ_TIMEOUT: u64 = 60;
const TCP_WRITE_TIMEOUT: u64 = 5000;

/// Peer-facing server of one node
#[derive(Clone)]
pub struct Server {
    ledger: SharedLedger,
    /// Sync progress per announcing peer
    sync: Arc<Mutex<HashMap<String, PeerSync>>>,
    nodes: Arc<Nodes>,
    /// Mines once enough transactions are pending
    mining_addr: Option<String>,
}

impl Server {
    pub fn new(ledger: SharedLedger) -> Server {
        Server {
            ledger,
            sync: Arc::new(Mutex::new(HashMap::new())),
            nodes: Arc::new(Nodes::new()),
            mining_addr: None,
        }
    }

    pub fn with_mining_addr(mut self, mining_addr: Option<String>) -> Server {
        self.mining_addr = mining_addr;
        self
    }

    pub fn get_nodes(&self) -> Arc<Nodes> {
        Arc::clone(&self.nodes)
    }

    pub fn get_ledger(&self) -> SharedLedger {
        Arc::clone(&self.ledger)
    }

    /// Where synchronization with `peer` stands; `Idle` for a peer never heard from
    pub fn sync_state(&self, peer: &str) -> SyncState {
        let sync = self.sync.lock().unwrap_or_else(PoisonError::into_inner);
        sync.get(peer).map_or(SyncState::Idle, PeerSync::state)
    }

    pub fn bind(addr: &str) -> Result<TcpListener> {
        TcpListener::bind(addr)
            .map_err(|e| BlockchainError::Network(format!("Failed to bind to {addr}: {e}")))
    }

    /// Binds `addr`, announces ourselves to `peers` and serves forever
    pub fn run(&self, addr: &str, peers: &[String]) -> Result<()> {
        let listener = Self::bind(addr)?;
        info!("Server listening on {addr}");
        self.connect_to_network(addr, peers);
        self.serve(listener);
        Ok(())
    }

    pub fn serve(&self, listener: TcpListener) {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let peer_addr = match stream.peer_addr() {
                        Ok(addr) => addr,
                        Err(e) => {
                            error!("Failed to get peer address: {e}");
                            continue;
                        }
                    };
                    let server = self.clone();
                    thread::spawn(move || {
                        if let Err(e) = server.handle_connection(stream, peer_addr) {
                            error!("Error handling connection from {peer_addr}: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {e}");
                }
            }
        }
    }

    /// Registers every peer, asks it to register us back and catches up
    /// with its chain. Unreachable peers are logged and forgotten.
    pub fn connect_to_network(&self, self_addr: &str, peers: &[String]) {
        for peer_addr in peers {
            if peer_addr == self_addr {
                continue;
            }
            self.nodes.add_node(peer_addr.clone());
            if let Err(e) = peer::add_peer(peer_addr, self_addr) {
                warn!("Failed to announce ourselves to {peer_addr}, evicting it: {e}");
                self.nodes.evict_node(peer_addr);
                continue;
            }
            let synced = peer::get_latest_block(peer_addr)
                .and_then(|block| self.handle_foreign_blocks(peer_addr, vec![block]));
            match synced {
                Ok(outcome) => info!("Synchronized with {peer_addr}: {outcome:?}"),
                Err(e) => warn!("Failed to synchronize with {peer_addr}: {e}"),
            }
        }
    }

    fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) -> Result<()> {
        stream
            .set_read_timeout(Some(Duration::from_secs(TCP_READ_TIMEOUT)))
            .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))?;
        stream
            .set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))
            .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;

        let reader = BufReader::new(&stream);
        let mut requests = Deserializer::from_reader(reader).into_iter::<Request>();
        let response = match requests.next() {
            Some(Ok(request)) => {
                info!("Received request from {peer_addr}: {}", describe(&request));
                self.process_request(request).unwrap_or_else(|e| {
                    warn!("Request from {peer_addr} failed: {e}");
                    Response::Error {
                        message: e.to_string(),
                    }
                })
            }
            Some(Err(e)) => Response::Error {
                message: format!("Failed to deserialize request: {e}"),
            },
            None => return Ok(()),
        };

        let mut writer = &stream;
        serde_json::to_writer(writer, &response)
            .map_err(|e| BlockchainError::Network(format!("Failed to send response: {e}")))?;
        writer.flush()?;
        let _ = stream.shutdown(Shutdown::Both);
        Ok(())
    }

    pub fn process_request(&self, request: Request) -> Result<Response> {
        match request {
            Request::Ping => Ok(Response::Pong),
            Request::GetLatestBlock => {
                let ledger = self.ledger.read().unwrap_or_else(PoisonError::into_inner);
                Ok(Response::Block(ledger.last_block().clone()))
            }
            Request::GetBlocks => {
                let ledger = self.ledger.read().unwrap_or_else(PoisonError::into_inner);
                Ok(Response::Blocks(ledger.blocks().to_vec()))
            }
            Request::PostLatestBlock { addr_from, block } => {
                self.nodes.add_node(addr_from.clone());
                let outcome = self.handle_foreign_blocks(&addr_from, vec![block])?;
                Ok(Response::Sync(outcome))
            }
            Request::PostTransaction { transaction } => {
                let transaction = {
                    let mut ledger = self.ledger.write().unwrap_or_else(PoisonError::into_inner);
                    ledger.add_transaction(transaction, true)?
                };
                self.mine_if_ready();
                Ok(Response::Transaction(transaction))
            }
            Request::GetConfirmations { transaction_id } => {
                let ledger = self.ledger.read().unwrap_or_else(PoisonError::into_inner);
                Ok(Response::Confirmations(ledger.confirmations(&transaction_id)?))
            }
            Request::AddPeer { addr } => {
                if self.nodes.add_node(addr.clone()) {
                    info!("Added peer {addr}");
                }
                Ok(Response::Ok)
            }
        }
    }

    /// Feeds foreign blocks to the sync state machine. When it asks for the
    /// full chain I fetch it from `addr_from` with no lock held and retry.
    pub fn handle_foreign_blocks(&self, addr_from: &str, blocks: Vec<Block>) -> Result<SyncOutcome> {
        let outcome = self.apply_foreign_blocks(addr_from, blocks)?;
        if outcome != SyncOutcome::RequestFullChain {
            return Ok(outcome);
        }
        info!("Requesting the full chain from {addr_from}");
        let chain = peer::get_blocks(addr_from)?;
        self.apply_foreign_blocks(addr_from, chain)
    }

    fn apply_foreign_blocks(&self, addr_from: &str, blocks: Vec<Block>) -> Result<SyncOutcome> {
        let mut sync = self.sync.lock().unwrap_or_else(PoisonError::into_inner);
        let peer_sync = sync.entry(addr_from.to_string()).or_default();
        let mut ledger = self.ledger.write().unwrap_or_else(PoisonError::into_inner);
        peer_sync.on_foreign_blocks(&mut ledger, blocks)
    }

    fn mine_if_ready(&self) {
        let Some(mining_addr) = &self.mining_addr else {
            return;
        };
        let template = {
            let mut ledger = self.ledger.write().unwrap_or_else(PoisonError::into_inner);
            if ledger.pending_transactions().len() < TRANSACTIONS_PER_BLOCK {
                return;
            }
            ledger.candidate_template(mining_addr)
        };
        // No lock is held during the nonce search
        let mined = template.and_then(CandidateTemplate::mine).and_then(|block| {
            let mut ledger = self.ledger.write().unwrap_or_else(PoisonError::into_inner);
            ledger.add_block(block, true)
        });
        match mined {
            Ok(block) => info!("Mined block {} ({})", block.get_index(), block.get_hash()),
            Err(e) => warn!("Mining failed: {e}"),
        }
    }
}

fn describe(request: &Request) -> String {
    match request {
        Request::PostLatestBlock { addr_from, block } => {
            format!("PostLatestBlock {} from {addr_from}", block.get_index())
        }
        Request::PostTransaction { transaction } => {
            format!("PostTransaction {}", transaction.get_id())
        }
        other => format!("{other:?}"),
    }
}

/// Relays ledger events to every known peer until the ledger's sender is dropped
pub fn spawn_broadcaster(
    events: Receiver<LedgerEvent>,
    nodes: Arc<Nodes>,
    self_addr: String,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for event in events {
            let request = match event {
                LedgerEvent::BlockAdded(block) => Request::PostLatestBlock {
                    addr_from: self_addr.clone(),
                    block,
                },
                LedgerEvent::ChainExtended(mut appended) => match appended.pop() {
                    Some(block) => Request::PostLatestBlock {
                        addr_from: self_addr.clone(),
                        block,
                    },
                    None => continue,
                },
                LedgerEvent::TransactionAdded(transaction) => {
                    Request::PostTransaction { transaction }
                }
            };
            peer::broadcast(&nodes, request);
        }
    })
}
