//! Peer-to-peer networking
//!
//! Nodes exchange one JSON request and one JSON response per TCP connection.
//! Blocks announced by peers go through the sync state machine; ledger events
//! are relayed to every known peer on background threads.

pub mod node;
pub mod peer;
pub mod server;
pub mod sync;

pub use node::{Node, Nodes};
pub use peer::{broadcast, send_request, Request, Response, PEER_RETRIES};
pub use server::{spawn_broadcaster, Server};
pub use sync::{PeerSync, SyncOutcome, SyncState};
