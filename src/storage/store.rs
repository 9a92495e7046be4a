// Whole-collection persistence: every committed mutation rewrites the named collection.
// The last write wins; there is no partial update.

use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize_all, serialize_all};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

const COLLECTIONS_TREE: &str = "collections";

pub const BLOCKS_COLLECTION: &str = "blocks";
pub const TRANSACTIONS_COLLECTION: &str = "transactions";
pub const WALLETS_COLLECTION: &str = "wallets";

pub trait Store: Send + Sync {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>>;
    fn save(&self, name: &str, bytes: &[u8]) -> Result<()>;
}

/// Loads a collection as an ordered sequence, empty when it was never written
pub fn load_all<T: DeserializeOwned>(store: &dyn Store, name: &str) -> Result<Vec<T>> {
    match store.load(name)? {
        Some(bytes) => deserialize_all(&bytes),
        None => Ok(Vec::new()),
    }
}

/// Overwrites a collection with `items`
pub fn write_all<T: Serialize>(store: &dyn Store, name: &str, items: &[T]) -> Result<()> {
    let bytes = serialize_all(items)?;
    store.save(name, &bytes)
}

// One sled key per collection, inside a dedicated tree
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    tree: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<SledStore> {
        let db = sled::open(path.as_ref())
            .map_err(|e| BlockchainError::Database(format!("Failed to open database: {e}")))?;
        let tree = db.open_tree(COLLECTIONS_TREE).map_err(|e| {
            BlockchainError::Database(format!("Failed to open collections tree: {e}"))
        })?;
        Ok(SledStore { db, tree })
    }

    pub fn get_db(&self) -> &Db {
        &self.db
    }
}

impl Store for SledStore {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let value = self.tree.get(name).map_err(|e| {
            BlockchainError::Database(format!("Failed to read collection '{name}': {e}"))
        })?;
        Ok(value.map(|bytes| bytes.to_vec()))
    }

    fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.tree.insert(name, bytes).map_err(|e| {
            BlockchainError::Database(format!("Failed to write collection '{name}': {e}"))
        })?;
        self.tree.flush().map_err(|e| {
            BlockchainError::Database(format!("Failed to flush collection '{name}': {e}"))
        })?;
        Ok(())
    }
}

/// In-process store; clones share the same collections
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl Store for MemoryStore {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let collections = self
            .inner
            .read()
            .map_err(|_| BlockchainError::Database("Memory store lock poisoned".to_string()))?;
        Ok(collections.get(name).cloned())
    }

    fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut collections = self
            .inner
            .write()
            .map_err(|_| BlockchainError::Database("Memory store lock poisoned".to_string()))?;
        collections.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}
