use crate::error::{BlockchainError, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

static DEFAULT_NODE_ADDR: &str = "127.0.0.1:3001";
static DEFAULT_NODE_NAME: &str = "unnamed";
static DEFAULT_DATA_DIR: &str = "data";

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const NODE_NAME_KEY: &str = "NODE_NAME";
const DATA_DIR_KEY: &str = "DATA_DIR";
const PEERS_KEY: &str = "PEERS";
const MINING_ADDRESS_KEY: &str = "MINING_ADDRESS";

/// Optional on-disk settings; the environment still wins over them
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    node_address: Option<String>,
    node_name: Option<String>,
    data_dir: Option<String>,
    peers: Option<Vec<String>>,
    mining_address: Option<String>,
}

pub struct Config {
    inner: RwLock<HashMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Defaults overridden by the environment
    pub fn new() -> Config {
        let mut map = HashMap::new();
        map.insert(String::from(NODE_ADDRESS_KEY), String::from(DEFAULT_NODE_ADDR));
        map.insert(String::from(NODE_NAME_KEY), String::from(DEFAULT_NODE_NAME));
        map.insert(String::from(DATA_DIR_KEY), String::from(DEFAULT_DATA_DIR));
        apply_env(&mut map);

        Config {
            inner: RwLock::new(map),
        }
    }

    /// Defaults, then `contents` as TOML, then the environment
    pub fn from_toml(contents: &str) -> Result<Config> {
        let config = Config::new();
        config.merge_toml(contents)?;
        Ok(config)
    }

    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            BlockchainError::Config(format!(
                "Failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        self.merge_toml(&contents)
    }

    fn merge_toml(&self, contents: &str) -> Result<()> {
        let file: ConfigFile = toml::from_str(contents)?;
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let entries = [
            (NODE_ADDRESS_KEY, file.node_address),
            (NODE_NAME_KEY, file.node_name),
            (DATA_DIR_KEY, file.data_dir),
            (PEERS_KEY, file.peers.map(|peers| peers.join(","))),
            (MINING_ADDRESS_KEY, file.mining_address),
        ];
        for (key, value) in entries {
            if let Some(value) = value {
                inner.insert(String::from(key), value);
            }
        }
        apply_env(&mut inner);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.insert(String::from(key), value);
    }

    pub fn get_node_addr(&self) -> String {
        self.get(NODE_ADDRESS_KEY)
            .unwrap_or_else(|| String::from(DEFAULT_NODE_ADDR))
    }

    pub fn set_node_addr(&self, addr: String) {
        self.set(NODE_ADDRESS_KEY, addr)
    }

    pub fn get_node_name(&self) -> String {
        self.get(NODE_NAME_KEY)
            .unwrap_or_else(|| String::from(DEFAULT_NODE_NAME))
    }

    pub fn set_node_name(&self, name: String) {
        self.set(NODE_NAME_KEY, name)
    }

    pub fn get_data_dir(&self) -> String {
        self.get(DATA_DIR_KEY)
            .unwrap_or_else(|| String::from(DEFAULT_DATA_DIR))
    }

    pub fn set_data_dir(&self, dir: String) {
        self.set(DATA_DIR_KEY, dir)
    }

    /// Peers this node announces itself to at startup
    pub fn get_peers(&self) -> Vec<String> {
        self.get(PEERS_KEY)
            .map(|peers| split_peers(&peers))
            .unwrap_or_default()
    }

    pub fn set_peers(&self, peers: &[String]) {
        self.set(PEERS_KEY, peers.join(","))
    }

    pub fn get_mining_addr(&self) -> Option<String> {
        self.get(MINING_ADDRESS_KEY)
    }

    pub fn set_mining_addr(&self, addr: String) {
        self.set(MINING_ADDRESS_KEY, addr)
    }

    /// Database directory of this node: `DATA_DIR/NODE_NAME`
    pub fn node_data_path(&self) -> PathBuf {
        PathBuf::from(self.get_data_dir()).join(self.get_node_name())
    }
}

fn apply_env(map: &mut HashMap<String, String>) {
    for key in [
        NODE_ADDRESS_KEY,
        NODE_NAME_KEY,
        DATA_DIR_KEY,
        PEERS_KEY,
        MINING_ADDRESS_KEY,
    ] {
        if let Ok(value) = env::var(key) {
            map.insert(String::from(key), value);
        }
    }
}

fn split_peers(peers: &str) -> Vec<String> {
    peers
        .split(',')
        .map(str::trim)
        .filter(|peer| !peer.is_empty())
        .map(String::from)
        .collect()
}
