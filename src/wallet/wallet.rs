use crate::error::{BlockchainError, Result};
use crate::utils::{check_password, derive_secret, generate_keypair, hash, password_digest, random_id, DEFAULT_ID_LEN};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    index: u32,
    secret_key: String,
    public_key: String,
}

impl KeyPair {
    pub fn get_index(&self) -> u32 {
        self.index
    }

    pub fn get_secret_key(&self) -> &str {
        self.secret_key.as_str()
    }

    pub fn get_public_key(&self) -> &str {
        self.public_key.as_str()
    }
}

/// Linear chain of addresses: every key pair is derived from the one before it,
/// the first from the root secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyChainWallet {
    id: String,
    password_hash: String,
    login_hash: String,
    secret: Option<String>,
    key_pairs: Vec<KeyPair>,
}

impl KeyChainWallet {
    pub fn from_password(password: &str) -> Result<KeyChainWallet> {
        if password.is_empty() {
            return Err(BlockchainError::Wallet("Password must not be empty".to_string()));
        }
        Ok(KeyChainWallet {
            id: random_id(DEFAULT_ID_LEN),
            password_hash: hash(password),
            login_hash: password_digest(password)?,
            secret: None,
            key_pairs: Vec::new(),
        })
    }

    /// Root secret, derived from the password hash the first time it is needed
    fn root_secret(&mut self) -> &str {
        let password_hash = &self.password_hash;
        self.secret
            .get_or_insert_with(|| derive_secret(password_hash))
            .as_str()
    }

    /// Appends the next key pair and returns its public key
    pub fn generate_address(&mut self) -> Result<String> {
        let seed = match self.key_pairs.last() {
            Some(last) => last.secret_key.clone(),
            None => self.root_secret().to_string(),
        };
        let material = generate_keypair(&derive_secret(&seed))?;
        let key_pair = KeyPair {
            index: self.key_pairs.len() as u32 + 1,
            secret_key: material.secret_key.clone(),
            public_key: material.public_key.clone(),
        };
        self.key_pairs.push(key_pair);
        Ok(material.public_key)
    }

    pub fn secret_key_for(&self, address: &str) -> Option<&str> {
        self.key_pairs
            .iter()
            .find(|pair| pair.public_key == address)
            .map(KeyPair::get_secret_key)
    }

    pub fn addresses(&self) -> Vec<String> {
        self.key_pairs
            .iter()
            .map(|pair| pair.public_key.clone())
            .collect()
    }

    /// Key pairs are numbered from 1
    pub fn address_by_index(&self, index: u32) -> Option<&str> {
        self.key_pairs
            .iter()
            .find(|pair| pair.index == index)
            .map(KeyPair::get_public_key)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.key_pairs.iter().any(|pair| pair.public_key == address)
    }

    pub fn check_password(&self, password: &str) -> bool {
        check_password(password, &self.login_hash)
    }

    pub fn get_id(&self) -> &str {
        self.id.as_str()
    }

    pub fn key_pairs(&self) -> &[KeyPair] {
        self.key_pairs.as_slice()
    }
}
