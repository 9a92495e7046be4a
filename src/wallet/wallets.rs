use crate::core::monetary::FEE_PER_TRANSACTION;
use crate::core::{Ledger, Transaction};
use crate::error::{BlockchainError, Result};
use crate::storage::{load_all, write_all, Store, WALLETS_COLLECTION};
use crate::wallet::{build_transaction, KeyChainWallet, TransferRequest};
use log::{info, warn};

/// Every wallet a node operates, persisted as one collection
pub struct Wallets {
    wallets: Vec<KeyChainWallet>,
    store: Box<dyn Store>,
}

impl Wallets {
    pub fn open(store: Box<dyn Store>) -> Result<Wallets> {
        let wallets = load_all(store.as_ref(), WALLETS_COLLECTION)?;
        Ok(Wallets { wallets, store })
    }

    fn save(&self) -> Result<()> {
        write_all(self.store.as_ref(), WALLETS_COLLECTION, &self.wallets)
    }

    /// Creates a wallet and returns its id
    pub fn create_wallet(&mut self, password: &str) -> Result<String> {
        let wallet = KeyChainWallet::from_password(password)?;
        let id = wallet.get_id().to_string();
        self.wallets.push(wallet);
        self.save()?;
        info!("Wallet created: {id}");
        Ok(id)
    }

    pub fn get_wallet(&self, wallet_id: &str) -> Result<&KeyChainWallet> {
        self.wallets
            .iter()
            .find(|wallet| wallet.get_id() == wallet_id)
            .ok_or_else(|| BlockchainError::NotFound(format!("Wallet with id '{wallet_id}'")))
    }

    fn get_wallet_mut(&mut self, wallet_id: &str) -> Result<&mut KeyChainWallet> {
        self.wallets
            .iter_mut()
            .find(|wallet| wallet.get_id() == wallet_id)
            .ok_or_else(|| BlockchainError::NotFound(format!("Wallet with id '{wallet_id}'")))
    }

    pub fn get_ids(&self) -> Vec<String> {
        self.wallets
            .iter()
            .map(|wallet| wallet.get_id().to_string())
            .collect()
    }

    pub fn authenticate(&self, wallet_id: &str, password: &str) -> Result<&KeyChainWallet> {
        let wallet = self.get_wallet(wallet_id)?;
        if !wallet.check_password(password) {
            warn!("Password does not match for wallet {wallet_id}");
            return Err(BlockchainError::Wallet("Incorrect password".to_string()));
        }
        Ok(wallet)
    }

    pub fn generate_address(&mut self, wallet_id: &str) -> Result<String> {
        let address = self.get_wallet_mut(wallet_id)?.generate_address()?;
        self.save()?;
        info!("Address generated for wallet {wallet_id}: {address}");
        Ok(address)
    }

    pub fn addresses(&self, wallet_id: &str) -> Result<Vec<String>> {
        Ok(self.get_wallet(wallet_id)?.addresses())
    }

    /// Spends every unspent output of `from`; change goes back to
    /// `change_address`, or to `from` when none is given.
    pub fn create_transaction(
        &self,
        ledger: &Ledger,
        wallet_id: &str,
        from: &str,
        to: &str,
        amount: i64,
        change_address: Option<&str>,
    ) -> Result<Transaction> {
        let wallet = self.get_wallet(wallet_id)?;
        let secret = wallet.secret_key_for(from).ok_or_else(|| {
            BlockchainError::NotFound(format!(
                "Secret key for wallet '{wallet_id}' and address '{from}'"
            ))
        })?;

        build_transaction(TransferRequest {
            utxos: ledger.unspent_for(Some(from)),
            destination: to.to_string(),
            amount,
            change_address: change_address.unwrap_or(from).to_string(),
            fee: FEE_PER_TRANSACTION,
            secret: secret.to_string(),
        })
    }
}
