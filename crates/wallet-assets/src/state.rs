//! Per-account, per-chain asset state.
//!
//! [`KeyedAssets`] is never mutated in place: [`KeyedAssets::with_slice`]
//! returns a new map that shares nothing with the old one except the
//! untouched leaf lists' contents, and the registry swaps it in whole.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Collectible, CollectibleContract, Token};

/// Account address → chain id → entity list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyedAssets<T> {
    accounts: HashMap<String, HashMap<u64, Vec<T>>>,
}

impl<T> Default for KeyedAssets<T> {
    fn default() -> Self {
        Self {
            accounts: HashMap::new(),
        }
    }
}

impl<T: Clone> KeyedAssets<T> {
    /// The list for one `(account, chain)` pair, empty if none was stored.
    pub fn slice(&self, account: &str, chain_id: u64) -> &[T] {
        self.accounts
            .get(account)
            .and_then(|chains| chains.get(&chain_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Copy of this map with the `(account, chain)` list replaced by `list`.
    pub fn with_slice(&self, account: &str, chain_id: u64, list: Vec<T>) -> Self {
        let mut chains = self.accounts.get(account).cloned().unwrap_or_default();
        chains.insert(chain_id, list);

        let mut accounts = self.accounts.clone();
        accounts.insert(account.to_string(), chains);
        Self { accounts }
    }

    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }
}

/// The account and chain whose assets are currently projected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Checksummed account address; empty until an account is selected.
    pub address: String,
    pub chain_id: u64,
}

/// Snapshot published by the asset registry on every structural change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetsState {
    pub selection: Selection,

    pub all_tokens: KeyedAssets<Token>,
    pub all_collectible_contracts: KeyedAssets<CollectibleContract>,
    pub all_collectibles: KeyedAssets<Collectible>,

    /// Projections of the `all_*` maps for [`Selection`].
    pub tokens: Vec<Token>,
    pub collectible_contracts: Vec<CollectibleContract>,
    pub collectibles: Vec<Collectible>,

    pub ignored_tokens: Vec<Token>,
    pub ignored_collectibles: Vec<Collectible>,
}

impl AssetsState {
    /// Recompute the active lists from the keyed maps for the current selection.
    pub fn reproject(&mut self) {
        let Selection { address, chain_id } = &self.selection;
        self.tokens = self.all_tokens.slice(address, *chain_id).to_vec();
        self.collectible_contracts = self.all_collectible_contracts.slice(address, *chain_id).to_vec();
        self.collectibles = self.all_collectibles.slice(address, *chain_id).to_vec();
    }

    pub fn set_tokens(&mut self, tokens: Vec<Token>) {
        let Selection { address, chain_id } = &self.selection;
        self.all_tokens = self.all_tokens.with_slice(address, *chain_id, tokens.clone());
        self.tokens = tokens;
    }

    pub fn set_collectible_contracts(&mut self, contracts: Vec<CollectibleContract>) {
        let Selection { address, chain_id } = &self.selection;
        self.all_collectible_contracts =
            self.all_collectible_contracts
                .with_slice(address, *chain_id, contracts.clone());
        self.collectible_contracts = contracts;
    }

    pub fn set_collectibles(&mut self, collectibles: Vec<Collectible>) {
        let Selection { address, chain_id } = &self.selection;
        self.all_collectibles = self.all_collectibles.with_slice(address, *chain_id, collectibles.clone());
        self.collectibles = collectibles;
    }
}
