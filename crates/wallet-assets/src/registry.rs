//! Asset registry: tokens, collectible contracts and collectibles per account and chain.
//!
//! Every structural write runs under one async mutex shared by token and
//! collectible operations, reads the current [`AssetsState`], builds the new
//! leaf list and publishes the whole snapshot through a `watch` channel.
//! Writes that change nothing publish nothing.

use num_bigint::BigUint;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::address::to_checksum_address;
use crate::error::Error;
use crate::metadata::MetadataResolver;
use crate::state::{AssetsState, Selection};
use crate::types::{Collectible, CollectibleContract, CollectibleInfo, Token};

/// Proof that the caller holds the registry write lock.
type WriteGuard<'a> = MutexGuard<'a, ()>;

#[derive(Debug)]
pub struct AssetRegistry {
    state: watch::Sender<AssetsState>,
    lock: Mutex<()>,
    resolver: MetadataResolver,
}

impl AssetRegistry {
    pub fn new(resolver: MetadataResolver) -> Self {
        Self::with_state(resolver, AssetsState::default())
    }

    /// Start from a previously persisted snapshot.
    pub fn with_state(resolver: MetadataResolver, mut initial: AssetsState) -> Self {
        initial.reproject();
        let (state, _) = watch::channel(initial);
        Self {
            state,
            lock: Mutex::new(()),
            resolver,
        }
    }

    /// Current snapshot.
    pub fn state(&self) -> AssetsState {
        self.state.borrow().clone()
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<AssetsState> {
        self.state.subscribe()
    }

    pub fn selection(&self) -> Selection {
        self.state.borrow().selection.clone()
    }

    pub fn tokens(&self) -> Vec<Token> {
        self.state.borrow().tokens.clone()
    }

    pub fn collectibles(&self) -> Vec<Collectible> {
        self.state.borrow().collectibles.clone()
    }

    pub fn collectible_contracts(&self) -> Vec<CollectibleContract> {
        self.state.borrow().collectible_contracts.clone()
    }

    pub fn ignored_tokens(&self) -> Vec<Token> {
        self.state.borrow().ignored_tokens.clone()
    }

    pub fn ignored_collectibles(&self) -> Vec<Collectible> {
        self.state.borrow().ignored_collectibles.clone()
    }

    /// Apply `f` to the snapshot and notify subscribers if it reports a change.
    fn publish(&self, _guard: &WriteGuard<'_>, op: &'static str, f: impl FnOnce(&mut AssetsState) -> bool) {
        let changed = self.state.send_if_modified(f);
        trace!(op, changed, "assets state");
    }

    // ---- selection ----

    /// Switch the active account, recomputing the active lists.
    pub async fn set_selected_address(&self, address: &str) -> Result<(), Error> {
        let address = to_checksum_address(address)?;
        let guard = self.lock.lock().await;
        self.publish(&guard, "set_selected_address", |state| {
            if state.selection.address == address {
                return false;
            }
            state.selection.address = address;
            state.reproject();
            true
        });
        Ok(())
    }

    /// Switch the active chain, recomputing the active lists.
    pub async fn set_chain_id(&self, chain_id: u64) {
        let guard = self.lock.lock().await;
        self.publish(&guard, "set_chain_id", |state| {
            if state.selection.chain_id == chain_id {
                return false;
            }
            state.selection.chain_id = chain_id;
            state.reproject();
            true
        });
    }

    // ---- tokens ----

    /// Add or replace one token. An existing entry keeps its list position.
    pub async fn add_token(
        &self,
        address: &str,
        symbol: &str,
        decimals: u8,
        image: Option<String>,
    ) -> Result<Vec<Token>, Error> {
        let token = Token {
            address: address.to_string(),
            symbol: symbol.to_string(),
            decimals,
            image,
        };
        self.add_tokens(vec![token]).await
    }

    /// Add or replace several tokens with a single state publication.
    pub async fn add_tokens(&self, tokens: Vec<Token>) -> Result<Vec<Token>, Error> {
        let tokens = checksummed(tokens)?;
        let guard = self.lock.lock().await;
        Ok(self.add_tokens_locked(&guard, tokens))
    }

    /// Like [`Self::add_tokens`], but only while `expected` is still the
    /// selection. Returns `None` without writing if the account or chain moved.
    pub async fn add_tokens_for(
        &self,
        expected: &Selection,
        tokens: Vec<Token>,
    ) -> Result<Option<Vec<Token>>, Error> {
        let tokens = checksummed(tokens)?;
        let guard = self.lock.lock().await;
        if self.state.borrow().selection != *expected {
            debug!(address = %expected.address, "selection changed, dropping token batch");
            return Ok(None);
        }
        Ok(Some(self.add_tokens_locked(&guard, tokens)))
    }

    fn add_tokens_locked(&self, guard: &WriteGuard<'_>, tokens: Vec<Token>) -> Vec<Token> {
        if tokens.is_empty() {
            return self.tokens();
        }

        let (mut list, mut ignored) = {
            let state = self.state.borrow();
            (state.tokens.clone(), state.ignored_tokens.clone())
        };
        for token in tokens {
            ignored.retain(|t| t.address != token.address);
            match list.iter_mut().find(|t| t.address == token.address) {
                Some(existing) => *existing = token,
                None => list.push(token),
            }
        }
        debug!(count = list.len(), "tokens updated");

        self.publish(guard, "add_tokens", |state| {
            if state.tokens == list && state.ignored_tokens == ignored {
                return false;
            }
            state.set_tokens(list.clone());
            state.ignored_tokens = ignored;
            true
        });
        list
    }

    /// Drop a token from the active list without ignoring it.
    pub async fn remove_token(&self, address: &str) -> Result<(), Error> {
        self.remove_token_inner(address, false).await
    }

    /// Drop a token and add it to the ignore list so detection will not re-add it.
    pub async fn remove_and_ignore_token(&self, address: &str) -> Result<(), Error> {
        self.remove_token_inner(address, true).await
    }

    async fn remove_token_inner(&self, address: &str, ignore: bool) -> Result<(), Error> {
        let address = to_checksum_address(address)?;
        let guard = self.lock.lock().await;
        self.publish(&guard, "remove_token", |state| {
            let Some(pos) = state.tokens.iter().position(|t| t.address == address) else {
                return false;
            };
            let mut list = state.tokens.clone();
            let removed = list.remove(pos);
            if ignore && !state.ignored_tokens.iter().any(|t| t.address == address) {
                state.ignored_tokens.push(removed);
            }
            state.set_tokens(list);
            true
        });
        Ok(())
    }

    pub async fn clear_ignored_tokens(&self) {
        let guard = self.lock.lock().await;
        self.publish(&guard, "clear_ignored_tokens", |state| {
            if state.ignored_tokens.is_empty() {
                return false;
            }
            state.ignored_tokens.clear();
            true
        });
    }

    // ---- collectibles ----

    /// Ensure a contract entry exists, resolving its metadata if it does not.
    ///
    /// With `detection` the contract is only accepted when the resolved
    /// metadata carries a logo image; otherwise any non-empty metadata will do.
    pub async fn add_collectible_contract(
        &self,
        address: &str,
        detection: bool,
    ) -> Result<Vec<CollectibleContract>, Error> {
        let address = to_checksum_address(address)?;
        let guard = self.lock.lock().await;
        match self.ensure_contract(&guard, &address, detection).await {
            Some((contracts, true)) => {
                self.publish(&guard, "add_collectible_contract", |state| {
                    state.set_collectible_contracts(contracts.clone());
                    true
                });
                Ok(contracts)
            }
            Some((contracts, false)) => Ok(contracts),
            None => Ok(self.collectible_contracts()),
        }
    }

    /// Contract list containing `address`, with a freshly resolved entry
    /// appended when it was missing (reported by the flag). Nothing is
    /// published here. `None` when the contract is not recognized.
    async fn ensure_contract(
        &self,
        _guard: &WriteGuard<'_>,
        address: &str,
        detection: bool,
    ) -> Option<(Vec<CollectibleContract>, bool)> {
        let mut contracts = self.collectible_contracts();
        if contracts.iter().any(|c| c.address == address) {
            return Some((contracts, false));
        }

        let info = self.resolver.resolve_contract_info(address).await;
        if info.is_empty() || (detection && info.logo.is_none()) {
            debug!(%address, detection, "collectible contract not recognized, skipping");
            return None;
        }

        contracts.push(CollectibleContract::new(address, info));
        Some((contracts, true))
    }

    /// Add a collectible, creating its contract entry first if needed.
    ///
    /// `info` is stored as given when supplied; otherwise metadata is
    /// resolved. Nothing is added when the contract entry cannot be created.
    /// A new contract and its first collectible are published together.
    pub async fn add_collectible(
        &self,
        address: &str,
        token_id: BigUint,
        info: Option<CollectibleInfo>,
        detection: bool,
    ) -> Result<Vec<Collectible>, Error> {
        let address = to_checksum_address(address)?;
        let guard = self.lock.lock().await;

        let Some((contracts, contract_added)) =
            self.ensure_contract(&guard, &address, detection).await
        else {
            return Ok(self.collectibles());
        };

        let mut collectibles = self.collectibles();
        let collectible_added = !collectibles.iter().any(|c| c.matches(&address, &token_id));
        if collectible_added {
            let info = match info {
                Some(info) => info,
                None => self.resolver.resolve_collectible_info(&address, &token_id).await,
            };
            debug!(%address, %token_id, detection, "collectible added");
            collectibles.push(Collectible::new(address.clone(), token_id.clone(), info));
        }
        if !contract_added && !collectible_added {
            return Ok(collectibles);
        }

        self.publish(&guard, "add_collectible", |state| {
            if contract_added {
                state.set_collectible_contracts(contracts);
            }
            if collectible_added {
                state
                    .ignored_collectibles
                    .retain(|c| !c.matches(&address, &token_id));
                state.set_collectibles(collectibles.clone());
            }
            true
        });
        Ok(collectibles)
    }

    /// Drop a collectible; its contract goes too if no other collectible uses it.
    pub async fn remove_collectible(&self, address: &str, token_id: &BigUint) -> Result<(), Error> {
        self.remove_collectible_inner(address, token_id, false).await
    }

    /// Drop a collectible and add it to the ignore list so detection will not re-add it.
    pub async fn remove_and_ignore_collectible(&self, address: &str, token_id: &BigUint) -> Result<(), Error> {
        self.remove_collectible_inner(address, token_id, true).await
    }

    async fn remove_collectible_inner(&self, address: &str, token_id: &BigUint, ignore: bool) -> Result<(), Error> {
        let address = to_checksum_address(address)?;
        let guard = self.lock.lock().await;
        self.publish(&guard, "remove_collectible", |state| {
            let Some(pos) = state.collectibles.iter().position(|c| c.matches(&address, token_id)) else {
                return false;
            };
            let mut collectibles = state.collectibles.clone();
            let removed = collectibles.remove(pos);
            if ignore
                && !state
                    .ignored_collectibles
                    .iter()
                    .any(|c| c.matches(&address, token_id))
            {
                state.ignored_collectibles.push(removed);
            }

            if !collectibles.iter().any(|c| c.address == address) {
                let contracts = state
                    .collectible_contracts
                    .iter()
                    .filter(|c| c.address != address)
                    .cloned()
                    .collect();
                state.set_collectible_contracts(contracts);
            }
            state.set_collectibles(collectibles);
            true
        });
        Ok(())
    }

    /// Drop a contract entry together with every collectible it holds.
    pub async fn remove_collectible_contract(&self, address: &str) -> Result<(), Error> {
        let address = to_checksum_address(address)?;
        let guard = self.lock.lock().await;
        self.publish(&guard, "remove_collectible_contract", |state| {
            if !state.collectible_contracts.iter().any(|c| c.address == address) {
                return false;
            }
            let contracts = state
                .collectible_contracts
                .iter()
                .filter(|c| c.address != address)
                .cloned()
                .collect();
            let collectibles = state
                .collectibles
                .iter()
                .filter(|c| c.address != address)
                .cloned()
                .collect();
            state.set_collectible_contracts(contracts);
            state.set_collectibles(collectibles);
            true
        });
        Ok(())
    }

    pub async fn clear_ignored_collectibles(&self) {
        let guard = self.lock.lock().await;
        self.publish(&guard, "clear_ignored_collectibles", |state| {
            if state.ignored_collectibles.is_empty() {
                return false;
            }
            state.ignored_collectibles.clear();
            true
        });
    }
}

fn checksummed(tokens: Vec<Token>) -> Result<Vec<Token>, Error> {
    tokens
        .into_iter()
        .map(|t| -> Result<Token, Error> {
            Ok(Token {
                address: to_checksum_address(&t.address)?,
                ..t
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::metadata::{MetadataSource, StaticMetadataSource};
    use crate::types::ContractInfo;
    use std::sync::Arc;

    pub(crate) const ALICE: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    pub(crate) const DAI: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";
    pub(crate) const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
    pub(crate) const KITTIES: &str = "0x06012c8cf97BEaD5deAe237070F9587f8E7A266d";
    /// Known to the test indexer by name only, no logo.
    pub(crate) const NAMELESS_LOGO: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

    pub(crate) fn test_source() -> StaticMetadataSource {
        let mut source = StaticMetadataSource::new();
        source.insert_contract(
            KITTIES,
            ContractInfo {
                name: Some("CryptoKitties".to_string()),
                symbol: Some("CK".to_string()),
                logo: Some("https://img/ck.png".to_string()),
                ..Default::default()
            },
        );
        source.insert_contract(
            NAMELESS_LOGO,
            ContractInfo {
                name: Some("Plain".to_string()),
                ..Default::default()
            },
        );
        source.insert_collectible(
            KITTIES,
            BigUint::from(1u32),
            CollectibleInfo {
                name: Some("Kitty #1".to_string()),
                ..Default::default()
            },
        );
        source
    }

    pub(crate) async fn test_registry() -> AssetRegistry {
        let resolver = MetadataResolver::new(vec![Arc::new(test_source()) as Arc<dyn MetadataSource>]);
        let registry = AssetRegistry::new(resolver);
        registry.set_selected_address(ALICE).await.unwrap();
        registry.set_chain_id(1).await;
        registry
    }

    fn id(n: u32) -> BigUint {
        BigUint::from(n)
    }

    #[tokio::test]
    async fn test_addresses_are_checksummed() {
        let registry = test_registry().await;
        registry.add_token(&DAI.to_lowercase(), "DAI", 18, None).await.unwrap();
        registry
            .add_collectible(&KITTIES.to_uppercase().replace("0X", "0x"), id(1), None, false)
            .await
            .unwrap();

        let state = registry.state();
        assert_eq!(state.tokens[0].address, DAI);
        assert_eq!(state.collectibles[0].address, KITTIES);
        assert_eq!(state.collectible_contracts[0].address, KITTIES);
        assert_eq!(state.selection.address, ALICE);
    }

    #[tokio::test]
    async fn test_add_token_replaces_in_place() {
        let registry = test_registry().await;
        registry.add_token(DAI, "DAI", 18, None).await.unwrap();
        registry.add_token(USDC, "USDC", 6, None).await.unwrap();
        let tokens = registry
            .add_token(&DAI.to_lowercase(), "SAI", 18, Some("https://img/sai.png".to_string()))
            .await
            .unwrap();

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].address, DAI);
        assert_eq!(tokens[0].symbol, "SAI");
        assert_eq!(tokens[0].image.as_deref(), Some("https://img/sai.png"));
        assert_eq!(tokens[1].symbol, "USDC");
        assert_eq!(registry.state().all_tokens.slice(ALICE, 1), tokens.as_slice());
    }

    #[tokio::test]
    async fn test_add_token_rejects_bad_address() {
        let registry = test_registry().await;
        let result = registry.add_token("0x1234", "BAD", 18, None).await;
        assert!(matches!(result, Err(Error::InvalidAddress(_))));
        assert!(registry.tokens().is_empty());
    }

    #[tokio::test]
    async fn test_lists_are_keyed_by_account_and_chain() {
        let registry = test_registry().await;
        registry.add_token(DAI, "DAI", 18, None).await.unwrap();

        registry.set_chain_id(5).await;
        assert!(registry.tokens().is_empty());
        registry.add_token(USDC, "USDC", 6, None).await.unwrap();

        registry.set_selected_address(DAI).await.unwrap();
        assert!(registry.tokens().is_empty());

        registry.set_selected_address(ALICE).await.unwrap();
        assert_eq!(registry.tokens()[0].symbol, "USDC");
        registry.set_chain_id(1).await;
        assert_eq!(registry.tokens()[0].symbol, "DAI");
        assert_eq!(registry.tokens().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let registry = test_registry().await;
        let (a, b) = tokio::join!(
            registry.add_token(DAI, "DAI", 18, None),
            registry.add_collectible(KITTIES, id(1), None, false),
        );
        a.unwrap();
        b.unwrap();
        let (c, d) = tokio::join!(
            registry.add_token(USDC, "USDC", 6, None),
            registry.add_collectible(KITTIES, id(2), None, false),
        );
        c.unwrap();
        d.unwrap();

        let state = registry.state();
        assert_eq!(state.tokens.len(), 2);
        assert_eq!(state.collectibles.len(), 2);
        assert_eq!(state.all_collectibles.slice(ALICE, 1).len(), 2);
    }

    #[tokio::test]
    async fn test_remove_last_collectible_removes_contract() {
        let registry = test_registry().await;
        registry.add_collectible(KITTIES, id(1), None, false).await.unwrap();
        registry.add_collectible(KITTIES, id(2), None, false).await.unwrap();

        registry.remove_collectible(KITTIES, &id(1)).await.unwrap();
        assert_eq!(registry.collectibles().len(), 1);
        assert_eq!(registry.collectible_contracts().len(), 1);

        registry.remove_collectible(&KITTIES.to_lowercase(), &id(2)).await.unwrap();
        assert!(registry.collectibles().is_empty());
        assert!(registry.collectible_contracts().is_empty());
        assert!(registry.ignored_collectibles().is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_ignore_is_idempotent() {
        let registry = test_registry().await;
        registry.add_token(DAI, "DAI", 18, None).await.unwrap();
        registry.add_collectible(KITTIES, id(1), None, false).await.unwrap();

        for _ in 0..2 {
            registry.remove_and_ignore_token(DAI).await.unwrap();
            registry.remove_and_ignore_collectible(KITTIES, &id(1)).await.unwrap();
        }

        let state = registry.state();
        assert!(state.tokens.is_empty());
        assert_eq!(state.ignored_tokens.len(), 1);
        assert!(state.collectibles.is_empty());
        assert!(state.collectible_contracts.is_empty());
        assert_eq!(state.ignored_collectibles.len(), 1);
        assert_eq!(state.ignored_collectibles[0].token_id, id(1));
    }

    #[tokio::test]
    async fn test_readding_clears_ignore_entry() {
        let registry = test_registry().await;
        registry.add_token(DAI, "DAI", 18, None).await.unwrap();
        registry.remove_and_ignore_token(DAI).await.unwrap();
        registry.add_token(DAI, "DAI", 18, None).await.unwrap();
        assert!(registry.ignored_tokens().is_empty());
        assert_eq!(registry.tokens().len(), 1);

        registry.add_collectible(KITTIES, id(1), None, false).await.unwrap();
        registry.remove_and_ignore_collectible(KITTIES, &id(1)).await.unwrap();
        registry.add_collectible(KITTIES, id(1), None, false).await.unwrap();
        assert!(registry.ignored_collectibles().is_empty());
        assert_eq!(registry.collectibles().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_ignored() {
        let registry = test_registry().await;
        registry.add_token(DAI, "DAI", 18, None).await.unwrap();
        registry.add_collectible(KITTIES, id(1), None, false).await.unwrap();
        registry.remove_and_ignore_token(DAI).await.unwrap();
        registry.remove_and_ignore_collectible(KITTIES, &id(1)).await.unwrap();

        registry.clear_ignored_tokens().await;
        registry.clear_ignored_collectibles().await;
        assert!(registry.ignored_tokens().is_empty());
        assert!(registry.ignored_collectibles().is_empty());
    }

    #[tokio::test]
    async fn test_detection_requires_contract_logo() {
        let registry = test_registry().await;

        let added = registry.add_collectible(NAMELESS_LOGO, id(9), None, true).await.unwrap();
        assert!(added.is_empty());
        assert!(registry.collectible_contracts().is_empty());

        let added = registry.add_collectible(NAMELESS_LOGO, id(9), None, false).await.unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(registry.collectible_contracts()[0].info.name.as_deref(), Some("Plain"));
    }

    #[tokio::test]
    async fn test_unknown_contract_is_not_added() {
        let registry = test_registry().await;
        let added = registry.add_collectible(DAI, id(1), None, false).await.unwrap();
        assert!(added.is_empty());
        assert!(registry.collectible_contracts().is_empty());
        assert!(registry.add_collectible_contract(DAI, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_supplied_info_is_used_verbatim() {
        let registry = test_registry().await;
        let info = CollectibleInfo {
            name: Some("Given".to_string()),
            image: Some("https://img/given.png".to_string()),
            description: None,
        };
        let added = registry
            .add_collectible(KITTIES, id(1), Some(info.clone()), false)
            .await
            .unwrap();
        assert_eq!(added[0].info, info);

        let resolved = registry.add_collectible(KITTIES, id(2), None, false).await.unwrap();
        assert!(resolved[1].info.is_empty());
    }

    #[tokio::test]
    async fn test_noop_writes_do_not_publish() {
        let registry = test_registry().await;
        registry.add_collectible(KITTIES, id(1), None, false).await.unwrap();

        let mut rx = registry.subscribe();
        rx.borrow_and_update();

        registry.add_collectible(KITTIES, id(1), None, true).await.unwrap();
        registry.add_tokens(vec![]).await.unwrap();
        registry.remove_token(DAI).await.unwrap();
        registry.remove_collectible(KITTIES, &id(42)).await.unwrap();
        registry.clear_ignored_tokens().await;
        assert!(!rx.has_changed().unwrap());

        registry.add_token(DAI, "DAI", 18, None).await.unwrap();
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_remove_collectible_contract_drops_its_collectibles() {
        let registry = test_registry().await;
        registry.add_collectible(KITTIES, id(1), None, false).await.unwrap();
        registry.add_collectible(NAMELESS_LOGO, id(1), None, false).await.unwrap();

        registry.remove_collectible_contract(KITTIES).await.unwrap();
        let state = registry.state();
        assert_eq!(state.collectible_contracts.len(), 1);
        assert_eq!(state.collectibles.len(), 1);
        assert_eq!(state.collectibles[0].address, NAMELESS_LOGO);
    }

    #[tokio::test]
    async fn test_with_state_projects_selection() {
        let mut initial = AssetsState::default();
        initial.selection = Selection {
            address: ALICE.to_string(),
            chain_id: 1,
        };
        initial.all_tokens = initial
            .all_tokens
            .with_slice(ALICE, 1, vec![Token::new(DAI, "DAI", 18)]);

        let registry = AssetRegistry::with_state(MetadataResolver::default(), initial);
        assert_eq!(registry.tokens().len(), 1);
    }

    /// Notes whether a contract entry was already published when collectible
    /// metadata was requested.
    struct PeekingSource {
        inner: StaticMetadataSource,
        state: std::sync::OnceLock<watch::Receiver<AssetsState>>,
        contract_seen_early: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl MetadataSource for PeekingSource {
        fn label(&self) -> &'static str {
            "peeking"
        }

        async fn collectible_info(&self, address: &str, token_id: &BigUint) -> Result<CollectibleInfo, Error> {
            let seen = self
                .state
                .get()
                .is_some_and(|rx| !rx.borrow().collectible_contracts.is_empty());
            if seen {
                self.contract_seen_early
                    .store(true, std::sync::atomic::Ordering::SeqCst);
            }
            self.inner.collectible_info(address, token_id).await
        }

        async fn contract_info(&self, address: &str) -> Result<ContractInfo, Error> {
            self.inner.contract_info(address).await
        }
    }

    #[tokio::test]
    async fn test_new_contract_and_collectible_publish_together() {
        let source = Arc::new(PeekingSource {
            inner: test_source(),
            state: std::sync::OnceLock::new(),
            contract_seen_early: std::sync::atomic::AtomicBool::new(false),
        });
        let registry = AssetRegistry::new(MetadataResolver::new(vec![
            source.clone() as Arc<dyn MetadataSource>
        ]));
        registry.set_selected_address(ALICE).await.unwrap();
        registry.set_chain_id(1).await;
        source.state.set(registry.subscribe()).unwrap();

        let mut rx = registry.subscribe();
        rx.borrow_and_update();
        registry.add_collectible(KITTIES, id(1), None, false).await.unwrap();

        assert!(!source
            .contract_seen_early
            .load(std::sync::atomic::Ordering::SeqCst));
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.collectible_contracts.len(), 1);
        assert_eq!(state.collectibles.len(), 1);
        assert_eq!(state.collectibles[0].info.name.as_deref(), Some("Kitty #1"));
    }
}
