//! Background detection of tokens and collectibles held by the selected account.
//!
//! Each pass runs only while the primary chain is selected and detection is
//! enabled. Detected entities go through the regular [`AssetRegistry`] entry
//! points, so ignore lists and the single write lock apply as usual.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use num_bigint::BigUint;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::address::{same_address, to_checksum_address};
use crate::config::DetectionConfig;
use crate::contract::ContractReader;
use crate::contract_map::{find, KnownContract, MAINNET_CONTRACTS};
use crate::indexer::CollectibleIndex;
use crate::poll::PollHandle;
use crate::registry::AssetRegistry;
use crate::types::Token;

pub struct AssetDetection {
    registry: Arc<AssetRegistry>,
    index: Arc<dyn CollectibleIndex>,
    reader: Arc<dyn ContractReader>,
    known: Vec<KnownContract>,
    primary_chain_id: u64,
    disabled: AtomicBool,
    interval: Mutex<Duration>,
    poller: Mutex<Option<PollHandle>>,
}

impl AssetDetection {
    pub fn new(
        registry: Arc<AssetRegistry>,
        index: Arc<dyn CollectibleIndex>,
        reader: Arc<dyn ContractReader>,
        config: &DetectionConfig,
    ) -> Self {
        Self {
            registry,
            index,
            reader,
            known: MAINNET_CONTRACTS.to_vec(),
            primary_chain_id: config.primary_chain_id,
            disabled: AtomicBool::new(config.disabled),
            interval: Mutex::new(config.interval),
            poller: Mutex::new(None),
        }
    }

    /// Replace the candidate list used by token detection.
    pub fn with_known_contracts(mut self, known: Vec<KnownContract>) -> Self {
        self.known = known;
        self
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        let selection = self.registry.selection();
        !self.disabled.load(Ordering::SeqCst)
            && selection.chain_id == self.primary_chain_id
            && !selection.address.is_empty()
    }

    /// Start polling: one pass now, then one per interval. Restarts a running poller.
    pub async fn start(self: &Arc<Self>) {
        let period = *self.interval.lock().await;
        let mut poller = self.poller.lock().await;
        if let Some(previous) = poller.take() {
            previous.stop();
        }
        let this = self.clone();
        *poller = Some(PollHandle::spawn("asset_detection", period, move || {
            let this = this.clone();
            async move { this.detect().await }
        }));
        info!(interval_secs = period.as_secs(), "asset detection started");
    }

    /// Stop polling. A pass already in flight still completes.
    pub async fn stop(&self) {
        if let Some(poller) = self.poller.lock().await.take() {
            poller.stop();
        }
    }

    /// Change the polling interval, restarting the poller if it was running.
    pub async fn set_interval(self: &Arc<Self>, interval: Duration) {
        *self.interval.lock().await = interval;
        let running = self.poller.lock().await.is_some();
        if running {
            self.start().await;
        }
    }

    /// Run detection again after the user switched account or chain.
    pub async fn on_selection_changed(&self) {
        self.detect().await;
    }

    /// Run both detection passes once.
    pub async fn detect(&self) {
        if !self.is_active() {
            debug!("asset detection inactive, skipping");
            return;
        }
        self.detect_tokens().await;
        self.detect_collectibles().await;
    }

    /// Add known ERC-20 tokens the selected account holds a nonzero balance of.
    pub async fn detect_tokens(&self) {
        if !self.is_active() {
            return;
        }
        let selection = self.registry.selection();
        let owner = selection.address.as_str();
        let tracked: HashSet<String> = self
            .registry
            .tokens()
            .iter()
            .map(|t| t.address.to_lowercase())
            .collect();

        let candidates: Vec<String> = self
            .known
            .iter()
            .filter(|c| c.erc20 && !tracked.contains(&c.address.to_lowercase()))
            .filter_map(|c| to_checksum_address(c.address).ok())
            .collect();
        if candidates.is_empty() {
            return;
        }

        let balances = match self.reader.balances_in_single_call(owner, &candidates).await {
            Ok(balances) => balances,
            Err(err) => {
                warn!(%owner, %err, "token balance lookup failed");
                return;
            }
        };

        let ignored = self.registry.ignored_tokens();
        let staged: Vec<Token> = candidates
            .iter()
            .filter(|address| balances.get(*address).is_some_and(|b| *b != BigUint::ZERO))
            .filter(|address| !ignored.iter().any(|t| same_address(&t.address, address)))
            .filter_map(|address| {
                find(&self.known, address).map(|c| Token::new(address.clone(), c.symbol, c.decimals))
            })
            .collect();
        if staged.is_empty() {
            return;
        }

        debug!(%owner, count = staged.len(), "detected tokens");
        // The balances belong to `owner`; drop them if the account changed meanwhile.
        match self.registry.add_tokens_for(&selection, staged).await {
            Ok(Some(_)) => {}
            Ok(None) => debug!(%owner, "selection changed during token detection"),
            Err(err) => warn!(%owner, %err, "failed to add detected tokens"),
        }
    }

    /// Add collectibles the indexer reports for the selected account.
    pub async fn detect_collectibles(&self) {
        if !self.is_active() {
            return;
        }
        let owner = self.registry.selection().address;
        let owned = match self.index.owned_collectibles(&owner).await {
            Ok(owned) => owned,
            Err(err) => {
                warn!(%owner, %err, "collectible listing failed");
                Vec::new()
            }
        };

        let ignored = self.registry.ignored_collectibles();
        let adds = owned
            .into_iter()
            .filter(|c| !ignored.iter().any(|i| i.matches(&c.address, &c.token_id)))
            .map(|c| {
                let owner = owner.as_str();
                async move {
                    // The account may have changed while the listing was in flight.
                    if self.registry.selection().address != owner {
                        return;
                    }
                    if let Err(err) = self
                        .registry
                        .add_collectible(&c.address, c.token_id, Some(c.info), true)
                        .await
                    {
                        debug!(address = %c.address, %err, "detected collectible not added");
                    }
                }
            });
        join_all(adds).await;
    }
}

impl std::fmt::Debug for AssetDetection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetDetection")
            .field("primary_chain_id", &self.primary_chain_id)
            .field("disabled", &self.disabled.load(Ordering::SeqCst))
            .field("known", &self.known.len())
            .finish()
    }
}
