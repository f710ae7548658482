//! Watch-asset suggestions.
//!
//! A site proposes an asset with [`SuggestionWorkflow::watch_asset`] and gets
//! back a [`PendingSuggestion`]. The user later accepts or rejects it by id;
//! each suggestion owns a one-shot channel that is settled exactly once.

use std::collections::HashMap;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{info, warn};

use crate::address::same_address;
use crate::error::{Error, SuggestionError, ValidationError};
use crate::registry::AssetRegistry;
use crate::types::{SuggestedAssetMeta, SuggestionStatus, WatchedAsset};

/// Capacity of the new-suggestion broadcast; slow observers miss old entries.
const NOTIFY_CAPACITY: usize = 16;

/// Resolves to the checksummed asset address on acceptance.
pub type SuggestionResult = Result<String, SuggestionError>;

/// Handle returned to the caller that proposed an asset.
#[derive(Debug)]
pub struct PendingSuggestion {
    pub meta: SuggestedAssetMeta,
    result: oneshot::Receiver<SuggestionResult>,
}

impl PendingSuggestion {
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// Wait for the user's decision.
    pub async fn wait(self) -> SuggestionResult {
        let id = self.meta.id;
        self.result
            .await
            .unwrap_or_else(|_| Err(SuggestionError::Dropped(id)))
    }
}

#[derive(Debug, Default)]
struct Pending {
    suggestions: Vec<SuggestedAssetMeta>,
    waiters: HashMap<String, oneshot::Sender<SuggestionResult>>,
}

impl Pending {
    /// Take a suggestion out of the pending set. Whoever gets it owns its only transition.
    fn claim(&mut self, id: &str) -> Option<(SuggestedAssetMeta, Option<oneshot::Sender<SuggestionResult>>)> {
        let pos = self.suggestions.iter().position(|s| s.id == id)?;
        let meta = self.suggestions.remove(pos);
        Some((meta, self.waiters.remove(id)))
    }
}

#[derive(Debug)]
pub struct SuggestionWorkflow {
    registry: Arc<AssetRegistry>,
    pending: Mutex<Pending>,
    notify: broadcast::Sender<SuggestedAssetMeta>,
}

impl SuggestionWorkflow {
    pub fn new(registry: Arc<AssetRegistry>) -> Self {
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            registry,
            pending: Mutex::new(Pending::default()),
            notify,
        }
    }

    /// Observe newly pending suggestions (e.g. to show a confirmation prompt).
    pub fn subscribe(&self) -> broadcast::Receiver<SuggestedAssetMeta> {
        self.notify.subscribe()
    }

    /// Suggestions still awaiting a decision, oldest first.
    pub async fn pending(&self) -> Vec<SuggestedAssetMeta> {
        self.pending.lock().await.suggestions.clone()
    }

    /// Propose an asset for the user to watch.
    ///
    /// Invalid payloads fail immediately with [`SuggestionError::Invalid`],
    /// which carries the suggestion in its `failed` state.
    pub async fn watch_asset(&self, asset: WatchedAsset) -> Result<PendingSuggestion, SuggestionError> {
        let mut meta = SuggestedAssetMeta::new(new_suggestion_id(), now_millis(), asset);

        if let Err(source) = meta.asset.validate() {
            meta.settle(SuggestionStatus::Failed, Some(source.to_string()));
            warn!(id = %meta.id, kind = meta.asset.kind(), %source, "watch asset request refused");
            return Err(SuggestionError::Invalid {
                suggestion: Box::new(meta),
                source,
            });
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.suggestions.push(meta.clone());
            pending.waiters.insert(meta.id.clone(), tx);
        }

        info!(id = %meta.id, kind = meta.asset.kind(), address = meta.asset.address(), "asset suggested");
        // No observers is fine; the suggestion stays listed in `pending()`.
        let _ = self.notify.send(meta.clone());

        Ok(PendingSuggestion { meta, result: rx })
    }

    /// Accept a pending suggestion and register the asset.
    ///
    /// Returns the settled suggestion: `accepted`, or `failed` if registration
    /// did not succeed. The suggestion leaves the pending list either way.
    pub async fn accept_watch_asset(&self, id: &str) -> Result<SuggestedAssetMeta, SuggestionError> {
        let (mut meta, waiter) = self
            .pending
            .lock()
            .await
            .claim(id)
            .ok_or_else(|| SuggestionError::NotFound(id.to_string()))?;

        let outcome = match register(&self.registry, &meta.asset).await {
            Ok(address) => {
                meta.settle(SuggestionStatus::Accepted, None);
                info!(%id, %address, "suggested asset accepted");
                Ok(address)
            }
            Err(err) => {
                let message = err.to_string();
                meta.settle(SuggestionStatus::Failed, Some(message.clone()));
                warn!(%id, error = %message, "suggested asset could not be added");
                Err(SuggestionError::Failed(message))
            }
        };

        if let Some(waiter) = waiter {
            let _ = waiter.send(outcome);
        }
        Ok(meta)
    }

    /// Reject a pending suggestion. Unknown or already-settled ids are ignored.
    pub async fn reject_watch_asset(&self, id: &str) -> Option<SuggestedAssetMeta> {
        let (mut meta, waiter) = self.pending.lock().await.claim(id)?;
        meta.settle(SuggestionStatus::Rejected, None);
        info!(%id, "suggested asset rejected");

        if let Some(waiter) = waiter {
            let _ = waiter.send(Err(SuggestionError::Rejected));
        }
        Some(meta)
    }
}

/// Registration step for each supported asset kind.
async fn register(registry: &AssetRegistry, asset: &WatchedAsset) -> Result<String, Error> {
    match asset {
        WatchedAsset::Erc20(token) => {
            let decimals = token
                .decimals
                .and_then(|d| u8::try_from(d).ok())
                .ok_or(Error::Validation(ValidationError::MissingFields))?;
            let tokens = registry
                .add_token(&token.address, &token.symbol, decimals, token.image.clone())
                .await?;
            tokens
                .into_iter()
                .find(|t| same_address(&t.address, &token.address))
                .map(|t| t.address)
                .ok_or_else(|| Error::InvalidAddress(token.address.clone()))
        }
    }
}

fn new_suggestion_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::{test_registry, DAI};
    use crate::types::Erc20Asset;

    fn dai(decimals: i64) -> WatchedAsset {
        WatchedAsset::Erc20(Erc20Asset {
            address: DAI.to_lowercase(),
            symbol: "ABC".to_string(),
            decimals: Some(decimals),
            image: None,
        })
    }

    async fn workflow() -> (Arc<AssetRegistry>, SuggestionWorkflow) {
        let registry = Arc::new(test_registry().await);
        (registry.clone(), SuggestionWorkflow::new(registry))
    }

    #[tokio::test]
    async fn test_invalid_decimals_fail_immediately() {
        let (_, workflow) = workflow().await;
        let err = workflow.watch_asset(dai(37)).await.unwrap_err();
        match err {
            SuggestionError::Invalid { suggestion, source } => {
                assert_eq!(source, ValidationError::InvalidDecimals(37));
                assert_eq!(suggestion.status, SuggestionStatus::Failed);
                assert!(suggestion.error.is_some());
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
        assert!(workflow.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_accept_resolves_with_checksummed_address() {
        let (registry, workflow) = workflow().await;
        let mut observer = workflow.subscribe();

        let pending = workflow.watch_asset(dai(18)).await.unwrap();
        let id = pending.id().to_string();
        assert_eq!(pending.meta.status, SuggestionStatus::Pending);
        assert_eq!(observer.recv().await.unwrap().id, id);
        assert_eq!(workflow.pending().await.len(), 1);

        let settled = workflow.accept_watch_asset(&id).await.unwrap();
        assert_eq!(settled.status, SuggestionStatus::Accepted);
        assert_eq!(pending.wait().await.unwrap(), DAI);

        assert!(workflow.pending().await.is_empty());
        let tokens = registry.tokens();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].address, DAI);
        assert_eq!(tokens[0].symbol, "ABC");
    }

    #[tokio::test]
    async fn test_reject_leaves_token_absent() {
        let (registry, workflow) = workflow().await;
        let pending = workflow.watch_asset(dai(18)).await.unwrap();
        let id = pending.id().to_string();

        let settled = workflow.reject_watch_asset(&id).await.unwrap();
        assert_eq!(settled.status, SuggestionStatus::Rejected);
        assert!(matches!(pending.wait().await, Err(SuggestionError::Rejected)));
        assert!(registry.tokens().is_empty());

        assert!(workflow.reject_watch_asset(&id).await.is_none());
        assert!(matches!(
            workflow.accept_watch_asset(&id).await,
            Err(SuggestionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_only_one_transition_per_suggestion() {
        let (registry, workflow) = workflow().await;
        let pending = workflow.watch_asset(dai(18)).await.unwrap();
        let id = pending.id().to_string();

        let (accepted, rejected) = tokio::join!(
            workflow.accept_watch_asset(&id),
            workflow.reject_watch_asset(&id)
        );
        assert_eq!(accepted.unwrap().status, SuggestionStatus::Accepted);
        assert!(rejected.is_none());
        assert_eq!(pending.wait().await.unwrap(), DAI);
        assert_eq!(registry.tokens().len(), 1);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let (_, workflow) = workflow().await;
        let a = workflow.watch_asset(dai(18)).await.unwrap();
        let b = workflow.watch_asset(dai(18)).await.unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().len(), 32);
        assert!(a.meta.time > 0);
    }

    #[tokio::test]
    async fn test_dropped_workflow_settles_waiter() {
        let (_, workflow) = workflow().await;
        let pending = workflow.watch_asset(dai(18)).await.unwrap();
        drop(workflow);
        assert!(matches!(pending.wait().await, Err(SuggestionError::Dropped(_))));
    }
}
