//! Exchange rate between the native currency and the user's display currency.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::config::CurrencyRateConfig;
use crate::error::{Error, FetchError};
use crate::poll::PollHandle;

/// Published exchange rate state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyRateState {
    /// Unix seconds of the last successful update.
    pub conversion_date: Option<i64>,
    pub conversion_rate: Option<f64>,
    pub current_currency: String,
    pub native_currency: String,
    pub pending_current_currency: Option<String>,
    pub pending_native_currency: Option<String>,
    pub usd_conversion_rate: Option<f64>,
}

impl CurrencyRateState {
    fn from_config(config: &CurrencyRateConfig) -> Self {
        Self {
            conversion_date: None,
            conversion_rate: None,
            current_currency: config.current_currency.clone(),
            native_currency: config.native_currency.clone(),
            pending_current_currency: None,
            pending_native_currency: None,
            usd_conversion_rate: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeRate {
    pub conversion_rate: f64,
    pub usd_conversion_rate: Option<f64>,
}

/// Where exchange rates come from.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_exchange_rate(
        &self,
        currency: &str,
        native_currency: &str,
        include_usd: bool,
    ) -> Result<ExchangeRate, Error>;
}

/// Price endpoint URL. USD is only appended when it is not already the target.
pub fn rate_url(base_url: &str, currency: &str, native_currency: &str, include_usd: bool) -> String {
    let currency = currency.to_uppercase();
    let mut symbols = currency.clone();
    if include_usd && currency != "USD" {
        symbols.push_str(",USD");
    }
    format!("{base_url}?fsym={}&tsyms={symbols}", native_currency.to_uppercase())
}

/// Parse a `{ "EUR": 1234.5, "USD": 1400.1 }` price response.
pub fn parse_rate_response(
    body: &serde_json::Value,
    currency: &str,
    include_usd: bool,
) -> Result<ExchangeRate, FetchError> {
    let rate = |symbol: &str| {
        body.get(symbol)
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| FetchError::InvalidResponse(format!("Invalid response for {symbol}: {body}")))
    };

    let currency = currency.to_uppercase();
    let conversion_rate = rate(&currency)?;
    let usd_conversion_rate = match (include_usd, currency == "USD") {
        (false, _) => None,
        (true, true) => Some(conversion_rate),
        (true, false) => Some(rate("USD")?),
    };
    Ok(ExchangeRate {
        conversion_rate,
        usd_conversion_rate,
    })
}

#[cfg(feature = "http")]
pub use client::CryptoCompare;

#[cfg(feature = "http")]
mod client {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{parse_rate_response, rate_url, ExchangeRate, RateSource};
    use crate::config::CurrencyRateConfig;
    use crate::error::Error;
    use crate::http;

    /// CryptoCompare-style price API.
    #[derive(Debug, Clone)]
    pub struct CryptoCompare {
        client: reqwest::Client,
        base_url: String,
        timeout: Duration,
    }

    impl CryptoCompare {
        pub fn new(config: &CurrencyRateConfig) -> Self {
            Self {
                client: reqwest::Client::new(),
                base_url: config.price_api_url.clone(),
                timeout: config.timeout,
            }
        }
    }

    #[async_trait]
    impl RateSource for CryptoCompare {
        async fn fetch_exchange_rate(
            &self,
            currency: &str,
            native_currency: &str,
            include_usd: bool,
        ) -> Result<ExchangeRate, Error> {
            let url = rate_url(&self.base_url, currency, native_currency, include_usd);
            let body: serde_json::Value = http::get_json(&self.client, &url, &[], self.timeout).await?;
            Ok(parse_rate_response(&body, currency, include_usd)?)
        }
    }
}

pub struct CurrencyRateController {
    source: Arc<dyn RateSource>,
    state: watch::Sender<CurrencyRateState>,
    lock: Mutex<()>,
    include_usd: bool,
    disabled: AtomicBool,
    interval: Mutex<Duration>,
    poller: Mutex<Option<PollHandle>>,
}

impl CurrencyRateController {
    pub fn new(source: Arc<dyn RateSource>, config: &CurrencyRateConfig) -> Self {
        let (state, _) = watch::channel(CurrencyRateState::from_config(config));
        Self {
            source,
            state,
            lock: Mutex::new(()),
            include_usd: config.include_usd_rate,
            disabled: AtomicBool::new(config.disabled),
            interval: Mutex::new(config.interval),
            poller: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CurrencyRateState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CurrencyRateState> {
        self.state.subscribe()
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    /// Fetch the rate for the pending (or current) currency pair and publish it.
    ///
    /// On failure the published state is left untouched, pending values included.
    pub async fn update_exchange_rate(&self) -> Result<(), Error> {
        if self.disabled.load(Ordering::SeqCst) {
            return Ok(());
        }
        let _guard = self.lock.lock().await;

        let (currency, native_currency) = {
            let state = self.state.borrow();
            (
                state
                    .pending_current_currency
                    .clone()
                    .unwrap_or_else(|| state.current_currency.clone()),
                state
                    .pending_native_currency
                    .clone()
                    .unwrap_or_else(|| state.native_currency.clone()),
            )
        };
        if currency.is_empty() || native_currency.is_empty() {
            return Ok(());
        }

        let rate = self
            .source
            .fetch_exchange_rate(&currency, &native_currency, self.include_usd)
            .await?;
        debug!(%currency, %native_currency, rate = rate.conversion_rate, "exchange rate updated");

        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.state.send_modify(|state| {
            state.conversion_date = Some(now);
            state.conversion_rate = Some(rate.conversion_rate);
            state.usd_conversion_rate = rate.usd_conversion_rate;
            state.current_currency = currency;
            state.native_currency = native_currency;
            state.pending_current_currency = None;
            state.pending_native_currency = None;
        });
        Ok(())
    }

    /// Switch the display currency and refresh the rate.
    pub async fn set_current_currency(&self, currency: &str) -> Result<(), Error> {
        {
            let _guard = self.lock.lock().await;
            let currency = currency.to_string();
            self.state
                .send_modify(|state| state.pending_current_currency = Some(currency));
        }
        self.update_exchange_rate().await
    }

    /// Switch the native currency (e.g. after a network change) and refresh the rate.
    pub async fn set_native_currency(&self, native_currency: &str) -> Result<(), Error> {
        {
            let _guard = self.lock.lock().await;
            let native_currency = native_currency.to_string();
            self.state
                .send_modify(|state| state.pending_native_currency = Some(native_currency));
        }
        self.update_exchange_rate().await
    }

    /// Start polling: one update now, then one per interval. Restarts a running poller.
    pub async fn start(self: &Arc<Self>) {
        let period = *self.interval.lock().await;
        let mut poller = self.poller.lock().await;
        if let Some(previous) = poller.take() {
            previous.stop();
        }
        let this = self.clone();
        *poller = Some(PollHandle::spawn("currency_rate", period, move || {
            let this = this.clone();
            async move {
                if let Err(err) = this.update_exchange_rate().await {
                    warn!(%err, "exchange rate update failed");
                }
            }
        }));
        info!(interval_secs = period.as_secs(), "currency rate polling started");
    }

    pub async fn stop(&self) {
        if let Some(poller) = self.poller.lock().await.take() {
            poller.stop();
        }
    }

    pub async fn set_interval(self: &Arc<Self>, interval: Duration) {
        *self.interval.lock().await = interval;
        let running = self.poller.lock().await.is_some();
        if running {
            self.start().await;
        }
    }
}

impl std::fmt::Debug for CurrencyRateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrencyRateController")
            .field("state", &*self.state.borrow())
            .field("include_usd", &self.include_usd)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    /// Serves fixed rates per currency; unknown currencies error.
    #[derive(Default)]
    struct FakeRates {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl RateSource for FakeRates {
        async fn fetch_exchange_rate(
            &self,
            currency: &str,
            native_currency: &str,
            include_usd: bool,
        ) -> Result<ExchangeRate, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(FetchError::Timeout {
                    url: "https://prices.test".to_string(),
                    secs: 15,
                }
                .into());
            }
            let body = match native_currency {
                "ETH" => json!({ "USD": 2000.0, "EUR": 1800.0 }),
                _ => json!({ "USD": 0.5, "EUR": 0.45 }),
            };
            Ok(parse_rate_response(&body, currency, include_usd)?)
        }
    }

    fn controller(include_usd: bool) -> (Arc<FakeRates>, Arc<CurrencyRateController>) {
        let source = Arc::new(FakeRates::default());
        let config = CurrencyRateConfig {
            include_usd_rate: include_usd,
            ..Default::default()
        };
        let controller = Arc::new(CurrencyRateController::new(source.clone(), &config));
        (source, controller)
    }

    #[test]
    fn test_rate_url() {
        let base = "https://min-api.cryptocompare.com/data/price";
        assert_eq!(
            rate_url(base, "eur", "eth", true),
            "https://min-api.cryptocompare.com/data/price?fsym=ETH&tsyms=EUR,USD"
        );
        assert_eq!(rate_url(base, "usd", "ETH", true), format!("{base}?fsym=ETH&tsyms=USD"));
        assert_eq!(rate_url(base, "eur", "ETH", false), format!("{base}?fsym=ETH&tsyms=EUR"));
    }

    #[test]
    fn test_parse_rate_response() {
        let rate = parse_rate_response(&json!({ "EUR": 1800.5, "USD": 2000 }), "eur", true).unwrap();
        assert_eq!(rate.conversion_rate, 1800.5);
        assert_eq!(rate.usd_conversion_rate, Some(2000.0));

        let rate = parse_rate_response(&json!({ "USD": 2000 }), "usd", true).unwrap();
        assert_eq!(rate.usd_conversion_rate, Some(2000.0));

        let err = parse_rate_response(&json!({ "Response": "Error" }), "eur", false).unwrap_err();
        assert!(err.to_string().contains("Invalid response for EUR"));
        assert!(parse_rate_response(&json!({ "EUR": "abc" }), "eur", false).is_err());
    }

    #[tokio::test]
    async fn test_update_publishes_rate() {
        let (_, controller) = controller(false);
        let mut rx = controller.subscribe();
        controller.update_exchange_rate().await.unwrap();

        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.conversion_rate, Some(2000.0));
        assert_eq!(state.usd_conversion_rate, None);
        assert_eq!(state.current_currency, "usd");
        assert!(state.conversion_date.is_some());
    }

    #[tokio::test]
    async fn test_set_current_currency_commits_pending() {
        let (_, controller) = controller(true);
        controller.set_current_currency("eur").await.unwrap();

        let state = controller.state();
        assert_eq!(state.current_currency, "eur");
        assert_eq!(state.pending_current_currency, None);
        assert_eq!(state.conversion_rate, Some(1800.0));
        assert_eq!(state.usd_conversion_rate, Some(2000.0));

        controller.set_native_currency("MATIC").await.unwrap();
        let state = controller.state();
        assert_eq!(state.native_currency, "MATIC");
        assert_eq!(state.conversion_rate, Some(0.45));
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_state() {
        let (source, controller) = controller(false);
        controller.update_exchange_rate().await.unwrap();
        let before = controller.state();

        source.fail.store(true, Ordering::SeqCst);
        assert!(controller.set_current_currency("eur").await.is_err());

        let after = controller.state();
        assert_eq!(after.conversion_rate, before.conversion_rate);
        assert_eq!(after.current_currency, "usd");
        assert_eq!(after.pending_current_currency.as_deref(), Some("eur"));

        source.fail.store(false, Ordering::SeqCst);
        controller.update_exchange_rate().await.unwrap();
        assert_eq!(controller.state().current_currency, "eur");
    }

    #[tokio::test]
    async fn test_disabled_does_not_fetch() {
        let (source, controller) = controller(false);
        controller.set_disabled(true);
        controller.update_exchange_rate().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.state().conversion_rate, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling() {
        let (source, controller) = controller(false);
        controller.set_interval(Duration::from_secs(60)).await;
        controller.start().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        controller.stop().await;
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_retries_next_interval() {
        let (source, controller) = controller(false);
        source.fail.store(true, Ordering::SeqCst);
        controller.set_interval(Duration::from_secs(60)).await;
        controller.start().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(controller.state().conversion_rate, None);

        source.fail.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(controller.state().conversion_rate, Some(2000.0));
        controller.stop().await;
    }
}
