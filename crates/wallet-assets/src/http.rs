//! Timed JSON requests shared by the indexer, RPC and price clients.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{trace, warn};

use crate::error::FetchError;

/// GET `url` and parse the body as JSON, failing after `timeout`.
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, &str)],
    timeout: Duration,
) -> Result<T, FetchError> {
    let mut request = client.get(url);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    send(request, url, timeout).await
}

/// POST a JSON body to `url` and parse the JSON reply, failing after `timeout`.
pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
    timeout: Duration,
) -> Result<T, FetchError> {
    send(client.post(url).json(body), url, timeout).await
}

async fn send<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    url: &str,
    timeout: Duration,
) -> Result<T, FetchError> {
    let fut = async {
        let response = request.send().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        trace!(%url, len = body.len(), "response received");
        serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))
    };

    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(%url, timeout_secs = timeout.as_secs(), "request timeout");
            Err(FetchError::Timeout {
                url: url.to_string(),
                secs: timeout.as_secs(),
            })
        }
    }
}
