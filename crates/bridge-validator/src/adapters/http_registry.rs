//! HTTP registry source.
//!
//! `GET {base_url}/subnets/{netuid}/peers` returning a JSON array of
//! [`RegistryRecord`]s.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::domain::{BridgeError, BridgeResult, Netuid};
use crate::ports::{RegistryRecord, RegistrySource};

/// Registry source backed by a provider-network metadata endpoint.
pub struct HttpRegistrySource {
    client: Client,
    base_url: String,
}

impl HttpRegistrySource {
    /// Create a source; `timeout` bounds each request.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> BridgeResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Configuration(format!("registry client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn peers_url(&self, netuid: Netuid) -> String {
        format!("{}/subnets/{}/peers", self.base_url, netuid)
    }
}

#[async_trait]
impl RegistrySource for HttpRegistrySource {
    async fn fetch_peers(&self, netuid: Netuid) -> BridgeResult<Vec<RegistryRecord>> {
        let url = self.peers_url(netuid);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BridgeError::RegistryUnavailable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::RegistryUnavailable(format!(
                "{url}: HTTP {status}"
            )));
        }

        response
            .json::<Vec<RegistryRecord>>()
            .await
            .map_err(|e| BridgeError::RegistryUnavailable(format!("{url}: bad body: {e}")))
    }
}
