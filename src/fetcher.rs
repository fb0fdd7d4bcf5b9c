use std::time::Duration;

use anyhow::Result;
use log::*;
use reqwest::{header::AUTHORIZATION, Client};

use crate::{configs::node_config::PolkaholicConfig, models::chain::Chain};

/// Client of the Polkaholic chain registry.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ChainRegistry {
    pub fn new(config: &PolkaholicConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Fetches every chain the registry tracks.
    pub async fn fetch_chains(&self) -> Result<Vec<Chain>> {
        let uri = format!("{}/chains", self.base_url);

        info!("Fetching chains from {}", uri);

        let response = self
            .client
            .get(&uri)
            .query(&[("limit", "-1")])
            .header(AUTHORIZATION, &self.api_key)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;

        let chains = serde_json::from_str::<Vec<Chain>>(&body)?;

        info!("Fetched {} chains from the registry", chains.len());

        Ok(chains)
    }
}
