//! Currency conversion gateway client
//!
//! Fetches token exchange rates to USD. The gateway is externally owned
//! and may fail or return unusable rates; callers must treat a missing
//! token key or a non-positive value as failure. Rates are fetched fresh
//! per assignment, never cached here.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Source of token exchange rates. Engines depend on this trait so tests
/// can substitute deterministic or failing sources.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn get_exchange_rates(&self, tokens: &[String]) -> Result<HashMap<String, f64>>;
}

pub struct HttpRateGateway {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpRateGateway {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[derive(Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

#[async_trait]
impl RateSource for HttpRateGateway {
    async fn get_exchange_rates(&self, tokens: &[String]) -> Result<HashMap<String, f64>> {
        let url = format!(
            "{}/rates?tokens={}",
            self.base_url.trim_end_matches('/'),
            tokens.join(",")
        );
        debug!("Fetching exchange rates: {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("rate gateway returned {}", response.status());
        }

        let data: RatesResponse = response.json().await?;
        Ok(data.rates)
    }
}

/// Look up one token's rate in a gateway response, rejecting missing keys
/// and non-positive values.
pub fn usable_rate(rates: &HashMap<String, f64>, token: &str) -> Result<f64> {
    match rates.get(token) {
        Some(rate) if *rate > 0.0 => Ok(*rate),
        Some(rate) => anyhow::bail!("non-positive rate {} for token {}", rate, token),
        None => anyhow::bail!("no rate returned for token {}", token),
    }
}
