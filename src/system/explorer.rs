//! Block explorer contract-name lookup
//!
//! Deployed facets are named by asking an Etherscan-compatible explorer for
//! the verified source of their address. Requests share one token bucket so
//! bounded-parallel introspection stays under the explorer's rate limit.

use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use serde_json::Value;
use tracing::debug;

use satctl_core_interface::{ChainTarget, ContractNameResolver, ExternalError, Result};

/// Contract name from a `getsourcecode` response
pub fn contract_name_from_response(response: &Value) -> std::result::Result<String, String> {
    if response.get("status").and_then(Value::as_str) != Some("1") {
        let reason = response
            .get("result")
            .and_then(Value::as_str)
            .or_else(|| response.get("message").and_then(Value::as_str))
            .unwrap_or("unknown error");
        return Err(reason.to_string());
    }
    response
        .get("result")
        .and_then(|r| r.get(0))
        .and_then(|r| r.get("ContractName"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| "contract is not verified".to_string())
}

/// Etherscan v2 `getsourcecode` client
#[derive(Clone)]
pub struct ExplorerResolver {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    /// Chains whose explorer id differs from the chain id
    explorer_ids: BTreeMap<String, String>,
    limiter: Arc<GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl ExplorerResolver {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        requests_per_second: u32,
        explorer_ids: BTreeMap<String, String>,
    ) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            explorer_ids,
            limiter: Arc::new(GovernorRateLimiter::direct(Quota::per_second(rate))),
        }
    }

    fn explorer_chain_id<'a>(&'a self, chain: &'a ChainTarget) -> &'a str {
        self.explorer_ids
            .get(&chain.chain_id)
            .map(String::as_str)
            .unwrap_or(&chain.chain_id)
    }
}

#[async_trait]
impl ContractNameResolver for ExplorerResolver {
    async fn contract_name(&self, chain: &ChainTarget, address: Address) -> Result<String> {
        self.limiter.until_ready().await;

        let address = address.to_string();
        let chain_id = self.explorer_chain_id(chain);
        debug!(chain = %chain.chain_id, explorer_chain = chain_id, %address, "explorer lookup");

        let response: Value = self
            .client
            .get(&self.api_url)
            .query(&[
                ("chainid", chain_id),
                ("module", "contract"),
                ("action", "getsourcecode"),
                ("address", address.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ExternalError::Http(e.to_string()))?
            .json()
            .await
            .map_err(|e| ExternalError::Http(e.to_string()))?;

        contract_name_from_response(&response)
            .map_err(|reason| ExternalError::Lookup(format!("{} on {}: {}", address, chain.chain_id, reason)))
    }
}
