//! HTTP JSON-RPC implementation of the chain client.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use giftscan_core::{EventFilter, ScanError};

use crate::client::{parse_hex_u64, ChainClient, RawLog};

/// JSON-RPC chain client over HTTP (`eth_blockNumber`,
/// `eth_getBlockByNumber`, `eth_getLogs`).
pub struct HttpChainClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpChainClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ScanError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: Value = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ScanError::Rpc(format!("{method}: {e}")))?
            .json()
            .await
            .map_err(|e| ScanError::Rpc(format!("{method}: bad response body: {e}")))?;

        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            return Err(ScanError::Rpc(format!("{method}: {error}")));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn latest_block_number(&self) -> Result<u64, ScanError> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| ScanError::Rpc("eth_blockNumber: non-string result".into()))?;
        parse_hex_u64(hex)
    }

    async fn block_timestamp(
        &self,
        block_number: u64,
    ) -> Result<Option<DateTime<Utc>>, ScanError> {
        let result = self
            .call(
                "eth_getBlockByNumber",
                json!([format!("0x{block_number:x}"), false]),
            )
            .await?;

        // Null result: block not mined yet or dropped by a shallow reorg.
        if result.is_null() {
            return Ok(None);
        }

        let hex = result["timestamp"]
            .as_str()
            .ok_or_else(|| ScanError::Rpc("eth_getBlockByNumber: missing timestamp".into()))?;
        let seconds = parse_hex_u64(hex)? as i64;
        Ok(DateTime::<Utc>::from_timestamp(seconds, 0))
    }

    async fn get_logs(
        &self,
        filter: &EventFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, ScanError> {
        let mut params = serde_json::Map::new();
        params.insert("fromBlock".into(), json!(format!("0x{from_block:x}")));
        params.insert("toBlock".into(), json!(format!("0x{to_block:x}")));
        if !filter.address.is_empty() {
            params.insert("address".into(), json!(filter.address));
        }
        if !filter.topic0.is_empty() {
            params.insert("topics".into(), json!([filter.topic0]));
        }

        let result = self.call("eth_getLogs", json!([params])).await?;
        serde_json::from_value(result)
            .map_err(|e| ScanError::Rpc(format!("eth_getLogs: bad log entry: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ids_are_monotonic() {
        let client = HttpChainClient::new("http://localhost:8545");
        let a = client.next_id.fetch_add(1, Ordering::Relaxed);
        let b = client.next_id.fetch_add(1, Ordering::Relaxed);
        assert!(b > a);
    }
}
