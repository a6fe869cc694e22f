use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, trace};
use url::Url;

use super::error::{RpcError, RpcTarget};
use super::types::{BlockResult, JsonRpcRequest, JsonRpcResponse, StatusResult, TxResult};
use super::RpcClient;
use crate::types::{Block, Transaction};

/// tm2 JSON-RPC over HTTP POST.
pub struct HttpRpcClient {
    client: reqwest::Client,
    url: Url,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| RpcError::Transport {
            target: RpcTarget::Health,
            message: format!("failed to build http client: {e}"),
        })?;
        Ok(Self { client, url, next_id: AtomicU64::new(1) })
    }

    async fn call<P, R>(&self, method: &str, params: P, target: RpcTarget) -> Result<R, RpcError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest { jsonrpc: "2.0", id, method, params };
        trace!(id, method, %target, "Sending RPC request");

        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::from_reqwest(target.clone(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::Transport { target, message: format!("http status {status}: {body}") });
        }

        let body: JsonRpcResponse<R> =
            response.json().await.map_err(|e| RpcError::from_reqwest(target.clone(), e))?;

        if let Some(error) = body.error {
            debug!(id, method, %target, code = error.code, "Node returned an error");
            return Err(RpcError::Node { target, code: error.code, message: error.describe() });
        }
        body.result.ok_or_else(|| RpcError::InvalidResponse { target, message: "response has no result".into() })
    }
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    async fn get_block(&self, height: u64) -> Result<Block, RpcError> {
        let target = RpcTarget::Height(height);
        let result: BlockResult = self.call("block", json!({ "height": height.to_string() }), target).await?;
        result.into_block(height)
    }

    async fn get_tx(&self, hash: &str) -> Result<Transaction, RpcError> {
        let target = RpcTarget::Hash(hash.to_string());
        let result: TxResult = self.call("tx", json!({ "hash": hash }), target).await?;
        result.into_transaction()
    }

    async fn get_latest_block_height(&self) -> Result<u64, RpcError> {
        let result: StatusResult = self.call("status", json!({}), RpcTarget::Latest).await?;
        Ok(result.sync_info.latest_block_height)
    }

    async fn health(&self) -> Result<(), RpcError> {
        let _: serde_json::Value = self.call("health", json!({}), RpcTarget::Health).await?;
        Ok(())
    }
}
