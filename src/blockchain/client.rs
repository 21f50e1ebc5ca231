//! Node RPC client.
//!
//! # Responsibilities
//! - Speak JSON-RPC 2.0 to a single Hive node per call
//! - Query chain state (frontier, blocks, resource credits)
//! - Broadcast signed transactions
//! - Map every transport failure into [`RpcError`]
//!
//! Failover is not handled here: callers pick the node through the pool.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

use crate::blockchain::transaction::{BroadcastReceipt, SignedTransaction};
use crate::blockchain::types::{ChainProperties, RcAccount, RpcError, RpcResult, SignedBlock};
use crate::config::TimeoutConfig;
use crate::resilience::timeouts::with_timeout;

/// The remote node surface the relay consumes.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Current head and last irreversible block numbers.
    async fn chain_properties(&self, node: &Url) -> RpcResult<ChainProperties>;

    /// Block `block_num`, or `None` if the node does not have it yet.
    async fn get_block(&self, node: &Url, block_num: u64) -> RpcResult<Option<SignedBlock>>;

    /// Resource-credit state of `account`, or `None` if it does not exist.
    async fn find_rc_account(&self, node: &Url, account: &str) -> RpcResult<Option<RcAccount>>;

    /// Submit a signed transaction and wait for its inclusion.
    async fn broadcast_transaction(
        &self,
        node: &Url,
        transaction: &SignedTransaction,
    ) -> RpcResult<BroadcastReceipt>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RcAccountsResult {
    #[serde(default)]
    rc_accounts: Vec<RcAccount>,
}

/// Decode a JSON-RPC response body into `T`.
///
/// A missing `result` is treated as `null`, so `Option<T>` targets decode to `None`.
fn parse_response<T: DeserializeOwned>(body: Value) -> RpcResult<T> {
    let response: RpcResponse =
        serde_json::from_value(body).map_err(|e| RpcError::Malformed(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(RpcError::Remote {
            code: error.code,
            message: error.message,
        });
    }

    serde_json::from_value(response.result.unwrap_or(Value::Null))
        .map_err(|e| RpcError::Malformed(e.to_string()))
}

/// JSON-RPC client for Hive nodes.
#[derive(Debug)]
pub struct HiveRpcClient {
    http: reqwest::Client,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl HiveRpcClient {
    /// Create a client with the given timeouts.
    pub fn new(timeouts: &TimeoutConfig) -> RpcResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .user_agent(concat!("podping-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RpcError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            request_timeout: Duration::from_secs(timeouts.request_secs),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        node: &Url,
        method: &str,
        params: Value,
    ) -> RpcResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        tracing::trace!(node = %node, method, id, "RPC request");

        let body = with_timeout(self.request_timeout, async {
            let response = self
                .http
                .post(node.clone())
                .json(&request)
                .send()
                .await
                .map_err(|e| RpcError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(RpcError::Transport(format!("HTTP {}", status)));
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| RpcError::Malformed(e.to_string()))
        })
        .await?;

        parse_response(body)
    }
}

#[async_trait]
impl NodeRpc for HiveRpcClient {
    async fn chain_properties(&self, node: &Url) -> RpcResult<ChainProperties> {
        self.call(node, "condenser_api.get_dynamic_global_properties", json!([]))
            .await
    }

    async fn get_block(&self, node: &Url, block_num: u64) -> RpcResult<Option<SignedBlock>> {
        self.call(node, "condenser_api.get_block", json!([block_num])).await
    }

    async fn find_rc_account(&self, node: &Url, account: &str) -> RpcResult<Option<RcAccount>> {
        let result: RcAccountsResult = self
            .call(node, "rc_api.find_rc_accounts", json!({ "accounts": [account] }))
            .await?;
        Ok(result.rc_accounts.into_iter().find(|rc| rc.account == account))
    }

    async fn broadcast_transaction(
        &self,
        node: &Url,
        transaction: &SignedTransaction,
    ) -> RpcResult<BroadcastReceipt> {
        self.call(
            node,
            "condenser_api.broadcast_transaction_synchronous",
            json!([transaction]),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_result() {
        let props: ChainProperties = parse_response(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "head_block_number": 1020,
                "last_irreversible_block_num": 1000,
                "time": "2024-05-01T12:00:03"
            }
        }))
        .unwrap();
        assert_eq!(props.head_block_number, 1020);
        assert_eq!(props.last_irreversible_block_num, 1000);
    }

    #[test]
    fn test_parse_null_block() {
        let block: Option<SignedBlock> =
            parse_response(json!({"jsonrpc": "2.0", "id": 1, "result": null})).unwrap();
        assert!(block.is_none());
    }

    #[test]
    fn test_parse_remote_error() {
        let result: RpcResult<Value> = parse_response(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32000, "message": "Assert Exception"}
        }));
        assert_eq!(
            result,
            Err(RpcError::Remote {
                code: -32000,
                message: "Assert Exception".into(),
            })
        );
    }

    #[test]
    fn test_parse_malformed() {
        let result: RpcResult<ChainProperties> =
            parse_response(json!({"jsonrpc": "2.0", "id": 1, "result": {"head": "x"}}));
        assert!(matches!(result, Err(RpcError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transport_error() {
        let client = HiveRpcClient::new(&TimeoutConfig {
            connect_secs: 1,
            request_secs: 2,
        })
        .unwrap();
        // Port 9 (discard) on localhost is expected to refuse connections.
        let node = Url::parse("http://127.0.0.1:9").unwrap();
        let result = client.chain_properties(&node).await;
        assert!(matches!(result, Err(RpcError::Transport(_)) | Err(RpcError::Timeout(_))));
    }
}
