//! Shared fixtures for integration tests: a scripted in-memory node and a
//! recording signer.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use podping_relay::blockchain::types::{BlockTransaction, RcAccount, RcManabar};
use podping_relay::blockchain::{
    BroadcastReceipt, ChainProperties, NodeRpc, RpcError, RpcResult, SignedBlock, SignedTransaction,
    SignerError, TransactionSigner,
};
use podping_relay::config::{PoolConfig, ReaderConfig};
use podping_relay::events::{EventDispatcher, HandlerError, NotificationEvent};
use podping_relay::resilience::RetryPolicy;
use podping_relay::NodePool;

pub const NODE_A: &str = "https://a.example";
pub const NODE_B: &str = "https://b.example";
pub const NODE_C: &str = "https://c.example";

/// Hive answer to a transaction signed with the wrong key.
pub const MISSING_AUTHORITY: &str =
    "missing required posting authority: Missing Posting Authority podping.test";

#[derive(Default)]
struct NodeState {
    head: u64,
    irreversible: u64,
    blocks: HashMap<u64, SignedBlock>,
    /// Remaining scripted transport failures per node URL.
    failures: HashMap<String, u32>,
    /// Broadcasts that succeed before every further one fails.
    broadcast_budget: Option<usize>,
    reject_auth: bool,
    /// Accepted broadcasts whose reply is lost in transit.
    lost_replies: u32,
    rc_accounts: HashMap<String, RcAccount>,
    calls: Vec<(String, &'static str)>,
    broadcasts: Vec<(String, SignedTransaction)>,
}

/// In-memory chain behind every node URL, with per-node failure injection.
#[derive(Default)]
pub struct ScriptedNode {
    state: Mutex<NodeState>,
}

impl ScriptedNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_frontier(&self, head: u64, irreversible: u64) {
        let mut state = self.state.lock().unwrap();
        state.head = head;
        state.irreversible = irreversible;
    }

    pub fn add_block(&self, number: u64, block: SignedBlock) {
        self.state.lock().unwrap().blocks.insert(number, block);
    }

    /// Add a block holding one transaction with a single notification.
    pub fn add_notification(&self, number: u64, account: &str, urls: &[&str]) {
        self.add_block(number, block(number, vec![vec![podping_op(account, urls)]]));
    }

    /// Make the next `times` calls to `node` fail at the transport level.
    pub fn fail(&self, node: &str, times: u32) {
        self.state.lock().unwrap().failures.insert(key(node), times);
    }

    pub fn fail_always(&self, node: &str) {
        self.fail(node, u32::MAX);
    }

    /// Let `count` broadcasts succeed, then fail every later one.
    pub fn limit_broadcasts(&self, count: usize) {
        self.state.lock().unwrap().broadcast_budget = Some(count);
    }

    /// Accept the next `times` broadcasts but answer them with a timeout.
    pub fn lose_replies(&self, times: u32) {
        self.state.lock().unwrap().lost_replies = times;
    }

    pub fn reject_auth(&self) {
        self.state.lock().unwrap().reject_auth = true;
    }

    pub fn set_rc(&self, account: &str, current_mana: u64, max_rc: u64, last_update_time: i64) {
        self.state.lock().unwrap().rc_accounts.insert(
            account.to_string(),
            RcAccount {
                account: account.to_string(),
                rc_manabar: RcManabar {
                    current_mana,
                    last_update_time,
                },
                max_rc,
            },
        );
    }

    /// Every call received, as `(node, method)`.
    pub fn calls(&self) -> Vec<(String, &'static str)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(_, m)| *m == method)
            .map(|(node, _)| node)
            .collect()
    }

    /// Transactions that were accepted, with the node that accepted them.
    pub fn broadcasts(&self) -> Vec<(String, SignedTransaction)> {
        self.state.lock().unwrap().broadcasts.clone()
    }

    fn enter(&self, node: &Url, method: &'static str) -> RpcResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((node.to_string(), method));
        if let Some(remaining) = state.failures.get_mut(node.as_str()) {
            if *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                return Err(RpcError::Transport(format!("{} unreachable", node)));
            }
        }
        Ok(())
    }
}

fn key(node: &str) -> String {
    Url::parse(node).unwrap().to_string()
}

#[async_trait]
impl NodeRpc for ScriptedNode {
    async fn chain_properties(&self, node: &Url) -> RpcResult<ChainProperties> {
        self.enter(node, "chain_properties")?;
        let state = self.state.lock().unwrap();
        Ok(ChainProperties {
            head_block_number: state.head,
            last_irreversible_block_num: state.irreversible,
        })
    }

    async fn get_block(&self, node: &Url, block_num: u64) -> RpcResult<Option<SignedBlock>> {
        self.enter(node, "get_block")?;
        Ok(self.state.lock().unwrap().blocks.get(&block_num).cloned())
    }

    async fn find_rc_account(&self, node: &Url, account: &str) -> RpcResult<Option<RcAccount>> {
        self.enter(node, "find_rc_account")?;
        Ok(self.state.lock().unwrap().rc_accounts.get(account).cloned())
    }

    async fn broadcast_transaction(
        &self,
        node: &Url,
        transaction: &SignedTransaction,
    ) -> RpcResult<BroadcastReceipt> {
        self.enter(node, "broadcast_transaction")?;
        let mut state = self.state.lock().unwrap();

        if state.reject_auth {
            return Err(RpcError::Remote {
                code: -32000,
                message: MISSING_AUTHORITY.into(),
            });
        }
        if state.broadcast_budget.is_some_and(|budget| state.broadcasts.len() >= budget) {
            return Err(RpcError::Transport("connection reset".into()));
        }

        if state.broadcasts.iter().any(|(_, accepted)| accepted == transaction) {
            return Err(RpcError::Remote {
                code: -32003,
                message: "Duplicate transaction check failed".into(),
            });
        }

        state.broadcasts.push((node.to_string(), transaction.clone()));
        if state.lost_replies > 0 {
            state.lost_replies -= 1;
            return Err(RpcError::Timeout(30_000));
        }
        let n = state.broadcasts.len() as u64;
        Ok(BroadcastReceipt {
            id: format!("{:040x}", n),
            block_num: 5_000 + n,
            trx_num: 0,
            expired: false,
        })
    }
}

/// Signer that wraps operations unchanged and records every request.
#[derive(Default)]
pub struct RecordingSigner {
    requests: Mutex<Vec<(String, Vec<Value>)>>,
    reject: bool,
}

impl RecordingSigner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reject: true,
            ..Self::default()
        })
    }

    pub fn requests(&self) -> Vec<(String, Vec<Value>)> {
        self.requests.lock().unwrap().clone()
    }

    /// URLs carried by every signed payload, in signing order.
    pub fn signed_urls(&self) -> Vec<Vec<String>> {
        self.requests()
            .iter()
            .flat_map(|(_, ops)| ops.iter())
            .map(|op| {
                let payload: Value = serde_json::from_str(op[1]["json"].as_str().unwrap()).unwrap();
                payload["iris"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|u| u.as_str().unwrap().to_string())
                    .collect()
            })
            .collect()
    }
}

#[async_trait]
impl TransactionSigner for RecordingSigner {
    async fn sign(
        &self,
        account: &str,
        operations: &[Value],
    ) -> Result<SignedTransaction, SignerError> {
        self.requests.lock().unwrap().push((account.to_string(), operations.to_vec()));
        if self.reject {
            return Err(SignerError::Rejected("key does not match account".into()));
        }
        Ok(SignedTransaction(json!({
            "ref_block_num": 1,
            "ref_block_prefix": 2,
            "expiration": "2024-05-01T12:01:00",
            "operations": operations,
            "extensions": [],
            "signatures": ["1f00"],
        })))
    }
}

pub fn pool(nodes: &[&str]) -> Arc<NodePool> {
    let urls: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
    let config = PoolConfig {
        failure_threshold: 3,
        cooldown_base_ms: 5,
        cooldown_max_ms: 50,
    };
    Arc::new(NodePool::new(&urls, config).unwrap())
}

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay_ms: 1,
        max_delay_ms: 5,
    }
}

pub fn reader_config() -> ReaderConfig {
    ReaderConfig {
        poll_interval_ms: 10,
        handler_timeout_ms: 1_000,
        ..ReaderConfig::default()
    }
}

/// A `pp_podcast_update` operation carrying `urls`.
pub fn podping_op(account: &str, urls: &[&str]) -> Value {
    json!(["custom_json", {
        "required_auths": [],
        "required_posting_auths": [account],
        "id": "pp_podcast_update",
        "json": json!({
            "version": "1.1",
            "medium": "podcast",
            "reason": "update",
            "iris": urls,
            "timestampNs": 1_714_564_803_000_000_000u64,
            "sessionId": 7
        }).to_string(),
    }])
}

/// An operation from an unrelated application.
pub fn vote_op() -> Value {
    json!(["vote", {"voter": "alice", "author": "bob", "permlink": "post", "weight": 10000}])
}

/// Right id, broken payload.
pub fn garbled_op() -> Value {
    json!(["custom_json", {
        "required_auths": [],
        "required_posting_auths": ["podping.bad"],
        "id": "pp_podcast_update",
        "json": "{\"iris\": [\"https://x.example/feed.xml\""
    }])
}

/// A block whose transactions contain the given operations.
pub fn block(number: u64, transactions: Vec<Vec<Value>>) -> SignedBlock {
    let transaction_ids = (0..transactions.len())
        .map(|i| format!("{:08x}{:032x}", number, i))
        .collect();
    SignedBlock {
        timestamp: DateTime::from_timestamp(1_714_564_800 + number as i64 * 3, 0).unwrap(),
        transactions: transactions
            .into_iter()
            .map(|operations| BlockTransaction { operations })
            .collect(),
        transaction_ids,
    }
}

/// Subscribe a handler that stores every event it receives.
pub fn collect_events(dispatcher: &EventDispatcher) -> Arc<Mutex<Vec<NotificationEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    dispatcher.subscribe_fn("collector", move |event| {
        let sink = sink.clone();
        async move {
            sink.lock().unwrap().push(event);
            Ok::<(), HandlerError>(())
        }
    });
    events
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
