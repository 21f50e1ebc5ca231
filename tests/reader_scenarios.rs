//! End-to-end reader behaviour against a scripted chain.

use std::sync::Arc;
use std::time::Duration;

use podping_relay::config::{PoolConfig, ReadMode};
use podping_relay::events::{EventDispatcher, HandlerError};
use podping_relay::reader::{ChainReader, ReaderState, StartFrom};
use podping_relay::{NodePool, NodeRpc, PodpingError};

mod common;
use common::*;

fn reader(
    node: &Arc<ScriptedNode>,
    nodes: &[&str],
    dispatcher: Arc<EventDispatcher>,
) -> Arc<ChainReader> {
    let rpc: Arc<dyn NodeRpc> = node.clone();
    let reader = ChainReader::new(pool(nodes), rpc, dispatcher, reader_config());
    Arc::new(reader.with_retry_policy(fast_retry(4)))
}

fn dispatcher() -> Arc<EventDispatcher> {
    Arc::new(EventDispatcher::new(Duration::from_secs(1)))
}

/// Run until the cursor reaches `target`, then stop and return the final cursor.
async fn run_to(
    reader: &Arc<ChainReader>,
    start: StartFrom,
    target: u64,
) -> Result<u64, PodpingError> {
    let handle = reader.handle();
    let task = {
        let reader = reader.clone();
        tokio::spawn(async move { reader.run(start).await })
    };

    let reached = wait_for(Duration::from_secs(5), || {
        let reached = handle.cursor().is_some_and(|c| c >= target);
        let halted = !handle.is_running() && handle.cursor().is_some();
        reached || halted
    })
    .await;
    assert!(reached, "reader never reached block {}", target);

    handle.stop();
    task.await.expect("reader task panicked")
}

#[tokio::test]
async fn test_three_blocks_deliver_in_order() {
    let node = ScriptedNode::new();
    node.set_frontier(1002, 1002);
    node.add_block(1000, block(1000, vec![vec![vote_op()]]));
    node.add_block(
        1001,
        block(
            1001,
            vec![
                vec![vote_op(), podping_op("podping.aaa", &["https://a.example/feed.xml"])],
                vec![podping_op("podping.bbb", &["https://b.example/feed.xml"])],
            ],
        ),
    );
    node.add_notification(1002, "podping.aaa", &["https://c.example/feed.xml"]);

    let dispatcher = dispatcher();
    let events = collect_events(&dispatcher);
    let reader = reader(&node, &[NODE_A], dispatcher);

    let cursor = run_to(&reader, StartFrom::Block(1000), 1003).await.unwrap();

    assert_eq!(cursor, 1003);
    let events = events.lock().unwrap().clone();
    let positions: Vec<(u64, u32)> = events.iter().map(|e| e.position()).collect();
    assert_eq!(positions, vec![(1001, 1), (1001, 2), (1002, 0)]);
    assert_eq!(events[0].urls, vec!["https://a.example/feed.xml".to_string()]);
    assert_eq!(events[1].account, "podping.bbb");
    assert_ne!(events[0].transaction_id, events[1].transaction_id);

    let stats = reader.handle().stats();
    assert_eq!(stats.blocks_processed, 3);
    assert_eq!(stats.events_delivered, 3);
    assert_eq!(reader.handle().state(), ReaderState::Stopped);
}

#[tokio::test]
async fn test_malformed_operations_do_not_interrupt_block() {
    let node = ScriptedNode::new();
    node.set_frontier(501, 501);
    node.add_block(
        500,
        block(
            500,
            vec![vec![
                garbled_op(),
                podping_op("podping.aaa", &["https://a.example/1.xml"]),
                podping_op("podping.aaa", &["not a url"]),
                podping_op("podping.aaa", &["https://a.example/2.xml"]),
            ]],
        ),
    );
    node.add_notification(501, "podping.aaa", &["https://a.example/3.xml"]);

    let dispatcher = dispatcher();
    let events = collect_events(&dispatcher);
    let reader = reader(&node, &[NODE_A], dispatcher);

    run_to(&reader, StartFrom::Block(500), 502).await.unwrap();

    let urls: Vec<String> = events.lock().unwrap().iter().flat_map(|e| e.urls.clone()).collect();
    assert_eq!(
        urls,
        vec!["https://a.example/1.xml", "https://a.example/2.xml", "https://a.example/3.xml"]
    );
}

#[tokio::test]
async fn test_reads_fail_over_to_other_node() {
    let node = ScriptedNode::new();
    node.set_frontier(10, 10);
    node.add_notification(10, "podping.aaa", &["https://a.example/feed.xml"]);
    node.fail(NODE_A, 1);

    let dispatcher = dispatcher();
    let events = collect_events(&dispatcher);
    let reader = reader(&node, &[NODE_A, NODE_B], dispatcher);

    let cursor = run_to(&reader, StartFrom::Block(10), 11).await.unwrap();

    assert_eq!(cursor, 11);
    assert_eq!(events.lock().unwrap().len(), 1);
    assert!(node.calls_to("get_block").iter().all(|n| n == "https://b.example/"));
}

#[tokio::test]
async fn test_missing_block_is_retried_on_other_nodes() {
    let node = ScriptedNode::new();
    // The frontier claims block 20 exists but no node serves it.
    node.set_frontier(20, 20);

    let dispatcher = dispatcher();
    let events = collect_events(&dispatcher);
    let reader = reader(&node, &[NODE_A, NODE_B], dispatcher);

    let err = reader.run(StartFrom::Block(20)).await.unwrap_err();

    assert!(matches!(err, PodpingError::Connection { .. }));
    assert_eq!(reader.handle().cursor(), Some(20));
    assert!(events.lock().unwrap().is_empty());
    let fetched_from = node.calls_to("get_block");
    assert_eq!(fetched_from.len(), 4);
    assert!(fetched_from.contains(&"https://a.example/".to_string()));
    assert!(fetched_from.contains(&"https://b.example/".to_string()));
}

#[tokio::test]
async fn test_pool_exhaustion_halts_reader() {
    let node = ScriptedNode::new();
    node.set_frontier(100, 100);
    node.fail_always(NODE_A);

    let dispatcher = dispatcher();
    let events = collect_events(&dispatcher);
    let reader = reader(&node, &[NODE_A], dispatcher);

    let err = reader.run(StartFrom::Block(100)).await.unwrap_err();

    match err {
        PodpingError::Connection { node, .. } => {
            assert_eq!(node.as_deref(), Some("https://a.example/"))
        }
        other => panic!("expected connection error, got {}", other),
    }
    assert_eq!(reader.handle().state(), ReaderState::Stopped);
    assert_eq!(reader.handle().cursor(), Some(100));
    assert!(events.lock().unwrap().is_empty());
    assert_eq!(node.calls_to("chain_properties").len(), 4);
}

#[tokio::test]
async fn test_failing_subscriber_does_not_stop_delivery() {
    let node = ScriptedNode::new();
    node.set_frontier(7, 7);
    node.add_notification(6, "podping.aaa", &["https://a.example/6.xml"]);
    node.add_notification(7, "podping.aaa", &["https://a.example/7.xml"]);

    let dispatcher = dispatcher();
    dispatcher.subscribe_fn("broken", |_event| async { Err(HandlerError::from("database down")) });
    let events = collect_events(&dispatcher);
    let reader = reader(&node, &[NODE_A], dispatcher);

    run_to(&reader, StartFrom::Block(6), 8).await.unwrap();

    assert_eq!(events.lock().unwrap().len(), 2);
    assert_eq!(reader.handle().stats().events_delivered, 2);
}

#[tokio::test]
async fn test_start_from_head_skips_backlog() {
    let node = ScriptedNode::new();
    node.set_frontier(2010, 2000);
    node.add_notification(1999, "podping.old", &["https://old.example/"]);
    node.add_notification(2000, "podping.new", &["https://new.example/"]);

    let dispatcher = dispatcher();
    let events = collect_events(&dispatcher);
    let reader = reader(&node, &[NODE_A], dispatcher);

    run_to(&reader, StartFrom::Head, 2001).await.unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].account, "podping.new");
    assert!(!node.calls_to("get_block").is_empty());
}

#[tokio::test]
async fn test_head_mode_reads_past_irreversible() {
    let node = ScriptedNode::new();
    node.set_frontier(3005, 3000);
    node.add_notification(3005, "podping.aaa", &["https://a.example/"]);

    let dispatcher = dispatcher();
    let events = collect_events(&dispatcher);
    let mut config = reader_config();
    config.read_mode = ReadMode::Head;
    let rpc: Arc<dyn NodeRpc> = node.clone();
    let reader = ChainReader::new(pool(&[NODE_A]), rpc, dispatcher, config);
    let reader = Arc::new(reader.with_retry_policy(fast_retry(2)));

    run_to(&reader, StartFrom::Block(3005), 3006).await.unwrap();

    assert_eq!(events.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_waits_for_chain_to_advance() {
    let node = ScriptedNode::new();
    node.set_frontier(41, 41);

    let dispatcher = dispatcher();
    let events = collect_events(&dispatcher);
    let reader = reader(&node, &[NODE_A], dispatcher);
    let handle = reader.handle();

    let task = {
        let reader = reader.clone();
        tokio::spawn(async move { reader.run(StartFrom::Block(42)).await })
    };

    let polled = wait_for(Duration::from_secs(2), || node.calls_to("chain_properties").len() >= 3);
    assert!(polled.await);
    assert!(node.calls_to("get_block").is_empty());
    assert_eq!(handle.cursor(), Some(42));

    node.add_notification(42, "podping.aaa", &["https://a.example/"]);
    node.set_frontier(42, 42);

    assert!(wait_for(Duration::from_secs(2), || events.lock().unwrap().len() == 1).await);
    handle.stop();
    assert_eq!(task.await.unwrap().unwrap(), 43);
}

#[tokio::test]
async fn test_stop_while_waiting_is_prompt() {
    let node = ScriptedNode::new();
    node.set_frontier(1, 1);

    let rpc: Arc<dyn NodeRpc> = node.clone();
    let mut config = reader_config();
    config.poll_interval_ms = 60_000;
    let reader = Arc::new(ChainReader::new(pool(&[NODE_A]), rpc, dispatcher(), config));
    let handle = reader.handle();

    let task = {
        let reader = reader.clone();
        tokio::spawn(async move { reader.run(StartFrom::Block(5)).await })
    };
    let polling = wait_for(Duration::from_secs(2), || {
        handle.state() == ReaderState::Polling && !node.calls_to("chain_properties").is_empty()
    })
    .await;
    assert!(polling);

    handle.stop();
    let cursor = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("stop was not observed during the poll sleep")
        .unwrap()
        .unwrap();
    assert_eq!(cursor, 5);
    assert_eq!(handle.state(), ReaderState::Stopped);
}

#[tokio::test]
async fn test_stop_right_after_spawn_is_not_lost() {
    let node = ScriptedNode::new();
    node.set_frontier(1, 1);

    let reader = reader(&node, &[NODE_A], dispatcher());
    let handle = reader.handle();

    let task = {
        let reader = reader.clone();
        tokio::spawn(async move { reader.run(StartFrom::Block(5)).await })
    };
    handle.stop();

    let cursor = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("stop issued before the run was polled was ignored")
        .unwrap()
        .unwrap();
    assert_eq!(cursor, 5);
    assert_eq!(handle.state(), ReaderState::Stopped);
    assert!(!handle.is_running());
}

#[tokio::test]
async fn test_stop_while_pool_cools_down_is_prompt() {
    let node = ScriptedNode::new();
    node.set_frontier(1, 1);
    node.fail_always(NODE_A);

    let config = PoolConfig {
        failure_threshold: 0,
        cooldown_base_ms: 10_000,
        cooldown_max_ms: 60_000,
    };
    let pool = Arc::new(NodePool::new(&[NODE_A.to_string()], config).unwrap());
    let rpc: Arc<dyn NodeRpc> = node.clone();
    let reader = ChainReader::new(pool, rpc, dispatcher(), reader_config());
    let reader = Arc::new(reader.with_retry_policy(fast_retry(10)));
    let handle = reader.handle();

    let task = {
        let reader = reader.clone();
        tokio::spawn(async move { reader.run(StartFrom::Block(5)).await })
    };
    let polled = wait_for(Duration::from_secs(2), || !node.calls_to("chain_properties").is_empty());
    assert!(polled.await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    handle.stop();
    let cursor = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("stop was not observed while the pool was cooling down")
        .unwrap()
        .unwrap();
    assert_eq!(cursor, 5);
    assert_eq!(node.calls_to("chain_properties").len(), 1);
    assert_eq!(handle.state(), ReaderState::Stopped);
}

#[tokio::test]
async fn test_second_run_is_rejected() {
    let node = ScriptedNode::new();
    node.set_frontier(1, 1);

    let rpc: Arc<dyn NodeRpc> = node.clone();
    let reader = Arc::new(ChainReader::new(pool(&[NODE_A]), rpc, dispatcher(), reader_config()));
    let handle = reader.handle();

    let task = {
        let reader = reader.clone();
        tokio::spawn(async move { reader.run(StartFrom::Block(10)).await })
    };
    assert!(wait_for(Duration::from_secs(2), || handle.is_running()).await);

    let err = reader.run(StartFrom::Block(10)).await.unwrap_err();
    assert_eq!(err, PodpingError::Validation("reader is already running".into()));

    handle.stop();
    task.await.unwrap().unwrap();

    // A stopped reader can be started again.
    node.add_block(10, block(10, vec![]));
    node.set_frontier(10, 10);
    let cursor = run_to(&reader, StartFrom::Block(10), 11).await.unwrap();
    assert_eq!(cursor, 11);
}
