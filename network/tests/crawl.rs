mod common;

use std::time::Duration;

use common::{endpoint, node, pubkey, Fixture};
use tokio::time::Instant;
use wotcrawl_network::NetworkEvent;
use wotcrawl_protocol::Topic;

const HOUR: u64 = 3600;

#[tokio::test(start_paused = true)]
async fn crawl_refreshes_one_node_per_interval() {
    let f = Fixture::new(vec![node('A', 1), node('B', 2)]);
    f.script_healthy(1, 100, 'A');
    f.script_healthy(2, 100, 'A');
    let transport = f.transport.clone();
    let handle = f.network.crawl_handle();
    let mut network = f.network;
    let task = tokio::spawn(async move {
        network.discover_network().await;
        network
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(handle.is_crawling());
    assert_eq!(transport.subscribe_count(&endpoint(1), Topic::Block), 1);
    assert_eq!(transport.subscribe_count(&endpoint(2), Topic::Block), 0);

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(transport.subscribe_count(&endpoint(1), Topic::Block), 1);
    assert_eq!(transport.subscribe_count(&endpoint(2), Topic::Block), 1);

    handle.stop();
    let mut network = task.await.unwrap();
    assert!(!handle.is_crawling());
    assert_eq!(network.synced_nodes().len(), 2);
    assert_eq!(network.latest_block_number(), Some(100));

    let events = f.events.lock().clone();
    assert_eq!(
        events
            .iter()
            .filter(|e| **e == NetworkEvent::NewBlockMined(100))
            .count(),
        1
    );

    network.close().await;
    assert_eq!(transport.closed(), 2);
}

#[tokio::test(start_paused = true)]
async fn stopping_interrupts_the_pause() {
    let f = Fixture::new(vec![node('A', 1)]);
    f.script_healthy(1, 100, 'A');
    let handle = f.network.crawl_handle();
    let mut network = f.network;
    let task = tokio::spawn(async move {
        network.discover_network().await;
        network
    });
    tokio::time::sleep(Duration::from_secs(1)).await;

    let stopped_at = Instant::now();
    handle.stop();
    let network = task.await.unwrap();

    assert!(stopped_at.elapsed() < Duration::from_secs(1));
    assert!(!network.continue_crawling());
}

#[tokio::test(start_paused = true)]
async fn empty_network_idles_until_stopped() {
    let f = Fixture::new(Vec::new());
    let handle = f.network.crawl_handle();
    let mut network = f.network;
    let task = tokio::spawn(async move {
        network.discover_network().await;
        network
    });

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(handle.is_crawling());
    handle.stop();
    let network = task.await.unwrap();
    assert!(network.is_empty());
}

#[tokio::test(start_paused = true)]
async fn crawl_evicts_nodes_that_stay_unreachable() {
    let f = Fixture::new(vec![node('A', 1), node('B', 2)]);
    f.script_healthy(2, 100, 'A');
    let transport = f.transport.clone();
    let clock = f.clock.clone();
    let handle = f.network.crawl_handle();
    let mut network = f.network;
    let task = tokio::spawn(async move {
        network.discover_network().await;
        network
    });

    // A fails on its first refresh.
    tokio::time::sleep(Duration::from_secs(1)).await;
    clock.advance(HOUR);

    // B at 15s, then A again at 30s.
    tokio::time::sleep(Duration::from_secs(30)).await;
    handle.stop();
    let network = task.await.unwrap();

    assert!(network.node(&pubkey('A')).is_none());
    assert!(network.node(&pubkey('B')).is_some());
    assert_eq!(transport.closed(), 1);
}
