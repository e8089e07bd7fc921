//! `node run` and `node list`.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};

use wotcrawl_network::{CrawlerConfig, Network, NetworkEvent, Node, NodeConnector};
use wotcrawl_protocol::{BmaProvider, TransportProvider};
use wotcrawl_store::{JsonFileStore, NodeStore};
use wotcrawl_types::Timestamp;
use wotcrawl_utils::format_age;

use crate::shutdown;

/// Crawl until SIGINT/SIGTERM, then save every known node.
pub async fn run(config: CrawlerConfig) -> anyhow::Result<()> {
    let provider = Arc::new(BmaProvider::new(config.transport_settings()));
    let store = JsonFileStore::new(&config.nodes_file);
    let saved = store
        .load_nodes(&config.currency)
        .with_context(|| format!("cannot load {}", store.path().display()))?;

    let mut roots = Vec::new();
    for address in config.root_addresses()? {
        let transport = provider.open()?;
        match NodeConnector::from_address(
            &config.currency,
            address.secured,
            &address.host,
            address.port,
            transport,
        )
        .await
        {
            Ok(connector) => roots.push(connector),
            Err(e) => warn!(host = %address.host, port = address.port, error = %e, "root node unavailable"),
        }
    }
    if roots.is_empty() && saved.is_empty() {
        bail!("no reachable root node and no saved nodes for {}", config.currency);
    }

    let mut network = Network::new(&config.currency, provider, roots)?
        .with_settings(config.network_settings());
    network.merge_with_records(saved)?;
    network.subscribe(Box::new(|event: &NetworkEvent| match event {
        NetworkEvent::NodesChanged => {}
        NetworkEvent::NewBlockMined(number) => info!(number, "new block"),
        NetworkEvent::BlockchainRollback(number) => warn!(number, "rollback"),
    }));
    info!(
        currency = %config.currency,
        nodes = network.len(),
        roots = network.root_nodes().len(),
        "starting crawl"
    );

    let handle = network.crawl_handle();
    let crawl = tokio::spawn(async move {
        network.discover_network().await;
        network
    });

    let signal = shutdown::wait_for_signal()
        .await
        .context("cannot listen for shutdown signals")?;
    info!(signal, "stopping crawl");
    handle.stop();
    let mut network = crawl.await.context("crawl task failed")?;
    network.close().await;

    let records = network.to_records();
    store
        .save_nodes(&config.currency, &records)
        .with_context(|| format!("cannot save {}", store.path().display()))?;
    info!(
        nodes = records.len(),
        synced = network.synced_nodes().len(),
        quality = network.quality(),
        path = %store.path().display(),
        "known nodes saved"
    );
    Ok(())
}

/// Print the nodes saved for the configured currency.
pub fn list(config: &CrawlerConfig) -> anyhow::Result<()> {
    let store = JsonFileStore::new(&config.nodes_file);
    let nodes: Vec<Node> = store
        .load_nodes(&config.currency)
        .with_context(|| format!("cannot load {}", store.path().display()))?
        .into_iter()
        .map(Node::from)
        .collect();
    if nodes.is_empty() {
        println!("no saved node for {}", config.currency);
        return Ok(());
    }
    print!("{}", render_table(&nodes, Timestamp::now()));
    Ok(())
}

fn render_table(nodes: &[Node], now: Timestamp) -> String {
    let mut out = format!(
        "{:<10} {:<10} {:<10} {:<16} {:<16} {}\n",
        "STATE", "PUBKEY", "BLOCK", "SOFTWARE", "CHANGED", "ENDPOINT"
    );
    for node in nodes {
        let block = node
            .current_block
            .as_ref()
            .map(|b| format!("#{}", b.number))
            .unwrap_or_else(|| "-".into());
        let software = if node.software.is_empty() {
            "-".to_string()
        } else {
            format!("{} {}", node.software, node.version)
        };
        let endpoint = node
            .endpoints
            .first()
            .map(ToString::to_string)
            .unwrap_or_default();
        let root = if node.root { "*" } else { "" };
        let member = if node.member { "+" } else { "" };
        out.push_str(&format!(
            "{:<10} {:<10} {:<10} {:<16} {:<16} {}\n",
            node.state.as_str(),
            format!("{}{root}{member}", node.short_pubkey()),
            block,
            software,
            format_age(node.last_change.as_secs(), now.as_secs()),
            endpoint
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wotcrawl_types::{BlockHead, NodeState};

    #[test]
    fn table_shows_one_line_per_node() {
        let mut node = Node::new(
            "g1",
            "ABCDEFGH11111111111111111111111111111111111",
            vec!["BMAS g1.example.org 443".parse().unwrap()],
            Timestamp::new(1_000),
        );
        node.root = true;
        node.software = "duniter".into();
        node.version = "1.8.7".into();
        node.current_block = Some(BlockHead {
            number: 42,
            hash: "A".repeat(64),
            median_time: 0,
            time: 0,
            pow_min: 70,
            issuer: String::new(),
        });
        let mut other = node.clone();
        other.root = false;
        other.current_block = None;
        other.state = NodeState::Offline;
        other.member = true;

        let table = render_table(&[node, other], Timestamp::new(1_090));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("#42"));
        assert!(lines[1].contains("duniter 1.8.7"));
        assert!(lines[1].contains("1m 30s ago"));
        assert!(lines[1].contains("*"));
        assert!(!lines[1].contains("+"));
        assert!(lines[2].contains("ABCDE+"));
        assert!(lines[2].contains(NodeState::Offline.as_str()));
        assert!(lines[2].contains(" - "));
    }

    #[test]
    fn listing_an_empty_store_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let config = CrawlerConfig {
            nodes_file: dir.path().join("nodes.json"),
            ..CrawlerConfig::default()
        };
        assert!(list(&config).is_ok());
    }
}
