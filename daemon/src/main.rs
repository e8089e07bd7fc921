//! wotcrawl: crawl the node network of a currency.

mod commands;
mod shutdown;

use std::path::PathBuf;

use clap::Parser;
use wotcrawl_network::CrawlerConfig;
use wotcrawl_utils::LogFormat;

#[derive(Parser)]
#[command(name = "wotcrawl", version, about = "Crawler for the node network of a currency")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "WOTCRAWL_CONFIG")]
    config: Option<PathBuf>,

    /// Currency to crawl.
    #[arg(long, env = "WOTCRAWL_CURRENCY")]
    currency: Option<String>,

    /// Root nodes (comma-separated: "g1.example.org:443,BMAS g1.other.org 443").
    #[arg(long, env = "WOTCRAWL_ROOT_NODES", value_delimiter = ',')]
    root_nodes: Vec<String>,

    /// Seconds between two node refreshes.
    #[arg(long, env = "WOTCRAWL_CRAWL_INTERVAL")]
    crawl_interval: Option<u64>,

    /// Seconds an unreachable node is kept before it is dropped.
    #[arg(long, env = "WOTCRAWL_EVICTION_TIMEOUT")]
    eviction_timeout: Option<u64>,

    /// File where known nodes are kept between runs.
    #[arg(long, env = "WOTCRAWL_NODES_FILE")]
    nodes_file: Option<PathBuf>,

    /// HTTP proxy for node requests.
    #[arg(long, env = "WOTCRAWL_PROXY")]
    proxy: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "WOTCRAWL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "WOTCRAWL_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Crawl and inspect nodes.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// Print the effective configuration as TOML.
    #[command(name = "config")]
    Config,
}

#[derive(clap::Subcommand)]
enum NodeAction {
    /// Crawl until interrupted, then save the known nodes.
    Run,
    /// Print the nodes saved by the last run.
    List,
}

impl Cli {
    /// Load the configuration file if any, then apply CLI overrides.
    fn crawler_config(&self) -> anyhow::Result<CrawlerConfig> {
        let mut config = match &self.config {
            Some(path) => CrawlerConfig::from_toml_file(&path.to_string_lossy())?,
            None => CrawlerConfig::default(),
        };
        if let Some(currency) = &self.currency {
            config.currency = currency.clone();
        }
        if !self.root_nodes.is_empty() {
            config.root_nodes = self.root_nodes.clone();
        }
        if let Some(secs) = self.crawl_interval {
            config.crawl_interval_secs = secs;
        }
        if let Some(secs) = self.eviction_timeout {
            config.eviction_timeout_secs = secs;
        }
        if let Some(path) = &self.nodes_file {
            config.nodes_file = path.clone();
        }
        if self.proxy.is_some() {
            config.proxy = self.proxy.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.crawler_config()?;
    let format: LogFormat = config.log_format.parse()?;
    wotcrawl_utils::init_logging(format, &config.log_level);

    match cli.command {
        Command::Node { action } => match action {
            NodeAction::Run => commands::run(config).await?,
            NodeAction::List => commands::list(&config)?,
        },
        Command::Config => print!("{}", config.to_toml_string()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("wotcrawl").chain(args.iter().copied()))
            .expect("valid arguments")
    }

    #[test]
    fn defaults_without_file_or_flags() {
        let config = parse(&["node", "run"]).crawler_config().unwrap();
        assert_eq!(config.currency, "g1");
        assert_eq!(config.crawl_interval_secs, 15);
        assert!(config.root_nodes.is_empty());
    }

    #[test]
    fn flags_override_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "currency = \"g1-test\"\nroot_nodes = [\"a.example.org:443\"]\ncrawl_interval_secs = 30"
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let cli = parse(&[
            "--config",
            &path,
            "--root-nodes",
            "b.example.org:443,c.example.org:80",
            "--log-format",
            "json",
            "node",
            "list",
        ]);
        let config = cli.crawler_config().unwrap();
        assert_eq!(config.currency, "g1-test");
        assert_eq!(config.crawl_interval_secs, 30);
        assert_eq!(config.root_nodes, vec!["b.example.org:443", "c.example.org:80"]);
        assert_eq!(config.log_format, "json");
    }

    #[test]
    fn unreadable_config_file_is_an_error() {
        let cli = parse(&["--config", "/nonexistent/wotcrawl.toml", "config"]);
        assert!(cli.crawler_config().is_err());
    }
}
