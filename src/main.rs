mod checker;
mod config;
mod dedup;
mod dns;
mod executor;
mod orchestrator;
mod report;
mod resolv_conf;
mod server_resolver;
mod transport;
mod walker;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::config::{parse_duration, Config};
use crate::executor::QueryExecutor;
use crate::orchestrator::RunOrchestrator;
use crate::resolv_conf::{local_resolvers, ResolvConf};
use crate::transport::UdpTransport;

/// Check that local resolvers and the authoritative name servers agree on a domain
#[derive(Parser, Debug)]
#[command(name = "delegation-check", version, about)]
struct Cli {
    /// Domains to check
    #[arg(required = true, value_name = "DOMAIN")]
    domains: Vec<String>,

    /// Extra local resolver (ip, ip:port or host name); repeatable
    #[arg(long = "ns", value_name = "SERVER")]
    nameservers: Vec<String>,

    /// Attempts per query
    #[arg(long)]
    retries: Option<u32>,

    /// Timeout per exchange, e.g. 5s or 500ms (rounded up to whole milliseconds)
    #[arg(long, value_parser = parse_duration)]
    timeout: Option<Duration>,

    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Where to read the local resolvers from
    #[arg(long, value_name = "PATH")]
    resolv_conf: Option<PathBuf>,

    /// Port used for resolv.conf resolvers and authoritative servers
    #[arg(long)]
    port: Option<u16>,

    /// Stop the NS walk before names with fewer labels than this
    #[arg(long)]
    min_labels: Option<usize>,

    /// Log every exchange
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Command-line values win over the config file
    fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.resolv_conf {
            config.resolv_conf = path.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(retries) = self.retries {
            config.query.retries = retries;
        }
        if let Some(timeout) = self.timeout {
            let millis = timeout.as_nanos().div_ceil(1_000_000);
            config.query.timeout_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        }
        if let Some(min_labels) = self.min_labels {
            config.walk.min_labels = min_labels;
        }
        config.nameservers.extend(self.nameservers.iter().cloned());
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "delegation_check=debug" } else { "delegation_check=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Config loaded from {}", path.display());
            config
        }
        None => Config::default(),
    };
    cli.apply(&mut config);

    let resolv = ResolvConf::load(&config.resolv_conf).context("Cannot initialize the local resolver")?;
    let settings = config.settings()?;
    let resolvers = local_resolvers(&resolv, &config.nameservers, settings.port)
        .await
        .with_context(|| format!("Nothing to query from {} or --ns", config.resolv_conf.display()))?;

    info!(
        "Checking {} domain(s) against {} local resolver(s), {} attempt(s), timeout {:?}, NS walk down to {} label(s)",
        cli.domains.len(),
        resolvers.len(),
        settings.retry.max_attempts,
        settings.timeout,
        settings.boundary.min_labels()
    );

    let transport = Arc::new(UdpTransport::new(settings.timeout));
    let executor = Arc::new(QueryExecutor::new(transport, settings.retry));
    let run = RunOrchestrator::new(executor, resolvers, settings.port, settings.boundary);

    for domain in &cli.domains {
        run.check(domain).await;
    }

    // Lookup failures are reported in the log, never through the exit code
    info!("{}", run.summary());
    Ok(())
}
