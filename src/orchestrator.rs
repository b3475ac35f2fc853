use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::checker::{AuthoritativeChecker, CheckStatus};
use crate::dedup::DedupCache;
use crate::dns::name::fqdn;
use crate::dns::types::RecordType;
use crate::executor::{AnswerPolicy, QueryExecutor};
use crate::report::{indent, DomainReport, RunSummary};
use crate::server_resolver::ServerResolver;
use crate::transport::Query;
use crate::walker::{DelegationWalker, WalkBoundary};

/// Runs the full check for each domain against every local resolver.
///
/// Best effort: a failure at any step is logged and counted, and the
/// remaining resolvers, name servers and addresses are still checked.
pub struct RunOrchestrator {
    executor: Arc<QueryExecutor>,
    walker: DelegationWalker,
    server_resolver: ServerResolver,
    checker: AuthoritativeChecker,
    resolvers: Vec<SocketAddr>,
    authoritative_port: u16,
    dedup: DedupCache,
    summary: RunSummary,
}

impl RunOrchestrator {
    pub fn new(
        executor: Arc<QueryExecutor>,
        resolvers: Vec<SocketAddr>,
        authoritative_port: u16,
        boundary: WalkBoundary,
    ) -> Self {
        Self {
            walker: DelegationWalker::new(executor.clone(), boundary),
            server_resolver: ServerResolver::new(executor.clone()),
            checker: AuthoritativeChecker::new(executor.clone()),
            executor,
            resolvers,
            authoritative_port,
            dedup: DedupCache::new(),
            summary: RunSummary::new(),
        }
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    #[cfg(test)]
    pub fn dedup(&self) -> &DedupCache {
        &self.dedup
    }

    pub async fn check(&self, domain: &str) -> DomainReport {
        let name = fqdn(domain);
        info!("Checking {}", name);

        let mut report = DomainReport { domain: name.clone(), ..Default::default() };
        for &resolver in &self.resolvers {
            self.local_lookup(&name, resolver, &mut report).await;
            self.check_delegation(&name, resolver, &mut report).await;
        }

        self.summary.record(&report);
        info!("{}", report);
        report
    }

    /// What the local resolver itself says, for comparison in the log
    async fn local_lookup(&self, name: &str, resolver: SocketAddr, report: &mut DomainReport) {
        info!("{}Looking up {} using local server {}", indent(1), name, resolver);
        report.local_lookups += 1;

        let query = Query::new(name, RecordType::A, true);
        match self.executor.execute(resolver, &query, AnswerPolicy::REQUIRE_ANSWER, 2).await {
            Ok(records) => {
                for record in &records {
                    info!("{}Got response {}", indent(2), record);
                }
            }
            Err(e) => {
                warn!("{}Error looking up {} against {}: {}", indent(2), name, resolver, e);
                report.failures += 1;
            }
        }
    }

    async fn check_delegation(&self, name: &str, resolver: SocketAddr, report: &mut DomainReport) {
        let delegation = match self.walker.find_authoritative_servers(name, resolver).await {
            Ok(delegation) => delegation,
            Err(e) => {
                warn!("{}Error looking up name servers for {} against {}: {}", indent(1), name, resolver, e);
                report.failures += 1;
                return;
            }
        };
        report.delegations_found += 1;
        if delegation.zone != name {
            info!("{}Name servers for {} come from {}", indent(1), name, delegation.zone);
        }

        for ns in &delegation.name_servers {
            info!("{}Got response {}", indent(2), ns);
            report.ns_address_lookups += 1;
            let addrs = match self.server_resolver.resolve_addresses(ns, resolver).await {
                Ok(addrs) => addrs,
                Err(_) => {
                    report.failures += 1;
                    continue;
                }
            };

            for ip in addrs {
                info!("{}Got response {}", indent(3), ip);
                let server = SocketAddr::new(ip, self.authoritative_port);
                match self.checker.check_authoritative(name, server, &self.dedup).await {
                    CheckStatus::Skipped => report.skipped += 1,
                    status => {
                        report.direct_queries += 1;
                        if status.is_failure() {
                            report.failures += 1;
                        }
                    }
                }
            }
        }
    }
}
