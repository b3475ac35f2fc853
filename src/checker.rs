use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::dedup::DedupCache;
use crate::dns::types::RecordType;
use crate::executor::{AnswerPolicy, Outcome, QueryExecutor};
use crate::report::indent;
use crate::transport::Query;

/// What happened to one (name, authoritative server) check
#[derive(Debug)]
pub enum CheckStatus {
    /// Already asked earlier in this run
    Skipped,
    Queried(Outcome),
}

impl CheckStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, CheckStatus::Queried(Err(_)))
    }
}

/// Asks an authoritative server directly, without recursion
pub struct AuthoritativeChecker {
    executor: Arc<QueryExecutor>,
}

impl AuthoritativeChecker {
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }

    pub async fn check_authoritative(&self, name: &str, server: SocketAddr, dedup: &DedupCache) -> CheckStatus {
        // Mark before sending so a repeat never goes out, whatever this one returns
        if !dedup.mark(name, server) {
            info!("{}Skipping duplicate lookup A record for {} using server {}", indent(3), name, server);
            return CheckStatus::Skipped;
        }

        info!("{}Looking up A record for {} using server {}", indent(3), name, server);
        let query = Query::new(name, RecordType::A, false);
        let outcome = self.executor.execute(server, &query, AnswerPolicy::REQUIRE_ANSWER, 4).await;
        match &outcome {
            Ok(records) => {
                for record in records {
                    info!("{}Got response {}", indent(4), record);
                }
            }
            Err(e) => warn!("{}Error looking up {} against {}: {}", indent(4), name, server, e),
        }
        CheckStatus::Queried(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{QueryError, RetryPolicy};
    use crate::testing::{a, StubReply, StubTransport};

    fn ns1() -> SocketAddr {
        "203.0.113.1:53".parse().unwrap()
    }

    fn checker(stub: &Arc<StubTransport>) -> AuthoritativeChecker {
        AuthoritativeChecker::new(Arc::new(QueryExecutor::new(stub.clone(), RetryPolicy::default())))
    }

    #[tokio::test(start_paused = true)]
    async fn test_queries_without_recursion() {
        let stub = Arc::new(StubTransport::new());
        stub.script(ns1(), "example.com.", RecordType::A, vec![StubReply::Answer(vec![a("example.com.", "192.0.2.10")])]);
        let dedup = DedupCache::new();

        let status = checker(&stub).check_authoritative("example.com.", ns1(), &dedup).await;

        assert!(matches!(status, CheckStatus::Queried(Ok(ref r)) if r.len() == 1));
        assert!(!stub.calls()[0].query.recursion_desired);
        assert!(dedup.contains("example.com.", ns1()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_pair_is_never_queried_again() {
        let stub = Arc::new(StubTransport::new());
        stub.script(ns1(), "example.com.", RecordType::A, vec![StubReply::Answer(vec![a("example.com.", "192.0.2.10")])]);
        let dedup = DedupCache::new();
        let checker = checker(&stub);

        checker.check_authoritative("example.com.", ns1(), &dedup).await;
        let second = checker.check_authoritative("example.com.", ns1(), &dedup).await;

        assert!(matches!(second, CheckStatus::Skipped));
        assert!(!second.is_failure());
        assert_eq!(stub.calls_for(ns1(), "example.com."), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pair_is_still_marked() {
        let stub = Arc::new(StubTransport::new());
        stub.script(ns1(), "example.com.", RecordType::A, vec![StubReply::Timeout]);
        let dedup = DedupCache::new();
        let checker = checker(&stub);

        let first = checker.check_authoritative("example.com.", ns1(), &dedup).await;
        assert!(first.is_failure());
        assert!(matches!(first, CheckStatus::Queried(Err(QueryError::Transport(_)))));

        let second = checker.check_authoritative("example.com.", ns1(), &dedup).await;
        assert!(matches!(second, CheckStatus::Skipped));
        assert_eq!(stub.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_seeded_cache_blocks_exchange() {
        let stub = Arc::new(StubTransport::new());
        let dedup = DedupCache::new();
        dedup.mark("example.com.", ns1());

        let status = checker(&stub).check_authoritative("example.com.", ns1(), &dedup).await;
        assert!(matches!(status, CheckStatus::Skipped));
        assert_eq!(stub.call_count(), 0);
    }
}
