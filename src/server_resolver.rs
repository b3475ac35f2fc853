use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tracing::{info, warn};

use crate::dns::types::{RecordType, ResponseCode};
use crate::executor::{AnswerPolicy, QueryError, QueryExecutor};
use crate::report::indent;
use crate::transport::Query;

/// Looks up the addresses of a name server host through a local resolver
pub struct ServerResolver {
    executor: Arc<QueryExecutor>,
}

impl ServerResolver {
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Every A record for `hostname`. A host without addresses is an error.
    pub async fn resolve_addresses(&self, hostname: &str, resolver: SocketAddr) -> Result<Vec<IpAddr>, QueryError> {
        info!("{}Looking up A record for NS {} using local server {}", indent(2), hostname, resolver);
        let query = Query::new(hostname, RecordType::A, true);

        let records = match self.executor.execute(resolver, &query, AnswerPolicy::REQUIRE_ANSWER, 3).await {
            Ok(records) => records,
            Err(e) => {
                warn!("{}Error looking up {} against {}: {}", indent(3), hostname, resolver, e);
                return Err(e);
            }
        };

        // CNAME-only answers carry no address
        let addrs: Vec<IpAddr> = records.iter().filter_map(|r| r.ipv4()).map(IpAddr::V4).collect();
        if addrs.is_empty() {
            warn!("{}No A records for {} from {}", indent(3), hostname, resolver);
            return Err(QueryError::EmptyAnswer { rcode: ResponseCode::NoError });
        }
        Ok(addrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::types::{DnsClass, Record, RecordData};
    use crate::executor::RetryPolicy;
    use crate::testing::{a, StubReply, StubTransport};

    fn resolver() -> SocketAddr {
        "192.0.2.53:53".parse().unwrap()
    }

    fn server_resolver(stub: &Arc<StubTransport>) -> ServerResolver {
        ServerResolver::new(Arc::new(QueryExecutor::new(stub.clone(), RetryPolicy::default())))
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_every_address() {
        let stub = Arc::new(StubTransport::new());
        stub.script(
            resolver(),
            "ns1.example.com.",
            RecordType::A,
            vec![StubReply::Answer(vec![
                a("ns1.example.com.", "203.0.113.1"),
                a("ns1.example.com.", "203.0.113.11"),
            ])],
        );

        let addrs = server_resolver(&stub)
            .resolve_addresses("ns1.example.com.", resolver())
            .await
            .unwrap();

        assert_eq!(addrs, vec!["203.0.113.1".parse::<IpAddr>().unwrap(), "203.0.113.11".parse().unwrap()]);
        let call = &stub.calls()[0];
        assert!(call.query.recursion_desired);
        assert_eq!(call.query.qtype, RecordType::A);
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_without_address_is_reported() {
        let stub = Arc::new(StubTransport::new());
        let err = server_resolver(&stub)
            .resolve_addresses("ns1.example.com.", resolver())
            .await
            .unwrap_err();

        assert!(matches!(err, QueryError::EmptyAnswer { .. }));
        assert_eq!(stub.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cname_only_answer_has_no_address() {
        let stub = Arc::new(StubTransport::new());
        let cname = Record {
            name: "ns1.example.com.".into(),
            rtype: RecordType::CNAME,
            class: DnsClass::IN,
            ttl: 60,
            data: RecordData::Cname("elsewhere.example.net.".into()),
        };
        stub.script(resolver(), "ns1.example.com.", RecordType::A, vec![StubReply::Answer(vec![cname])]);

        let err = server_resolver(&stub)
            .resolve_addresses("ns1.example.com.", resolver())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::EmptyAnswer { rcode: ResponseCode::NoError }));
    }
}
