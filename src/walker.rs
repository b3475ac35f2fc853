use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::dns::name::{label_count, strip_leftmost_label};
use crate::dns::types::RecordType;
use crate::executor::{AnswerPolicy, QueryError, QueryExecutor};
use crate::report::indent;
use crate::transport::Query;

/// Where the upward walk gives up.
///
/// The walk always stops once the name is empty. With `min_labels = 2` it
/// also stops before querying a single-label name, which is right for `com`
/// but wrong for multi-label public suffixes: `example.co.uk` never gets
/// past `co.uk`. Known limitation, kept explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkBoundary {
    min_labels: usize,
}

impl WalkBoundary {
    /// Walk all the way to the TLD
    pub const TO_TLD: Self = Self { min_labels: 1 };
    /// Stop at bare two-label names
    pub const TWO_LABELS: Self = Self { min_labels: 2 };

    pub fn with_min_labels(min_labels: usize) -> Self {
        match min_labels {
            0 | 1 => Self::TO_TLD,
            2 => Self::TWO_LABELS,
            n => Self { min_labels: n },
        }
    }

    pub fn min_labels(&self) -> usize {
        self.min_labels
    }

    fn allows(&self, name: &str) -> bool {
        !name.is_empty() && label_count(name) >= self.min_labels
    }
}

impl Default for WalkBoundary {
    fn default() -> Self {
        Self::TO_TLD
    }
}

/// Name servers found for the closest enclosing name that has any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub zone: String,
    pub name_servers: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("No servers found for {0}")]
    NotFound(String),

    #[error("NS lookup for {name} failed: {source}")]
    Lookup {
        name: String,
        #[source]
        source: QueryError,
    },
}

pub struct DelegationWalker {
    executor: Arc<QueryExecutor>,
    boundary: WalkBoundary,
}

impl DelegationWalker {
    pub fn new(executor: Arc<QueryExecutor>, boundary: WalkBoundary) -> Self {
        Self { executor, boundary }
    }

    /// Ask `resolver` for NS records of `name`, then of each ancestor in turn,
    /// and return the first non-empty set. Empty answers and NXDOMAIN move the
    /// walk up a level; any other failure ends it.
    pub async fn find_authoritative_servers(&self, name: &str, resolver: SocketAddr) -> Result<Delegation, WalkError> {
        let mut current = name;
        loop {
            info!("{}looking up NS records for {} against {}", indent(1), current, resolver);
            let query = Query::new(current, RecordType::NS, true);
            let name_servers: Vec<String> = match self.executor.execute(resolver, &query, AnswerPolicy::DISCOVERY, 2).await {
                Ok(records) => records
                    .iter()
                    .filter_map(|r| r.ns_target())
                    .map(str::to_string)
                    .collect(),
                Err(QueryError::EmptyAnswer { .. }) | Err(QueryError::NameError) => Vec::new(),
                Err(source) => {
                    warn!("{}Error looking up {} against {}: {}", indent(1), current, resolver, source);
                    return Err(WalkError::Lookup { name: current.to_string(), source });
                }
            };

            if !name_servers.is_empty() {
                return Ok(Delegation { zone: current.to_string(), name_servers });
            }

            current = strip_leftmost_label(current);
            if !self.boundary.allows(current) {
                return Err(WalkError::NotFound(name.to_string()));
            }
        }
    }
}
