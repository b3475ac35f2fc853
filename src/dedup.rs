use std::net::SocketAddr;

use dashmap::DashSet;

/// (name, server) pairs already sent a direct query during this run.
///
/// Shared by every domain and every local resolver in one invocation.
/// Marking is a single atomic insert, so concurrent callers cannot both
/// win the same pair.
#[derive(Debug, Default)]
pub struct DedupCache {
    seen: DashSet<(String, SocketAddr)>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the pair; true only for the first caller.
    pub fn mark(&self, name: &str, server: SocketAddr) -> bool {
        self.seen.insert((name.to_ascii_lowercase(), server))
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str, server: SocketAddr) -> bool {
        self.seen.contains(&(name.to_ascii_lowercase(), server))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
