use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Two spaces per nesting level of the diagnostic log
pub fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

/// Counts for one `check(domain)` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainReport {
    pub domain: String,
    pub local_lookups: u64,
    pub delegations_found: u64,
    pub ns_address_lookups: u64,
    pub direct_queries: u64,
    pub skipped: u64,
    pub failures: u64,
}

impl fmt::Display for DomainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} direct queries, {} skipped, {} failures",
            self.domain, self.direct_queries, self.skipped, self.failures
        )
    }
}

/// Run-wide counters, accumulated from every domain report
#[derive(Debug, Default)]
pub struct RunSummary {
    pub domains: AtomicU64,
    pub local_lookups: AtomicU64,
    pub delegations_found: AtomicU64,
    pub ns_address_lookups: AtomicU64,
    pub direct_queries: AtomicU64,
    pub skipped: AtomicU64,
    pub failures: AtomicU64,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, report: &DomainReport) {
        self.domains.fetch_add(1, Ordering::Relaxed);
        self.local_lookups.fetch_add(report.local_lookups, Ordering::Relaxed);
        self.delegations_found.fetch_add(report.delegations_found, Ordering::Relaxed);
        self.ns_address_lookups.fetch_add(report.ns_address_lookups, Ordering::Relaxed);
        self.direct_queries.fetch_add(report.direct_queries, Ordering::Relaxed);
        self.skipped.fetch_add(report.skipped, Ordering::Relaxed);
        self.failures.fetch_add(report.failures, Ordering::Relaxed);
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} domains, {} local lookups, {} delegations, {} NS address lookups, {} direct queries, {} skipped, {} failures",
            self.domains.load(Ordering::Relaxed),
            self.local_lookups.load(Ordering::Relaxed),
            self.delegations_found.load(Ordering::Relaxed),
            self.ns_address_lookups.load(Ordering::Relaxed),
            self.direct_queries.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
            self.failures.load(Ordering::Relaxed),
        )
    }
}
