use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_retry::RetryIf;
use tracing::{debug, warn};

use crate::dns::types::{Record, ResponseCode};
use crate::report::indent;
use crate::transport::{ExchangeError, Query, Response, Transport};

/// How many times to try one question and how long to wait in between
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Fresh delay schedule for one execution, usable as a `tokio_retry` strategy.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next: self.initial_delay.min(self.max_delay),
            factor: self.backoff_factor.max(1.0),
            max: self.max_delay,
        }
    }
}

/// Capped exponential backoff without jitter: d, d*f, d*f^2, ... <= max
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    factor: f64,
    max: Duration,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = Duration::try_from_secs_f64(current.as_secs_f64() * self.factor)
            .unwrap_or(self.max)
            .min(self.max);
        Some(current)
    }
}

/// Which answers count as failures for a given caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerPolicy {
    /// Zero answer records is an acceptable result
    pub allow_empty: bool,
    /// NXDOMAIN is worth asking again
    pub retry_name_error: bool,
}

impl AnswerPolicy {
    /// Direct lookups: an answer is required, every failure is retried.
    pub const REQUIRE_ANSWER: Self = Self { allow_empty: false, retry_name_error: true };

    /// NS discovery: empty and NXDOMAIN mean "try the parent", not "retry".
    pub const DISCOVERY: Self = Self { allow_empty: true, retry_name_error: false };
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Empty response ({rcode})")]
    EmptyAnswer { rcode: ResponseCode },

    #[error("NXDOMAIN")]
    NameError,

    #[error(transparent)]
    Transport(#[from] ExchangeError),
}

/// Classified result of one executor run. Exactly one of success, empty
/// answer, name error or transport error.
pub type Outcome = Result<Vec<Record>, QueryError>;

/// Sends one question to one server, retrying failures with backoff
pub struct QueryExecutor {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl QueryExecutor {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Run `query` against `server` until it succeeds, fails in a way the
    /// caller does not want retried, or the attempt budget is spent.
    /// `depth` only controls log indentation.
    pub async fn execute(&self, server: SocketAddr, query: &Query, answers: AnswerPolicy, depth: usize) -> Outcome {
        let attempts = self.policy.max_attempts.max(1);
        let delays = self.policy.backoff().take(attempts as usize - 1);

        let mut attempt = 0;
        let action = || {
            attempt += 1;
            let attempt = attempt;
            async move {
                debug!(
                    "{}attempt {}/{}: {} {} against {} (rd={})",
                    indent(depth), attempt, attempts, query.name, query.qtype, server, query.recursion_desired
                );

                let result = self.transport.exchange(server, query).await;
                if let Ok(response) = &result {
                    debug!(
                        "{}{} with {} answers from {} in {:?} (aa={}, tc={})",
                        indent(depth),
                        response.rcode,
                        response.answers.len(),
                        server,
                        response.rtt,
                        response.authoritative,
                        response.truncated
                    );
                }

                let outcome = classify(result, answers);
                if let Err(e) = &outcome {
                    if attempt < attempts && is_retryable(e, answers) {
                        warn!(
                            "{}Error (retry {}/{}) looking up {} against {}: {}",
                            indent(depth), attempt, attempts, query.name, server, e
                        );
                    }
                }
                outcome
            }
        };

        RetryIf::spawn(delays, action, |e: &QueryError| is_retryable(e, answers)).await
    }
}

/// NXDOMAIN is final when the caller treats it as an answer
fn is_retryable(error: &QueryError, answers: AnswerPolicy) -> bool {
    match error {
        QueryError::NameError => answers.retry_name_error,
        QueryError::EmptyAnswer { .. } | QueryError::Transport(_) => true,
    }
}

/// NXDOMAIN wins over an empty answer section
fn classify(result: Result<Response, ExchangeError>, answers: AnswerPolicy) -> Outcome {
    let response = result?;
    if response.rcode == ResponseCode::NxDomain {
        return Err(QueryError::NameError);
    }
    if response.answers.is_empty() && !answers.allow_empty {
        return Err(QueryError::EmptyAnswer { rcode: response.rcode });
    }
    Ok(response.answers)
}
