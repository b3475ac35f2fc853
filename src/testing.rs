//! Scripted transport for exercising the checker without a network.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::dns::types::{DnsClass, Record, RecordData, RecordType, ResponseCode};
use crate::transport::{ExchangeError, Query, Response, Transport};

#[derive(Debug, Clone)]
pub enum StubReply {
    Answer(Vec<Record>),
    Rcode(ResponseCode),
    Timeout,
}

#[derive(Debug, Clone)]
pub struct StubCall {
    pub server: SocketAddr,
    pub query: Query,
    pub at: Instant,
}

type Key = (SocketAddr, String, RecordType);

/// Replies are consumed in order per (server, name, type); the last one
/// repeats. Unscripted questions get an empty NOERROR answer.
#[derive(Default)]
pub struct StubTransport {
    script: Mutex<HashMap<Key, Vec<StubReply>>>,
    calls: Mutex<Vec<StubCall>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, server: SocketAddr, name: &str, qtype: RecordType, replies: Vec<StubReply>) {
        self.script.lock().unwrap().insert((server, name.to_string(), qtype), replies);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|c| c.at).collect()
    }

    pub fn calls(&self) -> Vec<StubCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that went to `server` asking about `name`
    pub fn calls_for(&self, server: SocketAddr, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.server == server && c.query.name == name)
            .count()
    }

    fn next_reply(&self, key: &Key) -> StubReply {
        let mut script = self.script.lock().unwrap();
        match script.get_mut(key) {
            Some(replies) if replies.len() > 1 => replies.remove(0),
            Some(replies) if !replies.is_empty() => replies[0].clone(),
            _ => StubReply::Answer(vec![]),
        }
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn exchange(&self, server: SocketAddr, query: &Query) -> Result<Response, ExchangeError> {
        self.calls.lock().unwrap().push(StubCall {
            server,
            query: query.clone(),
            at: Instant::now(),
        });

        let key = (server, query.name.clone(), query.qtype);
        let (rcode, answers) = match self.next_reply(&key) {
            StubReply::Answer(records) => (ResponseCode::NoError, records),
            StubReply::Rcode(rcode) => (rcode, vec![]),
            StubReply::Timeout => {
                return Err(ExchangeError::Timeout { server, timeout: Duration::from_secs(5) });
            }
        };

        Ok(Response {
            rcode,
            authoritative: !query.recursion_desired,
            truncated: false,
            answers,
            rtt: Duration::from_millis(1),
        })
    }
}

pub fn a(name: &str, ip: &str) -> Record {
    Record {
        name: name.to_string(),
        rtype: RecordType::A,
        class: DnsClass::IN,
        ttl: 300,
        data: RecordData::A(ip.parse().unwrap()),
    }
}

pub fn ns(name: &str, target: &str) -> Record {
    Record {
        name: name.to_string(),
        rtype: RecordType::NS,
        class: DnsClass::IN,
        ttl: 3600,
        data: RecordData::Ns(target.to_string()),
    }
}
