use std::net::SocketAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tracing::debug;

use crate::dns::name::fqdn;
use crate::dns::packet::{self, Message};
use crate::dns::types::{Record, RecordType, ResponseCode};

/// A single question as it goes on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    pub name: String,
    pub qtype: RecordType,
    pub recursion_desired: bool,
}

impl Query {
    pub fn new(name: impl Into<String>, qtype: RecordType, recursion_desired: bool) -> Self {
        Self { name: name.into(), qtype, recursion_desired }
    }
}

/// The parts of a response the checker looks at
#[derive(Debug, Clone)]
pub struct Response {
    pub rcode: ResponseCode,
    pub authoritative: bool,
    pub truncated: bool,
    pub answers: Vec<Record>,
    pub rtt: Duration,
}

impl Response {
    fn from_message(message: Message, rtt: Duration) -> Self {
        Self {
            rcode: message.header.rcode,
            authoritative: message.header.aa,
            truncated: message.header.tc,
            answers: message.answers,
            rtt,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("timeout after {timeout:?} waiting for {server}")]
    Timeout { server: SocketAddr, timeout: Duration },

    #[error("I/O error talking to {server}: {source}")]
    Io {
        server: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed response from {server}: {reason}")]
    Malformed { server: SocketAddr, reason: String },

    #[error("no matching response from {0}")]
    NoMatchingResponse(SocketAddr),

    #[error("cannot encode query: {0}")]
    Encode(String),
}

/// One DNS exchange against one server. Everything above this trait is
/// transport-agnostic so tests can script responses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn exchange(&self, server: SocketAddr, query: &Query) -> Result<Response, ExchangeError>;
}

/// UDP first, TCP when the UDP answer comes back truncated. A response must
/// carry the query's ID and question.
pub struct UdpTransport {
    timeout: Duration,
}

impl UdpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn exchange_udp(&self, wire: &[u8], id: u16, query: &Query, server: SocketAddr) -> Result<Message, ExchangeError> {
        let io_err = |source| ExchangeError::Io { server, source };
        let bind_addr = if server.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await.map_err(io_err)?;
        socket.connect(server).await.map_err(io_err)?;
        socket.send(wire).await.map_err(io_err)?;

        // One deadline for the whole exchange; up to 3 reads to skip datagrams
        // that answer some other question
        let receive = async {
            let mut buf = vec![0u8; 4096];
            for _ in 0..3 {
                let len = socket.recv(&mut buf).await.map_err(io_err)?;
                if len < 2 || u16::from_be_bytes([buf[0], buf[1]]) != id {
                    debug!("Dropping stray datagram ({} bytes) from {}", len, server);
                    continue;
                }
                let message = decode(&buf[..len], server)?;
                if answers_query(&message, query) {
                    return Ok(message);
                }
                debug!("Dropping answer to another question ({}) from {}", message, server);
            }
            Err(ExchangeError::NoMatchingResponse(server))
        };

        tokio::time::timeout(self.timeout, receive)
            .await
            .map_err(|_| ExchangeError::Timeout { server, timeout: self.timeout })?
    }

    async fn exchange_tcp(&self, wire: &[u8], id: u16, query: &Query, server: SocketAddr) -> Result<Message, ExchangeError> {
        let io_err = |source| ExchangeError::Io { server, source };
        let exchange = async {
            let mut stream = TcpStream::connect(server).await.map_err(io_err)?;
            let mut framed = Vec::with_capacity(wire.len() + 2);
            framed.extend_from_slice(&(wire.len() as u16).to_be_bytes());
            framed.extend_from_slice(wire);
            stream.write_all(&framed).await.map_err(io_err)?;

            let len = stream.read_u16().await.map_err(io_err)? as usize;
            let mut buf = vec![0u8; len];
            stream.read_exact(&mut buf).await.map_err(io_err)?;
            Ok::<_, ExchangeError>(buf)
        };

        let buf = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ExchangeError::Timeout { server, timeout: self.timeout })??;
        if buf.len() < 2 || u16::from_be_bytes([buf[0], buf[1]]) != id {
            return Err(ExchangeError::NoMatchingResponse(server));
        }
        let message = decode(&buf, server)?;
        if !answers_query(&message, query) {
            return Err(ExchangeError::NoMatchingResponse(server));
        }
        Ok(message)
    }
}

fn decode(raw: &[u8], server: SocketAddr) -> Result<Message, ExchangeError> {
    packet::decode_message(raw).map_err(|e| ExchangeError::Malformed { server, reason: format!("{:#}", e) })
}

/// A response echoing a question must echo ours. Some servers drop the
/// question from error responses, so a missing one is accepted.
fn answers_query(message: &Message, query: &Query) -> bool {
    match &message.question {
        Some((name, qtype)) => *qtype == query.qtype && name.eq_ignore_ascii_case(&fqdn(&query.name)),
        None => true,
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn exchange(&self, server: SocketAddr, query: &Query) -> Result<Response, ExchangeError> {
        use rand::rngs::OsRng;
        use rand::Rng;

        let start = Instant::now();
        let id: u16 = OsRng.gen();
        let wire = packet::build_query(id, &query.name, query.qtype, query.recursion_desired)
            .map_err(|e| ExchangeError::Encode(e.to_string()))?;

        let mut message = self.exchange_udp(&wire, id, query, server).await?;
        if message.header.tc {
            debug!("Truncated UDP answer for {} from {}, retrying over TCP", query.name, server);
            message = self.exchange_tcp(&wire, id, query, server).await?;
        }
        if !message.header.qr {
            return Err(ExchangeError::Malformed { server, reason: "QR bit not set".into() });
        }
        debug!("{} {} from {} in {:?}", message, message.header.rcode, server, start.elapsed());

        Ok(Response::from_message(message, start.elapsed()))
    }
}
