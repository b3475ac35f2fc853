//! RFC 1035 message codec, reduced to what the checker exchanges:
//! single-question queries out, responses in with the answer section decoded.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use anyhow::{anyhow, bail};

use crate::dns::types::{DnsClass, Record, RecordData, RecordType, ResponseCode};

const HEADER_LEN: usize = 12;
const MAX_NAME_LEN: usize = 255;
const MAX_LABEL_LEN: usize = 63;
// Compression pointers followed before a name is rejected as a loop
const MAX_POINTERS: usize = 16;

const FLAG_QR: u16 = 0x8000;
const FLAG_AA: u16 = 0x0400;
const FLAG_TC: u16 = 0x0200;
const FLAG_RD: u16 = 0x0100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub qr: bool,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub rcode: ResponseCode,
    pub qdcount: u16,
    pub ancount: u16,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub header: Header,
    /// The first question, if the message carries one
    pub question: Option<(String, RecordType)>,
    pub answers: Vec<Record>,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.question {
            Some((name, qtype)) => write!(f, "{} {} ({} answers)", name, qtype, self.answers.len()),
            None => write!(f, "(no question, {} answers)", self.answers.len()),
        }
    }
}

/// Bounds-checked cursor over a whole message
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn take(&mut self, len: usize) -> anyhow::Result<&'a [u8]> {
        let end = self.pos + len;
        if end > self.data.len() {
            bail!("message ends at {} bytes, needed {}", self.data.len(), end);
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> anyhow::Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> anyhow::Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> anyhow::Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// A possibly compressed name, in fully-qualified form (`.` for the root).
    /// The cursor ends up just past the name as written at its start.
    fn name(&mut self) -> anyhow::Result<String> {
        let mut name = String::new();
        let mut labels = Reader::new(self.data, self.pos);
        let mut resume = None;
        let mut pointers = 0;

        loop {
            let len = labels.u8()?;
            match len & 0xC0 {
                0xC0 => {
                    let target = (((len & 0x3F) as usize) << 8) | labels.u8()? as usize;
                    resume.get_or_insert(labels.pos);
                    pointers += 1;
                    if pointers > MAX_POINTERS {
                        bail!("compression loop in name at offset {}", self.pos);
                    }
                    labels.pos = target;
                }
                0x00 if len == 0 => break,
                0x00 => {
                    let label = labels.take(len as usize)?;
                    name.push_str(&String::from_utf8_lossy(label));
                    name.push('.');
                    if name.len() > MAX_NAME_LEN {
                        bail!("name at offset {} exceeds {} bytes", self.pos, MAX_NAME_LEN);
                    }
                }
                _ => bail!("unsupported label type {:#04x} at offset {}", len, labels.pos - 1),
            }
        }

        self.pos = resume.unwrap_or(labels.pos);
        if name.is_empty() {
            name.push('.');
        }
        Ok(name)
    }

    fn header(&mut self) -> anyhow::Result<Header> {
        let id = self.u16()?;
        let flags = self.u16()?;
        let qdcount = self.u16()?;
        let ancount = self.u16()?;
        // Authority and additional counts: those sections are never read
        self.take(4)?;
        Ok(Header {
            id,
            qr: flags & FLAG_QR != 0,
            aa: flags & FLAG_AA != 0,
            tc: flags & FLAG_TC != 0,
            rd: flags & FLAG_RD != 0,
            rcode: ResponseCode::from((flags & 0x000F) as u8),
            qdcount,
            ancount,
        })
    }

    fn record(&mut self) -> anyhow::Result<Record> {
        let name = self.name()?;
        let rtype = RecordType::from(self.u16()?);
        let class = DnsClass::from(self.u16()?);
        let ttl = self.u32()?;
        let rdlength = self.u16()? as usize;
        let rdata_start = self.pos;
        let rdata = self.take(rdlength)?;

        let data = match rtype {
            RecordType::A => {
                let octets: [u8; 4] = rdata
                    .try_into()
                    .map_err(|_| anyhow!("A rdata must be 4 bytes, got {}", rdlength))?;
                RecordData::A(Ipv4Addr::from(octets))
            }
            RecordType::AAAA => {
                let octets: [u8; 16] = rdata
                    .try_into()
                    .map_err(|_| anyhow!("AAAA rdata must be 16 bytes, got {}", rdlength))?;
                RecordData::Aaaa(Ipv6Addr::from(octets))
            }
            // Targets may point anywhere in the message, so read them from the whole buffer
            RecordType::NS => RecordData::Ns(Reader::new(self.data, rdata_start).name()?),
            RecordType::CNAME => RecordData::Cname(Reader::new(self.data, rdata_start).name()?),
            _ => RecordData::Other(rdata.to_vec()),
        };

        Ok(Record { name, rtype, class, ttl, data })
    }
}

/// Decode a response. A truncated (TC) message may stop mid-answer-section;
/// the records that did decode are kept.
pub fn decode_message(data: &[u8]) -> anyhow::Result<Message> {
    if data.len() < HEADER_LEN {
        bail!("message too short: {} bytes (minimum {})", data.len(), HEADER_LEN);
    }
    let mut reader = Reader::new(data, 0);
    let header = reader.header()?;

    let mut question = None;
    for _ in 0..header.qdcount {
        let name = reader.name()?;
        let qtype = RecordType::from(reader.u16()?);
        reader.u16()?; // class
        question.get_or_insert((name, qtype));
    }

    let mut answers = Vec::with_capacity(header.ancount as usize);
    for _ in 0..header.ancount {
        match reader.record() {
            Ok(record) => answers.push(record),
            Err(_) if header.tc => break,
            Err(e) => return Err(e.context(format!("answer {} of {}", answers.len() + 1, header.ancount))),
        }
    }

    Ok(Message { header, question, answers })
}

/// Wire form of a name. Relative and fully-qualified input encode the same.
pub fn encode_name(name: &str) -> anyhow::Result<Vec<u8>> {
    let mut wire = Vec::with_capacity(name.len() + 2);
    let relative = name.trim_end_matches('.');
    if !relative.is_empty() {
        for label in relative.split('.') {
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                bail!("invalid label '{}' in name '{}'", label, name);
            }
            wire.push(label.len() as u8);
            wire.extend_from_slice(label.as_bytes());
        }
    }
    wire.push(0);
    if wire.len() > MAX_NAME_LEN {
        bail!("name '{}' exceeds {} bytes", name, MAX_NAME_LEN);
    }
    Ok(wire)
}

/// A single-question IN query
pub fn build_query(id: u16, name: &str, qtype: RecordType, recursion_desired: bool) -> anyhow::Result<Vec<u8>> {
    let qname = encode_name(name)?;
    let flags = if recursion_desired { FLAG_RD } else { 0 };

    let mut wire = Vec::with_capacity(HEADER_LEN + qname.len() + 4);
    for field in [id, flags, 1, 0, 0, 0] {
        wire.extend_from_slice(&field.to_be_bytes());
    }
    wire.extend_from_slice(&qname);
    wire.extend_from_slice(&qtype.to_u16().to_be_bytes());
    wire.extend_from_slice(&1u16.to_be_bytes());
    Ok(wire)
}
