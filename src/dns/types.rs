use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Record types the checker asks for or decodes; anything else is carried by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    NS,
    CNAME,
    AAAA,
    Unknown(u16),
}

impl RecordType {
    const KNOWN: [(RecordType, u16, &'static str); 4] = [
        (RecordType::A, 1, "A"),
        (RecordType::NS, 2, "NS"),
        (RecordType::CNAME, 5, "CNAME"),
        (RecordType::AAAA, 28, "AAAA"),
    ];

    pub fn to_u16(self) -> u16 {
        u16::from(self)
    }

    fn mnemonic(self) -> Option<&'static str> {
        Self::KNOWN.iter().find(|(t, _, _)| *t == self).map(|(_, _, m)| *m)
    }
}

impl From<u16> for RecordType {
    fn from(code: u16) -> Self {
        Self::KNOWN
            .iter()
            .find(|(_, c, _)| *c == code)
            .map_or(RecordType::Unknown(code), |(t, _, _)| *t)
    }
}

impl From<RecordType> for u16 {
    fn from(rtype: RecordType) -> Self {
        match rtype {
            RecordType::Unknown(code) => code,
            known => RecordType::KNOWN
                .iter()
                .find(|(t, _, _)| *t == known)
                .map_or(0, |(_, c, _)| *c),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mnemonic() {
            Some(m) => f.write_str(m),
            None => write!(f, "TYPE{}", u16::from(*self)),
        }
    }
}

/// RCODE from the header's low four bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    NoError,
    FormErr,
    ServFail,
    NxDomain,
    NotImp,
    Refused,
    Other(u8),
}

impl From<u8> for ResponseCode {
    fn from(rcode: u8) -> Self {
        use ResponseCode::*;
        [NoError, FormErr, ServFail, NxDomain, NotImp, Refused]
            .get(rcode as usize)
            .copied()
            .unwrap_or(Other(rcode))
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ResponseCode::NoError => "NOERROR",
            ResponseCode::FormErr => "FORMERR",
            ResponseCode::ServFail => "SERVFAIL",
            ResponseCode::NxDomain => "NXDOMAIN",
            ResponseCode::NotImp => "NOTIMP",
            ResponseCode::Refused => "REFUSED",
            ResponseCode::Other(code) => return write!(f, "RCODE{}", code),
        };
        f.write_str(text)
    }
}

/// Only IN is ever queried; others are kept by number for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DnsClass {
    IN,
    Other(u16),
}

impl From<u16> for DnsClass {
    fn from(class: u16) -> Self {
        if class == 1 { DnsClass::IN } else { DnsClass::Other(class) }
    }
}

impl fmt::Display for DnsClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DnsClass::IN => f.write_str("IN"),
            DnsClass::Other(class) => write!(f, "CLASS{}", class),
        }
    }
}

/// Decoded rdata for the record types this tool cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ns(String),
    Cname(String),
    Other(Vec<u8>),
}

/// One answer-section resource record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub rtype: RecordType,
    pub class: DnsClass,
    pub ttl: u32,
    pub data: RecordData,
}

impl Record {
    /// Target host of an NS record, fully qualified
    pub fn ns_target(&self) -> Option<&str> {
        match &self.data {
            RecordData::Ns(target) => Some(target),
            _ => None,
        }
    }

    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        match self.data {
            RecordData::A(ip) => Some(ip),
            _ => None,
        }
    }
}

/// Zone-file presentation, e.g. `example.com.	300	IN	A	192.0.2.1`
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}\t{}\t", self.name, self.ttl, self.class, self.rtype)?;
        match &self.data {
            RecordData::A(ip) => write!(f, "{}", ip),
            RecordData::Aaaa(ip) => write!(f, "{}", ip),
            RecordData::Ns(name) | RecordData::Cname(name) => f.write_str(name),
            RecordData::Other(raw) => write!(f, "\\# {}", raw.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_codes() {
        assert_eq!(RecordType::from(2), RecordType::NS);
        assert_eq!(RecordType::AAAA.to_u16(), 28);
        assert_eq!(RecordType::from(6), RecordType::Unknown(6));
        assert_eq!(RecordType::Unknown(6).to_u16(), 6);
        assert_eq!(RecordType::CNAME.to_string(), "CNAME");
        assert_eq!(RecordType::from(99).to_string(), "TYPE99");
    }

    #[test]
    fn test_record_display() {
        let record = Record {
            name: "example.com.".into(),
            rtype: RecordType::A,
            class: DnsClass::IN,
            ttl: 300,
            data: RecordData::A(Ipv4Addr::new(203, 0, 113, 1)),
        };
        assert_eq!(record.to_string(), "example.com.\t300\tIN\tA\t203.0.113.1");
        assert_eq!(record.ipv4(), Some(Ipv4Addr::new(203, 0, 113, 1)));
        assert_eq!(record.ns_target(), None);
    }

    #[test]
    fn test_rcode_display() {
        assert_eq!(ResponseCode::from(3).to_string(), "NXDOMAIN");
        assert_eq!(ResponseCode::from(5), ResponseCode::Refused);
        assert_eq!(ResponseCode::from(11).to_string(), "RCODE11");
        assert_eq!(DnsClass::from(3).to_string(), "CLASS3");
    }
}
