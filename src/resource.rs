//! The cooked resource records, and their wire-format RDATA encodings.

use crate::bail;
use crate::dns::write_qname;
use crate::types::Type;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A cooked record, one variant per RR type the proxy can fabricate.
///
/// Parsed from an operator's spec string with [`Resource::from_spec`], and
/// encoded into an answer's RDATA with [`Resource::write_rdata`].
///
/// [`Resource::from_spec`]: crate::Resource::from_spec
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, PartialEq)]
pub enum Resource {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),

    CNAME(String),
    NS(String),
    PTR(String),

    TXT(String),

    MX(MX),
    SOA(SOA),
    SRV(SRV),
    NAPTR(NAPTR),

    DNSKEY(DNSKEY),
    RRSIG(RRSIG),
}

impl Resource {
    /// The wire type tag of this record.
    pub fn r#type(&self) -> Type {
        match self {
            Resource::A(_) => Type::A,
            Resource::AAAA(_) => Type::AAAA,
            Resource::CNAME(_) => Type::CNAME,
            Resource::NS(_) => Type::NS,
            Resource::PTR(_) => Type::PTR,
            Resource::TXT(_) => Type::TXT,
            Resource::MX(_) => Type::MX,
            Resource::SOA(_) => Type::SOA,
            Resource::SRV(_) => Type::SRV,
            Resource::NAPTR(_) => Type::NAPTR,
            Resource::DNSKEY(_) => Type::DNSKEY,
            Resource::RRSIG(_) => Type::RRSIG,
        }
    }

    /// Appends this record's wire-format RDATA to `buf`.
    ///
    /// Domain names inside RDATA are always written uncompressed.
    pub fn write_rdata(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        match self {
            Resource::A(ip) => buf.extend_from_slice(&ip.octets()),
            Resource::AAAA(ip) => buf.extend_from_slice(&ip.octets()),

            Resource::CNAME(name) | Resource::NS(name) | Resource::PTR(name) => {
                write_qname(buf, name)?
            }

            Resource::TXT(text) => {
                // One <character-string> per 255-byte chunk.
                for chunk in text.as_bytes().chunks(255) {
                    buf.push(chunk.len() as u8);
                    buf.extend_from_slice(chunk);
                }
                if text.is_empty() {
                    buf.push(0);
                }
            }

            Resource::MX(mx) => {
                buf.extend_from_slice(&mx.preference.to_be_bytes());
                write_qname(buf, &mx.exchange)?;
            }

            Resource::SOA(soa) => {
                write_qname(buf, &soa.mname)?;
                write_qname(buf, &soa.rname)?;
                buf.extend_from_slice(&soa.serial.to_be_bytes());
                buf.extend_from_slice(&soa.refresh.to_be_bytes());
                buf.extend_from_slice(&soa.retry.to_be_bytes());
                buf.extend_from_slice(&soa.expire.to_be_bytes());
                buf.extend_from_slice(&soa.minimum.to_be_bytes());
            }

            Resource::SRV(srv) => {
                buf.extend_from_slice(&srv.priority.to_be_bytes());
                buf.extend_from_slice(&srv.weight.to_be_bytes());
                buf.extend_from_slice(&srv.port.to_be_bytes());
                write_qname(buf, &srv.target)?;
            }

            Resource::NAPTR(naptr) => {
                buf.extend_from_slice(&naptr.order.to_be_bytes());
                buf.extend_from_slice(&naptr.preference.to_be_bytes());
                write_character_string(buf, &naptr.flags)?;
                write_character_string(buf, &naptr.service)?;
                write_character_string(buf, &naptr.regexp)?;
                write_qname(buf, &naptr.replacement)?;
            }

            Resource::DNSKEY(key) => {
                buf.extend_from_slice(&key.flags.to_be_bytes());
                buf.push(key.protocol);
                buf.push(key.algorithm);
                buf.extend_from_slice(&key.key);
            }

            Resource::RRSIG(sig) => {
                buf.extend_from_slice(&(sig.covered as u16).to_be_bytes());
                buf.push(sig.algorithm);
                buf.push(sig.labels);
                buf.extend_from_slice(&sig.original_ttl.to_be_bytes());
                buf.extend_from_slice(&sig.expiration.to_be_bytes());
                buf.extend_from_slice(&sig.inception.to_be_bytes());
                buf.extend_from_slice(&sig.key_tag.to_be_bytes());
                write_qname(buf, &sig.signer)?;
                buf.extend_from_slice(&sig.signature);
            }
        }

        Ok(())
    }
}

/// Writes a single DNS <character-string>: a length octet then up to 255
/// bytes of text.
fn write_character_string(buf: &mut Vec<u8>, s: &str) -> io::Result<()> {
    if s.len() > 255 {
        bail!(
            InvalidData,
            "character-string longer than 255 bytes: '{}'",
            s
        );
    }

    buf.push(s.len() as u8);
    buf.extend_from_slice(s.as_bytes());

    Ok(())
}

/// Mail exchange record.
#[derive(Clone, Debug, PartialEq)]
pub struct MX {
    /// Preference given to this RR among others at the same owner. Lower
    /// values are preferred.
    pub preference: u16,

    /// A host willing to act as a mail exchange for the owner name.
    pub exchange: String,
}

/// Start of a zone of authority.
#[derive(Clone, Debug, PartialEq)]
pub struct SOA {
    /// The primary name server for this zone.
    pub mname: String,

    /// Mailbox of the person responsible for this zone.
    pub rname: String,

    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

/// Server selection record.
#[derive(Clone, Debug, PartialEq)]
pub struct SRV {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

/// Naming authority pointer.
#[derive(Clone, Debug, PartialEq)]
pub struct NAPTR {
    pub order: u16,
    pub preference: u16,
    pub flags: String,
    pub service: String,
    pub regexp: String,
    pub replacement: String,
}

/// DNSSEC public key. The key material is carried opaquely, the proxy never
/// signs or validates anything with it.
#[derive(Clone, Debug, PartialEq)]
pub struct DNSKEY {
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
    pub key: Vec<u8>,
}

/// DNSSEC signature, carried opaquely like [`DNSKEY`].
#[derive(Clone, Debug, PartialEq)]
pub struct RRSIG {
    /// Type of the RR set this signature covers.
    pub covered: Type,

    pub algorithm: u8,

    /// Number of labels in the signed name.
    pub labels: u8,

    pub original_ttl: u32,

    /// Signature expiration, seconds since the Unix epoch.
    pub expiration: u32,

    /// Signature inception, seconds since the Unix epoch.
    pub inception: u32,

    pub key_tag: u16,
    pub signer: String,
    pub signature: Vec<u8>,
}
