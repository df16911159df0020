//! Parses the operator's textual cooked-answer specs into [`Resource`]s.
//!
//! Grammars follow the rule-file format: fields separated by single spaces,
//! trailing dots on domain-valued fields ignored, RRSIG times given as
//! `YYYYMMDDHHMMSS` in UTC.

use crate::resource::{DNSKEY, MX, NAPTR, RRSIG, SOA, SRV};
use crate::Resource;
use crate::Type;
use chrono::{NaiveDateTime, TimeZone, Utc};
use core::num::ParseIntError;
use core::str::FromStr;
use regex::Regex;
use std::net::AddrParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FromStrError {
    #[error("that record type can not be cooked")]
    UnsupportedType,

    #[error("string doesn't match expected format")]
    InvalidFormat,

    #[error("timestamp is not YYYYMMDDHHMMSS")]
    InvalidTimestamp,

    #[error(transparent)]
    ParseIntError(#[from] ParseIntError),

    #[error(transparent)]
    AddrParseError(#[from] AddrParseError),

    #[error(transparent)]
    DecodeError(#[from] base64::DecodeError),
}

/// Strips a single trailing dot, the way operators write absolute names.
fn strip_dot(s: &str) -> &str {
    s.strip_suffix('.').unwrap_or(s)
}

impl Resource {
    /// Parses a cooked-answer spec. Needs the record [`Type`] up front, since
    /// the textual grammars are ambiguous between types.
    pub fn from_spec(r#type: Type, s: &str) -> Result<Self, FromStrError> {
        Ok(match r#type {
            // IP addresses
            Type::A => Resource::A(s.parse()?),
            Type::AAAA => Resource::AAAA(s.parse()?),

            // Single-token specs
            Type::NS => Resource::NS(strip_dot(s).to_string()),
            Type::CNAME => Resource::CNAME(strip_dot(s).to_string()),
            Type::PTR => Resource::PTR(strip_dot(s).to_string()),
            Type::TXT => Resource::TXT(strip_dot(s).to_string()),

            // An MX spec is a bare exchange name, the priority is implied.
            Type::MX => Resource::MX(MX {
                preference: 10,
                exchange: strip_dot(s).to_string(),
            }),

            // Multi-field grammars
            Type::SOA => Resource::SOA(s.parse()?),
            Type::SRV => Resource::SRV(s.parse()?),
            Type::NAPTR => Resource::NAPTR(s.parse()?),
            Type::DNSKEY => Resource::DNSKEY(s.parse()?),
            Type::RRSIG => Resource::RRSIG(s.parse()?),

            // A question-only type never has a spec of its own.
            Type::ANY => return Err(FromStrError::UnsupportedType),
        })
    }
}

impl FromStr for SOA {
    type Err = FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            // "ns1.fake.com. hostmaster.fake.com. 1 10800 3600 604800 3600"
            // "{mname} {rname} {serial} {refresh} {retry} {expire} {minimum}"
            static ref RE: Regex = Regex::new(r"^(\S+) (\S+) (\d+) (\d+) (\d+) (\d+) (\d+)$").unwrap();
        }

        if let Some(caps) = RE.captures(s) {
            Ok(SOA {
                mname: strip_dot(&caps[1]).to_string(),
                rname: strip_dot(&caps[2]).to_string(),
                serial: caps[3].parse()?,
                refresh: caps[4].parse()?,
                retry: caps[5].parse()?,
                expire: caps[6].parse()?,
                minimum: caps[7].parse()?,
            })
        } else {
            Err(FromStrError::InvalidFormat)
        }
    }
}

impl FromStr for SRV {
    type Err = FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            // "10 20 5060 sip.fake.com"
            // "{priority} {weight} {port} {target}"
            static ref RE: Regex = Regex::new(r"^(\d+) (\d+) (\d+) (\S+)$").unwrap();
        }

        if let Some(caps) = RE.captures(s) {
            Ok(SRV {
                priority: caps[1].parse()?,
                weight: caps[2].parse()?,
                port: caps[3].parse()?,
                target: strip_dot(&caps[4]).to_string(),
            })
        } else {
            Err(FromStrError::InvalidFormat)
        }
    }
}

impl FromStr for NAPTR {
    type Err = FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            // "100 10 S SIP+D2U !^.*$!sip:svc@fake.com! _sip._udp.fake.com"
            // "{order} {preference} {flags} {service} {regexp} {replacement}"
            static ref RE: Regex = Regex::new(r"^(\d+) (\d+) (\S*) (\S*) (\S*) (\S*)$").unwrap();
        }

        if let Some(caps) = RE.captures(s) {
            Ok(NAPTR {
                order: caps[1].parse()?,
                preference: caps[2].parse()?,
                flags: caps[3].to_string(),
                service: caps[4].to_string(),
                regexp: caps[5].to_string(),
                replacement: strip_dot(&caps[6]).to_string(),
            })
        } else {
            Err(FromStrError::InvalidFormat)
        }
    }
}

impl FromStr for DNSKEY {
    type Err = FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            // "256 3 5 AQPSKmynfzW4kyBv015MUG2DeIQ3Cbl+BBZH4b/0PY1k..."
            // "{flags} {protocol} {algorithm} {base64 key}"
            static ref RE: Regex = Regex::new(r"^(\d+) (\d+) (\d+) (\S+)$").unwrap();
        }

        if let Some(caps) = RE.captures(s) {
            Ok(DNSKEY {
                flags: caps[1].parse()?,
                protocol: caps[2].parse()?,
                algorithm: caps[3].parse()?,
                key: base64::decode(&caps[4])?,
            })
        } else {
            Err(FromStrError::InvalidFormat)
        }
    }
}

impl FromStr for RRSIG {
    type Err = FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            // "A 5 3 86400 20280101000000 20230101000000 12345 fake.com AbCd..."
            // "{covered} {algorithm} {labels} {original ttl} {expiration} {inception} {key tag} {signer} {base64 signature}"
            static ref RE: Regex =
                Regex::new(r"^(\S+) (\d+) (\d+) (\d+) (\d{14}) (\d{14}) (\d+) (\S+) (\S+)$")
                    .unwrap();
        }

        if let Some(caps) = RE.captures(s) {
            Ok(RRSIG {
                covered: Type::from_str(&caps[1]).map_err(|_| FromStrError::InvalidFormat)?,
                algorithm: caps[2].parse()?,
                labels: caps[3].parse()?,
                original_ttl: caps[4].parse()?,
                expiration: parse_sig_time(&caps[5])?,
                inception: parse_sig_time(&caps[6])?,
                key_tag: caps[7].parse()?,
                signer: strip_dot(&caps[8]).to_string(),
                signature: base64::decode(&caps[9])?,
            })
        } else {
            Err(FromStrError::InvalidFormat)
        }
    }
}

/// Signature times are `YYYYMMDDHHMMSS`, read as UTC and converted to seconds
/// since the Unix epoch (rfc4034 §3.2).
fn parse_sig_time(s: &str) -> Result<u32, FromStrError> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y%m%d%H%M%S")
        .map_err(|_| FromStrError::InvalidTimestamp)?;

    u32::try_from(Utc.from_utc_datetime(&naive).timestamp())
        .map_err(|_| FromStrError::InvalidTimestamp)
}
