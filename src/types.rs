use num_traits::FromPrimitive;
use strum_macros::{Display, EnumString};

/// Resource Record Type, for example, A, CNAME or SOA.
///
/// Only the types the cooked-record encoder understands are listed. Any other
/// value seen on the wire is carried as its raw number and can only ever be
/// proxied; see [`type_name`].
#[derive(
    Copy, Clone, Debug, Display, EnumString, Eq, FromPrimitive, Ord, PartialEq, PartialOrd,
)]
#[allow(clippy::upper_case_acronyms)]
#[repr(u16)]
pub enum Type {
    /// IPv4 Address.
    A = 1,
    NS = 2,
    CNAME = 5,
    SOA = 6,

    /// Domain name pointer.
    PTR = 12,

    /// Mail exchange.
    MX = 15,

    /// Text strings.
    TXT = 16,

    /// IPv6 Address.
    AAAA = 28,

    /// Server Selection. See [rfc2782].
    ///
    /// [rfc2782]: https://datatracker.ietf.org/doc/html/rfc2782
    SRV = 33,

    /// Naming Authority Pointer. See [rfc3403].
    ///
    /// [rfc3403]: https://datatracker.ietf.org/doc/html/rfc3403
    NAPTR = 35,

    /// DNSSEC signature, served as opaque cooked data and never validated.
    /// See [rfc4034].
    ///
    /// [rfc4034]: https://datatracker.ietf.org/doc/html/rfc4034
    RRSIG = 46,

    /// DNSSEC public key. See [rfc4034].
    ///
    /// [rfc4034]: https://datatracker.ietf.org/doc/html/rfc4034
    DNSKEY = 48,

    /// Any record type. Only valid as a Question Type.
    #[strum(to_string = "ANY", serialize = "*")]
    ANY = 255,
}

/// Returns the textual tag for a wire qtype, or the `TYPE<n>` form of
/// [rfc3597] when the number is not one we know.
///
/// [rfc3597]: https://datatracker.ietf.org/doc/html/rfc3597
pub fn type_name(qtype: u16) -> String {
    match Type::from_u16(qtype) {
        Some(t) => t.to_string(),
        None => format!("TYPE{}", qtype),
    }
}

/// Resource Record Class. Every cooked answer is [`Class::Internet`]; the
/// question's class is echoed from the request untouched.
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(u16)]
pub enum Class {
    /// The Internet (IN).
    Internet = 1,

    /// Chaosnet (CH), obsolete LAN protocol from 1970s MIT.
    Chaos = 3,

    /// Hesiod (HS), an information service developed by MIT's Project Athena.
    Hesiod = 4,

    /// * (ANY).
    Any = 255,
}

/// Query or Response bit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum QR {
    Query,
    Response,
}

impl QR {
    pub fn from_bool(b: bool) -> QR {
        match b {
            false => QR::Query,
            true => QR::Response,
        }
    }
}
