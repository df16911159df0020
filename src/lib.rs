//! dnscook is a configurable DNS proxy for penetration testers and malware
//! analysts. Incoming queries are matched against operator-supplied rules:
//! matched queries are answered with fabricated ("cooked") records, everything
//! else is forwarded byte-for-byte to a real resolver and the reply handed
//! back untouched.
//!
//! # Features
//! * Cooking the following record types:
//!   * A,
//!   * AAAA,
//!   * CNAME,
//!   * MX,
//!   * NS,
//!   * SOA,
//!   * PTR,
//!   * TXT,
//!   * SRV,
//!   * NAPTR,
//!   * DNSKEY, and
//!   * RRSIG
//! * Whole-label wildcard patterns, with whitelist (`--fakedomains`) and
//!   blacklist (`--truedomains`) modes.
//! * ANY queries expanded to one record per cooked type.
//! * UDP and TCP listeners, IPv4 or IPv6, one task per query.
//!
//! # Usage (library)
//!
//! ```rust
//! use dnscook::{Action, Dispatcher, RuleTable, Type, WILDCARD};
//!
//! let mut rules = RuleTable::new();
//! rules.insert(Type::A, WILDCARD, Action::Cook("192.0.2.1".to_string()));
//!
//! // Every A query handed to this dispatcher is now answered with 192.0.2.1.
//! let dispatcher = Dispatcher::new(rules, Vec::new(), false);
//! # let _ = dispatcher;
//! ```
//!
//! # Usage (cli)
//!
//! ```shell
//! $ dnscook --fakeip 192.0.2.1 --fakedomains example.com -p 5353
//! $ dig @127.0.0.1 -p 5353 example.com A
//! ```
//!
//! ## Reference
//!
//! * [rfc1035]: DOMAIN NAMES - IMPLEMENTATION AND SPECIFICATION
//! * [rfc2782]: A DNS RR for specifying the location of services (DNS SRV)
//! * [rfc3403]: Dynamic Delegation Discovery System (NAPTR)
//! * [rfc4034]: Resource Records for the DNS Security Extensions
//!
//! [rfc1035]: https://datatracker.ietf.org/doc/html/rfc1035
//! [rfc2782]: https://datatracker.ietf.org/doc/html/rfc2782
//! [rfc3403]: https://datatracker.ietf.org/doc/html/rfc3403
//! [rfc4034]: https://datatracker.ietf.org/doc/html/rfc4034

pub mod config;
pub mod dispatch;
mod dns;
mod from_str;
mod io;
pub mod logger;
pub mod proxy;
pub mod resource;
pub mod rules;
pub mod server;
pub mod types;

#[macro_use]
extern crate num_derive;

#[macro_use]
extern crate lazy_static;

// Pull up the types most callers want.
#[doc(inline)]
pub use crate::types::*;

#[doc(inline)]
pub use crate::resource::*;

pub use crate::dispatch::Dispatcher;
pub use crate::dns::Query;
pub use crate::from_str::FromStrError;
pub use crate::proxy::Upstream;
pub use crate::rules::{Action, RuleTable, WILDCARD};

/// Returns early with a [`std::io::Error`] of the given kind.
#[macro_export]
macro_rules! bail {
    ($kind:ident, $($arg:tt)*) => {
        return Err(
            ::std::io::Error::new(::std::io::ErrorKind::$kind, format!($($arg)*))
        )
    };
}
