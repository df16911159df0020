//! The command line surface, rule-file loading, and construction of the rule
//! table the dispatcher runs with.

use crate::proxy::{ParseUpstreamError, Upstream};
use crate::rules::{Action, RuleTable, WILDCARD};
use crate::types::Type;
use clap::Parser;
use log::{info, warn};
use std::fs;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_NAMESERVER: &str = "8.8.8.8";
const DEFAULT_NAMESERVER_V6: &str = "2001:4860:4860::8888";

/// A configurable DNS proxy for penetration testers and malware analysts:
/// point a victim's resolver here, and decide which queries get cooked
/// records and which get real answers.
#[derive(Debug, Parser)]
#[command(name = "dnscook", version, about)]
pub struct Cli {
    /// IPv4 address used to cook matching 'A' queries
    #[arg(long, value_name = "192.0.2.1")]
    pub fakeip: Option<String>,

    /// IPv6 address used to cook matching 'AAAA' queries
    #[arg(long, value_name = "2001:db8::1")]
    pub fakeipv6: Option<String>,

    /// MX name used to cook matching 'MX' queries
    #[arg(long, value_name = "mail.fake.com")]
    pub fakemail: Option<String>,

    /// CNAME name used to cook matching 'CNAME' queries
    #[arg(long, value_name = "www.fake.com")]
    pub fakealias: Option<String>,

    /// NS name used to cook matching 'NS' queries
    #[arg(long, value_name = "ns.fake.com")]
    pub fakens: Option<String>,

    /// Comma-separated domains resolved to the fake values above; every
    /// other name gets its true value
    #[arg(long, value_name = "CSV")]
    pub fakedomains: Option<String>,

    /// Comma-separated domains resolved to their true values; every other
    /// name gets the fake values above
    #[arg(long, value_name = "CSV")]
    pub truedomains: Option<String>,

    /// Rule file with one [TYPE] section per record type, holding
    /// 'domain = spec' entries; entries override the flags above
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Comma-separated upstream resolvers, each host, host#port or
    /// host#port#tcp
    #[arg(long, value_name = "CSV")]
    pub nameservers: Option<String>,

    /// Listener bind address
    #[arg(short, long, value_name = "127.0.0.1 or ::1")]
    pub interface: Option<String>,

    /// Listener port
    #[arg(short, long, default_value_t = 53, value_name = "53")]
    pub port: u16,

    /// Serve TCP instead of UDP
    #[arg(short, long)]
    pub tcp: bool,

    /// Run in IPv6 mode
    #[arg(short = '6', long)]
    pub ipv6: bool,

    /// Append activity to this file as well as stdout
    #[arg(long, value_name = "FILE")]
    pub logfile: Option<PathBuf>,

    /// Don't print the banner
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("--fakedomains and --truedomains can not be used together")]
    ExclusiveDomainLists,

    #[error("--fakedomains and --truedomains need at least one fake value to cook with")]
    NoCookedValue,

    #[error("invalid interface address '{0}'")]
    InvalidInterface(String),

    #[error(transparent)]
    InvalidNameserver(#[from] ParseUpstreamError),

    #[error("can not read rule file: {0}")]
    RuleFile(#[from] io::Error),
}

/// Everything the core needs, frozen before the listener starts.
pub struct Config {
    pub rules: RuleTable,
    pub upstreams: Vec<Upstream>,
    pub listen: SocketAddr,
    pub tcp: bool,
    pub ipv6: bool,
}

impl Config {
    /// Validates the flags and builds the rule table. The narration goes
    /// through the logger, so a `--logfile` also records how the table was
    /// put together.
    pub fn from_cli(cli: &Cli) -> Result<Config, ConfigError> {
        let globals = Self::globals(cli);

        if cli.fakedomains.is_some() && cli.truedomains.is_some() {
            return Err(ConfigError::ExclusiveDomainLists);
        }
        if (cli.fakedomains.is_some() || cli.truedomains.is_some()) && globals.is_empty() {
            return Err(ConfigError::NoCookedValue);
        }

        let mut rules = RuleTable::new();

        if let Some(domains) = &cli.fakedomains {
            // Whitelist mode: cook only the listed domains.
            for domain in split_csv(domains) {
                for (r#type, value) in &globals {
                    rules.insert(*r#type, &domain, Action::Cook(value.clone()));
                    info!(
                        "cooking {} replies to point to {} matching: {}",
                        r#type, value, domain
                    );
                }
            }
        } else if let Some(domains) = &cli.truedomains {
            // Blacklist mode: the listed domains keep their true answers,
            // everything else is cooked via the universal pattern.
            for domain in split_csv(domains) {
                for (r#type, value) in &globals {
                    rules.insert(*r#type, &domain, Action::Forward);
                    rules.insert(*r#type, WILDCARD, Action::Cook(value.clone()));
                    info!(
                        "cooking {} replies to point to {} not matching: {}",
                        r#type, value, domain
                    );
                }
            }
        } else {
            for (r#type, value) in &globals {
                rules.insert(*r#type, WILDCARD, Action::Cook(value.clone()));
                info!("cooking all {} replies to point to {}", r#type, value);
            }
        }

        // The rule file lands last, so its entries override the flags.
        if let Some(path) = &cli.file {
            let text = fs::read_to_string(path)?;
            apply_rule_file(&text, &mut rules);
        }

        if rules.is_empty() {
            info!("no fake records given, running in full proxy mode");
        }

        let upstreams = Self::upstreams(cli)?;
        info!(
            "using the following nameservers: {}",
            upstreams
                .iter()
                .map(|u| u.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Config {
            rules,
            upstreams,
            listen: Self::listen(cli)?,
            tcp: cli.tcp,
            ipv6: cli.ipv6,
        })
    }

    /// The per-type global cooked values, in the order the flags are listed.
    fn globals(cli: &Cli) -> Vec<(Type, String)> {
        [
            (Type::A, &cli.fakeip),
            (Type::AAAA, &cli.fakeipv6),
            (Type::MX, &cli.fakemail),
            (Type::CNAME, &cli.fakealias),
            (Type::NS, &cli.fakens),
        ]
        .into_iter()
        .filter_map(|(r#type, value)| value.as_ref().map(|v| (r#type, v.clone())))
        .collect()
    }

    fn upstreams(cli: &Cli) -> Result<Vec<Upstream>, ConfigError> {
        let default = if cli.ipv6 {
            DEFAULT_NAMESERVER_V6
        } else {
            DEFAULT_NAMESERVER
        };
        let csv = cli.nameservers.as_deref().unwrap_or(default);

        let mut upstreams = Vec::new();
        for entry in split_csv(csv) {
            upstreams.push(Upstream::from_str(&entry)?);
        }
        Ok(upstreams)
    }

    fn listen(cli: &Cli) -> Result<SocketAddr, ConfigError> {
        let default = if cli.ipv6 { "::1" } else { "127.0.0.1" };
        let interface = cli.interface.as_deref().unwrap_or(default);

        let ip: IpAddr = interface
            .parse()
            .map_err(|_| ConfigError::InvalidInterface(interface.to_string()))?;

        Ok(SocketAddr::new(ip, cli.port))
    }
}

/// Comma-separated, whitespace tolerant; empty entries are dropped.
fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|entry| entry.trim().to_lowercase())
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Applies an INI-style rule file: `[TYPE]` sections, `domain = spec`
/// entries, `;` or `#` comments. Unknown sections are skipped with a
/// warning, they never abort startup.
fn apply_rule_file(text: &str, rules: &mut RuleTable) {
    let mut section: Option<Type> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim();
            section = match Type::from_str(name) {
                Ok(Type::ANY) | Err(_) => {
                    warn!(
                        "DNS record type '{}' is not supported, ignoring section contents",
                        name
                    );
                    None
                }
                Ok(r#type) => Some(r#type),
            };
            continue;
        }

        let (domain, spec) = match line.split_once('=') {
            Some((domain, spec)) => (domain.trim().to_lowercase(), spec.trim().to_string()),
            None => {
                warn!("ignoring malformed rule line '{}'", line);
                continue;
            }
        };

        if let Some(r#type) = section {
            info!(
                "cooking {} replies for domain {} with '{}'",
                r#type, domain, spec
            );
            rules.insert(r#type, &domain, Action::Cook(spec));
        }
    }
}
