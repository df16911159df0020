//! Talks to the real resolvers, for everything the rule table doesn't cook.

use rand::seq::SliceRandom;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time;

/// Hard deadline for one complete upstream exchange.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Protocol {
    Udp,
    Tcp,
}

/// One upstream resolver, as given with `--nameservers`.
#[derive(Clone, Debug, PartialEq)]
pub struct Upstream {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
}

#[derive(Error, Debug, PartialEq)]
pub enum ParseUpstreamError {
    #[error("missing nameserver host")]
    MissingHost,

    #[error("invalid nameserver port '{0}'")]
    InvalidPort(String),

    #[error("unknown nameserver protocol '{0}'")]
    InvalidProtocol(String),
}

/// Parses `host`, `host#port` or `host#port#tcp`. The port defaults to 53
/// and the protocol to udp.
impl FromStr for Upstream {
    type Err = ParseUpstreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('#');

        let host = parts.next().unwrap_or("").to_string();
        if host.is_empty() {
            return Err(ParseUpstreamError::MissingHost);
        }

        let port = match parts.next() {
            Some(p) => p
                .parse()
                .map_err(|_| ParseUpstreamError::InvalidPort(p.to_string()))?,
            None => 53,
        };

        let protocol = match parts.next() {
            Some("udp") | None => Protocol::Udp,
            Some("tcp") => Protocol::Tcp,
            Some(p) => return Err(ParseUpstreamError::InvalidProtocol(p.to_string())),
        };

        Ok(Upstream {
            host,
            port,
            protocol,
        })
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.protocol {
            Protocol::Udp => write!(f, "{}#{}", self.host, self.port),
            Protocol::Tcp => write!(f, "{}#{}#tcp", self.host, self.port),
        }
    }
}

/// Picks one resolver uniformly at random, from the thread-local generator.
/// Safe to call from any number of handler tasks at once.
pub fn choose(upstreams: &[Upstream]) -> Option<&Upstream> {
    upstreams.choose(&mut rand::thread_rng())
}

/// Sends the original request bytes to `upstream` and returns the reply
/// bytes, all within [`UPSTREAM_TIMEOUT`].
///
/// `ipv6` selects the local address family for the UDP socket, matching the
/// listener's mode.
pub async fn forward(request: &[u8], upstream: &Upstream, ipv6: bool) -> io::Result<Vec<u8>> {
    match time::timeout(UPSTREAM_TIMEOUT, exchange(request, upstream, ipv6)).await {
        Ok(reply) => reply,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no reply within {} seconds", UPSTREAM_TIMEOUT.as_secs()),
        )),
    }
}

async fn exchange(request: &[u8], upstream: &Upstream, ipv6: bool) -> io::Result<Vec<u8>> {
    match upstream.protocol {
        Protocol::Udp => {
            let bind = if ipv6 { "[::]:0" } else { "0.0.0.0:0" };
            let socket = UdpSocket::bind(bind).await?;
            socket
                .send_to(request, (upstream.host.as_str(), upstream.port))
                .await?;

            let mut reply = vec![0; 4096];
            let (len, _) = socket.recv_from(&mut reply).await?;
            reply.truncate(len);

            Ok(reply)
        }

        Protocol::Tcp => {
            let mut stream =
                TcpStream::connect((upstream.host.as_str(), upstream.port)).await?;

            // Two byte length prefix followed by the message.
            stream.write_all(&(request.len() as u16).to_be_bytes()).await?;
            stream.write_all(request).await?;

            // The reply comes back framed the same way; strip the prefix.
            let mut len = [0; 2];
            stream.read_exact(&mut len).await?;

            let mut reply = vec![0; u16::from_be_bytes(len).into()];
            stream.read_exact(&mut reply).await?;

            Ok(reply)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_host_only() {
        assert_eq!(
            "8.8.8.8".parse(),
            Ok(Upstream {
                host: "8.8.8.8".to_string(),
                port: 53,
                protocol: Protocol::Udp,
            })
        );
    }

    #[test]
    fn test_parse_host_and_port() {
        assert_eq!(
            "4.2.2.1#5353".parse(),
            Ok(Upstream {
                host: "4.2.2.1".to_string(),
                port: 5353,
                protocol: Protocol::Udp,
            })
        );
    }

    #[test]
    fn test_parse_host_port_and_protocol() {
        assert_eq!(
            "1.1.1.1#53#tcp".parse(),
            Ok(Upstream {
                host: "1.1.1.1".to_string(),
                port: 53,
                protocol: Protocol::Tcp,
            })
        );
    }

    #[test]
    fn test_parse_ipv6_host() {
        assert_eq!(
            "2001:4860:4860::8888".parse(),
            Ok(Upstream {
                host: "2001:4860:4860::8888".to_string(),
                port: 53,
                protocol: Protocol::Udp,
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Upstream::from_str(""),
            Err(ParseUpstreamError::MissingHost)
        );
        assert_eq!(
            Upstream::from_str("8.8.8.8#fifty-three"),
            Err(ParseUpstreamError::InvalidPort("fifty-three".to_string()))
        );
        assert_eq!(
            Upstream::from_str("8.8.8.8#53#doh"),
            Err(ParseUpstreamError::InvalidProtocol("doh".to_string()))
        );
    }

    #[test]
    fn test_display_round_trips() {
        for spec in ["8.8.8.8#53", "4.2.2.1#5353#tcp"] {
            let upstream: Upstream = spec.parse().unwrap();
            assert_eq!(upstream.to_string(), spec);
        }
    }

    #[test]
    fn test_choose_from_empty_list() {
        assert_eq!(choose(&[]), None);
    }
}
