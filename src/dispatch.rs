//! Per-query decision making: cook the answer, expand an ANY query, or hand
//! the request to an upstream resolver.

use crate::dns::{self, Query};
use crate::proxy::{self, Upstream};
use crate::resource::Resource;
use crate::rules::{Action, RuleTable};
use crate::types::{type_name, Type, QR};
use log::{info, warn};
use num_traits::FromPrimitive;
use std::net::SocketAddr;

/// Owns the read-only state a query needs: the rule table and the upstream
/// list. One instance is shared by every handler task.
pub struct Dispatcher {
    rules: RuleTable,
    upstreams: Vec<Upstream>,
    ipv6: bool,
}

impl Dispatcher {
    pub fn new(rules: RuleTable, upstreams: Vec<Upstream>, ipv6: bool) -> Dispatcher {
        Dispatcher {
            rules,
            upstreams,
            ipv6,
        }
    }

    /// Handles one request and returns the response bytes, or `None` when
    /// the query is dropped: malformed, failed to cook, or the upstream
    /// never answered. The caller sends nothing back in that case, retrying
    /// is the client's business.
    pub async fn dispatch(&self, request: &[u8], peer: SocketAddr) -> Option<Vec<u8>> {
        let query = match Query::from_slice(request) {
            Ok(query) => query,
            Err(_) => {
                warn!("{}: invalid DNS request", peer.ip());
                return None;
            }
        };

        // Only process queries; anything else is silently dropped.
        if query.qr != QR::Query {
            return None;
        }

        let matches = self.rules.lookup(&query.name);
        let qtype = Type::from_u16(query.qtype);

        // A concrete spec for the asked type wins outright.
        if let Some(t) = qtype.filter(|t| *t != Type::ANY) {
            let found = matches
                .iter()
                .find(|(r#type, _)| *r#type == t)
                .and_then(|(_, action)| *action);

            if let Some(Action::Cook(spec)) = found {
                info!(
                    "{}: cooking the response of type '{}' for {} to {}",
                    peer.ip(),
                    t,
                    query.name,
                    spec
                );
                return self.cook(&query, &[(t, spec.as_str())], peer);
            }
        }

        // An ANY query is cooked only when every configured type matched the
        // name; one missing sub-map and the whole query goes upstream.
        if qtype == Some(Type::ANY)
            && !matches.is_empty()
            && matches.iter().all(|(_, action)| action.is_some())
        {
            let records: Vec<(Type, &str)> = matches
                .iter()
                .filter_map(|(r#type, action)| match action {
                    Some(Action::Cook(spec)) => Some((*r#type, spec.as_str())),
                    _ => None,
                })
                .collect();

            info!(
                "{}: cooking the response of type 'ANY' for {} with all known records",
                peer.ip(),
                query.name
            );
            return self.cook(&query, &records, peer);
        }

        // No concrete spec (or a negative match) for this type: proxy.
        self.proxy(request, &query, peer).await
    }

    /// Synthesizes a cooked response, one answer per `(type, spec)` pair. A
    /// spec that fails to parse drops the whole query.
    fn cook(&self, query: &Query, records: &[(Type, &str)], peer: SocketAddr) -> Option<Vec<u8>> {
        let mut answers = Vec::with_capacity(records.len());
        for (r#type, spec) in records {
            match Resource::from_spec(*r#type, spec) {
                Ok(resource) => answers.push(resource),
                Err(e) => {
                    warn!(
                        "{}: dropping query for {}: bad {} spec '{}': {}",
                        peer.ip(),
                        query.name,
                        r#type,
                        spec,
                        e
                    );
                    return None;
                }
            }
        }

        match dns::build_response(query, &answers) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!("{}: dropping query for {}: {}", peer.ip(), query.name, e);
                None
            }
        }
    }

    async fn proxy(&self, request: &[u8], query: &Query, peer: SocketAddr) -> Option<Vec<u8>> {
        let upstream = match proxy::choose(&self.upstreams) {
            Some(upstream) => upstream,
            None => {
                warn!(
                    "{}: no nameservers to proxy the query for {} to",
                    peer.ip(),
                    query.name
                );
                return None;
            }
        };

        info!(
            "{}: proxying the response of type '{}' for {}",
            peer.ip(),
            type_name(query.qtype),
            query.name
        );

        match proxy::forward(request, upstream, self.ipv6).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!(
                    "{}: could not proxy request to {}: {}",
                    peer.ip(),
                    upstream,
                    e
                );
                None
            }
        }
    }
}
