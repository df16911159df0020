//! The rule table, and the name matcher that decides which cooked record, if
//! any, answers a query.

use crate::types::Type;
use std::collections::BTreeMap;

/// Reserved pattern matching any query name.
pub const WILDCARD: &str = "*.*.*.*.*.*.*.*.*.*";

/// What to do with a query whose name matched a pattern.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Answer with a record cooked from this spec string.
    Cook(String),

    /// Match, but hand the query to an upstream anyway. This is how
    /// truedomains mode punches holes into an otherwise all-cooking table.
    Forward,
}

#[derive(Clone, Debug)]
struct Rule {
    pattern: String,

    /// Pattern labels, TLD first, ready for label-wise comparison.
    labels: Vec<String>,

    /// How many labels are `*`. Fewer wildcards means more specific, and the
    /// all-wildcard [`WILDCARD`] pattern loses every tie.
    wildcards: usize,

    action: Action,
}

/// The patterns for one record type, held most-specific first.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Adds a pattern, replacing an earlier entry for the same pattern so
    /// that later sources (the rule file) override earlier ones.
    fn insert(&mut self, pattern: &str, action: Action) {
        let pattern = pattern.trim().to_lowercase();
        let labels: Vec<String> = pattern.split('.').rev().map(str::to_string).collect();
        let wildcards = labels.iter().filter(|l| *l == "*").count();

        let rule = Rule {
            pattern,
            labels,
            wildcards,
            action,
        };

        match self.rules.iter_mut().find(|r| r.pattern == rule.pattern) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }

        // Most specific first: fewest wildcard labels, then the longest
        // pattern, with the pattern text as a stable tiebreak. Insertion
        // order never decides a match.
        self.rules.sort_by(|a, b| {
            a.wildcards
                .cmp(&b.wildcards)
                .then(b.labels.len().cmp(&a.labels.len()))
                .then(a.pattern.cmp(&b.pattern))
        });
    }

    /// Returns the action of the first (most specific) matching pattern.
    ///
    /// `qlabels` is the query name already lowercased, split on `.` and
    /// reversed so the TLD comes first.
    pub fn find(&self, qlabels: &[&str]) -> Option<&Action> {
        self.rules
            .iter()
            .find(|rule| matches(&rule.labels, qlabels))
            .map(|rule| &rule.action)
    }
}

/// Label-wise comparison, TLD first. A `*` pattern label matches any query
/// label. A pattern may span fewer labels than the query, so `google.com`
/// also covers `www.google.com`; it may span more only when every surplus
/// label is `*`, which is what lets [`WILDCARD`] match everything.
fn matches(pattern: &[String], query: &[&str]) -> bool {
    if pattern.len() > query.len() && pattern[query.len()..].iter().any(|l| l != "*") {
        return false;
    }

    pattern.iter().zip(query).all(|(p, q)| p == "*" || p == q)
}

/// Per record type, the patterns and cooked-answer specs in effect for one
/// run of the proxy.
///
/// Built once at startup and only read afterwards, so handler tasks share it
/// without any locking.
#[derive(Clone, Debug, Default)]
pub struct RuleTable {
    map: BTreeMap<Type, RuleSet>,
}

impl RuleTable {
    pub fn new() -> RuleTable {
        RuleTable::default()
    }

    /// Adds one `(type, pattern) -> action` entry. The pattern is trimmed
    /// and lowercased; a later insert for the same pair replaces the action.
    pub fn insert(&mut self, r#type: Type, pattern: &str, action: Action) {
        self.map.entry(r#type).or_default().insert(pattern, action);
    }

    /// True when no rules were configured at all (pure-forward mode).
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Matches `name` against every record type's patterns, in ascending
    /// numeric type order. The same order decides the answer order of an ANY
    /// expansion.
    pub fn lookup(&self, name: &str) -> Vec<(Type, Option<&Action>)> {
        let name = name.to_lowercase();
        let qlabels: Vec<&str> = name.split('.').rev().collect();

        self.map
            .iter()
            .map(|(r#type, set)| (*r#type, set.find(&qlabels)))
            .collect()
    }
}
