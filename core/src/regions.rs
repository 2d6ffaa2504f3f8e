//! Region and team-tier lookup tables.
//!
//! Both tables are configuration data (see `data/regions.json` and
//! `data/tiers.json`). The engines never hardcode territory names or
//! tier ordering; they only ask these tables for a classification.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Regions ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionEntry {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionTable {
    #[serde(default)]
    pub regions: Vec<RegionEntry>,
    /// Alternate spellings → canonical region name.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

/// How two regions relate, best match first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionMatch {
    Exact,
    Sibling,
    Parent,
    Global,
    Unknown,
}

impl RegionMatch {
    pub fn label(&self) -> &'static str {
        match self {
            RegionMatch::Exact   => "exact",
            RegionMatch::Sibling => "sibling",
            RegionMatch::Parent  => "parent",
            RegionMatch::Global  => "global",
            RegionMatch::Unknown => "unknown",
        }
    }
}

/// Case-insensitive index over a `RegionTable`, built once per run.
#[derive(Debug, Clone)]
pub struct RegionIndex {
    parents: HashMap<String, Option<String>>,
    aliases: HashMap<String, String>,
}

const MAX_REGION_DEPTH: usize = 16;

fn key(s: &str) -> String {
    s.trim().to_lowercase()
}

impl RegionIndex {
    pub fn new(table: &RegionTable) -> Self {
        let parents = table
            .regions
            .iter()
            .map(|r| (key(&r.name), r.parent.as_deref().map(key)))
            .collect();
        let aliases = table
            .aliases
            .iter()
            .map(|(alias, canonical)| (key(alias), key(canonical)))
            .collect();
        Self { parents, aliases }
    }

    /// Canonical lowercase name, or None if the region is not in the table.
    pub fn resolve(&self, region: &str) -> Option<String> {
        let k = key(region);
        if k.is_empty() {
            return None;
        }
        let canonical = self.aliases.get(&k).cloned().unwrap_or(k);
        self.parents.contains_key(&canonical).then_some(canonical)
    }

    pub fn is_known(&self, region: &str) -> bool {
        self.resolve(region).is_some()
    }

    fn parent_of(&self, canonical: &str) -> Option<&str> {
        self.parents.get(canonical).and_then(|p| p.as_deref())
    }

    fn is_ancestor(&self, ancestor: &str, of: &str) -> bool {
        let mut current = self.parent_of(of);
        for _ in 0..MAX_REGION_DEPTH {
            match current {
                Some(p) if p == ancestor => return true,
                Some(p) => current = self.parent_of(p),
                None => return false,
            }
        }
        false
    }

    /// Classify the relationship between an account's region and a rep's.
    pub fn classify(&self, account_region: &str, rep_region: &str) -> RegionMatch {
        let (a, b) = match (self.resolve(account_region), self.resolve(rep_region)) {
            (Some(a), Some(b)) => (a, b),
            _ => return RegionMatch::Unknown,
        };
        if a == b {
            return RegionMatch::Exact;
        }
        match (self.parent_of(&a), self.parent_of(&b)) {
            (Some(pa), Some(pb)) if pa == pb => return RegionMatch::Sibling,
            _ => {}
        }
        if self.is_ancestor(&a, &b) || self.is_ancestor(&b, &a) {
            RegionMatch::Parent
        } else {
            RegionMatch::Global
        }
    }
}

// ── Team tiers ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierEntry {
    pub name: String,
    /// Smallest employee count that lands an account in this tier.
    #[serde(default)]
    pub min_employees: Option<u64>,
}

/// Team-size tiers ordered smallest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
    #[serde(default)]
    pub tiers: Vec<TierEntry>,
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl TierTable {
    /// 1-based rank of a tier, or None if unknown.
    pub fn rank(&self, tier: &str) -> Option<usize> {
        let k = key(tier);
        if k.is_empty() {
            return None;
        }
        let canonical = self
            .aliases
            .iter()
            .find(|(alias, _)| key(alias) == k)
            .map(|(_, c)| key(c))
            .unwrap_or(k);
        self.tiers
            .iter()
            .position(|t| key(&t.name) == canonical)
            .map(|i| i + 1)
    }

    /// Derive a tier from an employee count using the breakpoints.
    pub fn tier_for_employees(&self, employees: u64) -> Option<String> {
        self.tiers
            .iter()
            .filter(|t| t.min_employees.is_some_and(|min| employees >= min))
            .last()
            .map(|t| t.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RegionTable {
        let entry = |name: &str, parent: Option<&str>| RegionEntry {
            name: name.into(),
            parent: parent.map(Into::into),
        };
        RegionTable {
            regions: vec![
                entry("Global", None),
                entry("AMER", Some("Global")),
                entry("EMEA", Some("Global")),
                entry("East", Some("AMER")),
                entry("West", Some("AMER")),
                entry("UKI", Some("EMEA")),
            ],
            aliases: [("US East".to_string(), "East".to_string())].into_iter().collect(),
        }
    }

    #[test]
    fn classifies_region_pairs() {
        let idx = RegionIndex::new(&table());
        assert_eq!(idx.classify("East", "east"), RegionMatch::Exact);
        assert_eq!(idx.classify("US East", "East"), RegionMatch::Exact);
        assert_eq!(idx.classify("East", "West"), RegionMatch::Sibling);
        assert_eq!(idx.classify("East", "AMER"), RegionMatch::Parent);
        assert_eq!(idx.classify("East", "UKI"), RegionMatch::Global);
        assert_eq!(idx.classify("East", "Atlantis"), RegionMatch::Unknown);
        assert_eq!(idx.classify("", "East"), RegionMatch::Unknown);
    }
}
