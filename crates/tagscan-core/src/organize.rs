//! Ordering and grouping of scan results for presentation.

use crate::types::{Finding, Weight};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sort key used for tags with no configured weight.
pub const UNWEIGHTED: &str = "No title";

/// A run of adjacent findings sharing one tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagGroup {
    pub tag: String,
    pub findings: Vec<Finding>,
}

impl TagGroup {
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Sort findings by tag weight, then priority, and group adjacent equal tags.
///
/// Weights are looked up by upper-cased tag and compared as strings. The sort
/// is stable, so findings with equal keys keep their input order. Grouping
/// happens after sorting: two tags with the same weight string may interleave
/// and then produce several groups each.
pub fn organize(findings: Vec<Finding>, weights: &BTreeMap<String, Weight>) -> Vec<TagGroup> {
    let mut keyed: Vec<(String, Finding)> = findings
        .into_iter()
        .map(|finding| {
            let key = weights
                .get(&finding.tag.to_uppercase())
                .map(Weight::sort_key)
                .unwrap_or_else(|| UNWEIGHTED.to_string());
            (key, finding)
        })
        .collect();
    keyed.sort_by(|(a_key, a), (b_key, b)| a_key.cmp(b_key).then(a.priority.cmp(&b.priority)));

    let mut groups: Vec<TagGroup> = Vec::new();
    for (_, finding) in keyed {
        match groups.last_mut() {
            Some(group) if group.tag == finding.tag => group.findings.push(finding),
            _ => groups.push(TagGroup {
                tag: finding.tag.clone(),
                findings: vec![finding],
            }),
        }
    }
    groups
}
