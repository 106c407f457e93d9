use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::warn;

use crate::entities::voter;
use crate::store::{VoterPatch, VoterStore};

use super::ApplyTally;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterFix {
    pub voter_id: i64,
    pub original: String,
    pub replacement: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegisterPlan {
    /// Register numbers shared by more than one voter
    pub duplicate_groups: usize,
    pub fixes: Vec<RegisterFix>,
}

impl RegisterPlan {
    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}

fn register_number(voter: &voter::Model) -> Option<&str> {
    voter
        .register_number
        .as_deref()
        .filter(|value| !value.trim().is_empty())
}

/// Suffixes every repeat of a register number with its position among the
/// repeats: the lowest id keeps `R`, later ids get `R-1`, `R-2`, ...
/// Blank and missing numbers are never considered duplicates.
pub fn plan_register_repair(snapshot: &[voter::Model]) -> RegisterPlan {
    let mut ordered: Vec<&voter::Model> = snapshot.iter().collect();
    ordered.sort_by_key(|voter| voter.id);

    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<i64>)> = Vec::new();
    for voter in ordered {
        let Some(number) = register_number(voter) else {
            continue;
        };
        match index.get(number) {
            Some(&slot) => groups[slot].1.push(voter.id),
            None => {
                index.insert(number, groups.len());
                groups.push((number, vec![voter.id]));
            }
        }
    }

    let mut plan = RegisterPlan::default();
    for (number, ids) in groups.into_iter().filter(|(_, ids)| ids.len() > 1) {
        plan.duplicate_groups += 1;
        for (position, voter_id) in ids.into_iter().enumerate().skip(1) {
            plan.fixes.push(RegisterFix {
                voter_id,
                original: number.to_string(),
                replacement: format!("{number}-{position}"),
            });
        }
    }
    plan
}

pub async fn apply_register_repair(store: &dyn VoterStore, plan: &RegisterPlan) -> ApplyTally {
    let mut tally = ApplyTally::default();
    for fix in &plan.fixes {
        let patch = VoterPatch::register_number(fix.replacement.clone());
        let ok = match store.update(fix.voter_id, &patch).await {
            Ok(Some(_)) => true,
            Ok(None) => {
                warn!(
                    "Voter {} disappeared before register number repair",
                    fix.voter_id
                );
                false
            }
            Err(err) => {
                warn!(
                    "Failed to set register number {} on voter {}: {err}",
                    fix.replacement, fix.voter_id
                );
                false
            }
        };
        tally.record(ok);
    }
    tally
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegisterAudit {
    pub total_rows: usize,
    /// Rows carrying a non-blank register number
    pub numbered_rows: usize,
    pub unique_numbers: usize,
}

impl RegisterAudit {
    pub fn residual_duplicates(&self) -> usize {
        self.numbered_rows - self.unique_numbers
    }

    pub fn is_clean(&self) -> bool {
        self.residual_duplicates() == 0
    }
}

pub fn audit_register_numbers(snapshot: &[voter::Model]) -> RegisterAudit {
    let numbers: Vec<&str> = snapshot.iter().filter_map(register_number).collect();
    let unique: HashSet<&str> = numbers.iter().copied().collect();
    RegisterAudit {
        total_rows: snapshot.len(),
        numbered_rows: numbers.len(),
        unique_numbers: unique.len(),
    }
}
