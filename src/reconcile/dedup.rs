use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::entities::voter;
use crate::store::VoterStore;

/// Normalized `(full_name, father_name)` pair; a missing father name is empty.
pub fn identity_key(voter: &voter::Model) -> (String, String) {
    let normalize = |value: &str| value.trim().to_lowercase();
    (
        normalize(&voter.full_name),
        normalize(voter.father_name.as_deref().unwrap_or_default()),
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub full_name: String,
    pub father_name: String,
    /// Lowest id of the group; retained
    pub canonical: i64,
    /// Remaining ids in ascending order; deleted
    pub duplicates: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupPlan {
    pub groups: Vec<DuplicateGroup>,
}

impl DedupPlan {
    pub fn deletions(&self) -> Vec<i64> {
        self.groups
            .iter()
            .flat_map(|group| group.duplicates.iter().copied())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Groups the snapshot by [`identity_key`]. Groups are reported in order of
/// their canonical id.
pub fn plan_dedup(snapshot: &[voter::Model]) -> DedupPlan {
    let mut ordered: Vec<&voter::Model> = snapshot.iter().collect();
    ordered.sort_by_key(|voter| voter.id);

    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut members: Vec<((String, String), Vec<i64>)> = Vec::new();
    for voter in ordered {
        let key = identity_key(voter);
        match index.get(&key) {
            Some(&slot) => members[slot].1.push(voter.id),
            None => {
                index.insert(key.clone(), members.len());
                members.push((key, vec![voter.id]));
            }
        }
    }

    let groups = members
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((full_name, father_name), ids)| DuplicateGroup {
            full_name,
            father_name,
            canonical: ids[0],
            duplicates: ids[1..].to_vec(),
        })
        .collect();

    DedupPlan { groups }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub requested: usize,
    pub deleted: u64,
    pub failed_batches: usize,
    /// Ids of the batches that failed
    pub failed_ids: Vec<i64>,
}

/// Deletes the plan's duplicates in `batch_size` chunks. A failed batch is
/// logged and skipped; nothing is rolled back.
pub async fn apply_dedup(
    store: &dyn VoterStore,
    plan: &DedupPlan,
    batch_size: usize,
) -> DeleteReport {
    assert!(batch_size > 0, "Delete batch size must be positive");

    let deletions = plan.deletions();
    let mut report = DeleteReport {
        requested: deletions.len(),
        ..DeleteReport::default()
    };

    for (number, batch) in deletions.chunks(batch_size).enumerate() {
        match store.delete_ids(batch).await {
            Ok(removed) => {
                report.deleted += removed;
                info!("Deleted batch {} ({removed} voters)", number + 1);
            }
            Err(err) => {
                warn!(
                    "Failed to delete batch {} (ids {:?}): {err}",
                    number + 1,
                    batch
                );
                report.failed_batches += 1;
                report.failed_ids.extend_from_slice(batch);
            }
        }
    }

    report
}
