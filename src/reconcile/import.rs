use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::config::ImportConfig;
use crate::entities::voter;
use crate::store::{VoterPatch, VoterStore};

use super::ApplyTally;

/// One spreadsheet row, reduced to the configured columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub external_id: Option<String>,
    pub family: Option<String>,
    pub classification: Option<String>,
}

impl ImportRow {
    /// Picks the id, family and classification cells out of a raw row.
    /// Missing or blank cells become `None`.
    pub fn from_cells(cells: &[Option<String>], columns: &ImportConfig) -> Self {
        let cell = |index: usize| {
            cells
                .get(index)
                .cloned()
                .flatten()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            external_id: cell(columns.id_column),
            family: cell(columns.family_column),
            classification: cell(columns.classification_column),
        }
    }
}

/// Converts raw sheet rows, skipping the configured header rows.
pub fn rows_from_cells(rows: &[Vec<Option<String>>], columns: &ImportConfig) -> Vec<ImportRow> {
    rows.iter()
        .skip(columns.header_rows)
        .map(|cells| ImportRow::from_cells(cells, columns))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentUpdate {
    pub voter_id: i64,
    pub original_id: i64,
    pub family: Option<String>,
    pub classification: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportPlan {
    pub updates: Vec<EnrichmentUpdate>,
    /// Rows with an id that matches no voter
    pub unmatched: usize,
    /// Rows without an id
    pub skipped: usize,
}

impl ImportPlan {
    pub fn matched(&self) -> usize {
        self.updates.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub matched: usize,
    pub unmatched: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Matches rows to voters on `original_id`.
///
/// When `original_id` is not unique the lowest-id voter receives the update.
/// Ids that do not parse as integers can never match and count as unmatched.
pub fn plan_import(rows: &[ImportRow], snapshot: &[voter::Model]) -> ImportPlan {
    let mut ordered: Vec<&voter::Model> = snapshot.iter().collect();
    ordered.sort_by_key(|voter| voter.id);

    let mut by_original_id: HashMap<i64, &voter::Model> = HashMap::with_capacity(ordered.len());
    for voter in ordered {
        by_original_id.entry(voter.original_id).or_insert(voter);
    }

    let mut plan = ImportPlan::default();
    for row in rows {
        let Some(external_id) = row.external_id.as_deref() else {
            plan.skipped += 1;
            continue;
        };

        let target = parse_external_id(external_id).and_then(|id| by_original_id.get(&id));
        match target {
            Some(voter) => plan.updates.push(EnrichmentUpdate {
                voter_id: voter.id,
                original_id: voter.original_id,
                family: row.family.clone(),
                classification: row.classification.clone(),
            }),
            None => plan.unmatched += 1,
        }
    }
    plan
}

/// Spreadsheet ids may come through as `"42"` or `"42.0"`.
fn parse_external_id(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    let float = trimmed.parse::<f64>().ok()?;
    if float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        Some(float as i64)
    } else {
        None
    }
}

pub async fn apply_import(store: &dyn VoterStore, plan: &ImportPlan) -> ImportReport {
    let mut tally = ApplyTally::default();
    for update in &plan.updates {
        let patch = VoterPatch::enrichment(update.family.clone(), update.classification.clone());
        let ok = match store.update(update.voter_id, &patch).await {
            Ok(Some(_)) => true,
            Ok(None) => {
                warn!("Voter {} disappeared before enrichment", update.voter_id);
                false
            }
            Err(err) => {
                warn!("Failed to enrich voter {}: {err}", update.voter_id);
                false
            }
        };
        tally.record(ok);
    }

    ImportReport {
        matched: plan.matched(),
        unmatched: plan.unmatched,
        skipped: plan.skipped,
        succeeded: tally.succeeded,
        failed: tally.failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryStore, sample_voter};

    fn row(id: Option<&str>, family: Option<&str>, classification: Option<&str>) -> ImportRow {
        ImportRow {
            external_id: id.map(str::to_string),
            family: family.map(str::to_string),
            classification: classification.map(str::to_string),
        }
    }

    fn snapshot() -> Vec<voter::Model> {
        vec![
            sample_voter(1, 10, "Ali", Some("Hasan")),
            sample_voter(2, 11, "Maya", Some("Nabil")),
        ]
    }

    #[test]
    fn unknown_id_is_unmatched_without_update() {
        let plan = plan_import(&[row(Some("99"), Some("Haddad"), Some("A"))], &snapshot());
        assert!(plan.updates.is_empty());
        assert_eq!(plan.unmatched, 1);
    }

    #[test]
    fn blank_cells_map_to_null() {
        let columns = ImportConfig::default();
        let cells = vec![Some("10".to_string()), Some("   ".to_string()), None];
        let parsed = ImportRow::from_cells(&cells, &columns);
        assert_eq!(parsed.family, None);
        assert_eq!(parsed.classification, None);

        let plan = plan_import(&[parsed], &snapshot());
        assert_eq!(
            plan.updates,
            vec![EnrichmentUpdate {
                voter_id: 1,
                original_id: 10,
                family: None,
                classification: None,
            }]
        );
    }

    #[test]
    fn rows_without_id_are_skipped() {
        let plan = plan_import(&[row(None, Some("Haddad"), None)], &snapshot());
        assert_eq!(plan.skipped, 1);
        assert_eq!(plan.unmatched, 0);
        assert!(plan.updates.is_empty());
    }

    #[test]
    fn float_rendered_ids_match() {
        let plan = plan_import(&[row(Some("11.0"), Some("Saleh"), Some("B"))], &snapshot());
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].voter_id, 2);
        assert_eq!(parse_external_id("11.5"), None);
        assert_eq!(parse_external_id("abc"), None);
    }

    #[test]
    fn duplicated_original_id_targets_lowest_id() {
        let mut rows = snapshot();
        rows.push(sample_voter(7, 11, "Maya", Some("Nabil")));
        rows.reverse();
        let plan = plan_import(&[row(Some("11"), None, None)], &rows);
        assert_eq!(plan.updates[0].voter_id, 2);
    }

    #[test]
    fn header_rows_are_skipped() {
        let columns = ImportConfig::default();
        let sheet = vec![
            vec![Some("ID".to_string()), Some("Family".to_string())],
            vec![Some("10".to_string()), Some("Haddad".to_string())],
        ];
        let rows = rows_from_cells(&sheet, &columns);
        assert_eq!(rows, vec![row(Some("10"), Some("Haddad"), None)]);
    }

    #[tokio::test]
    async fn apply_counts_failures_and_continues() {
        let store = MemoryStore::with_rows(snapshot());
        store.fail_update_of(1);
        let plan = plan_import(
            &[
                row(Some("10"), Some("Haddad"), Some("A")),
                row(Some("11"), Some("Saleh"), None),
                row(Some("12"), Some("Nobody"), None),
            ],
            &store.rows(),
        );

        let report = apply_import(&store, &plan).await;

        assert_eq!(
            report,
            ImportReport {
                matched: 2,
                unmatched: 1,
                skipped: 0,
                succeeded: 1,
                failed: 1,
            }
        );
        let rows = store.rows();
        assert_eq!(rows[0].family, None);
        assert_eq!(rows[1].family.as_deref(), Some("Saleh"));
        assert_eq!(rows[1].classification, None);
    }
}
