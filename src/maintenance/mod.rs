//! Operator-driven runs of the reconciliation procedures.
//!
//! Every run loads a full snapshot (fatal on failure), prints the plan, asks
//! the [`Confirm`] gate, applies, then re-reads the table to verify.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::config::MaintenanceConfig;
use crate::entities::voter;
use crate::reconcile::ApplyTally;
use crate::reconcile::dedup::{DeleteReport, apply_dedup, plan_dedup};
use crate::reconcile::import::{ImportReport, ImportRow, apply_import, plan_import};
use crate::reconcile::register::{
    RegisterAudit, apply_register_repair, audit_register_numbers, plan_register_repair,
};
use crate::store::{VoterFilter, VoterStore, fetch_all};

mod confirm;

pub use confirm::{AssumeYes, Confirm, DryRun, StdinConfirm};

/// How many plan lines to echo before summarising the rest.
const PREVIEW_LINES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<R> {
    NothingToDo,
    Declined,
    Applied(R),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DedupReport {
    pub duplicate_groups: usize,
    pub deletion: DeleteReport,
    pub count_before: u64,
    pub count_after: u64,
}

impl DedupReport {
    pub fn removed(&self) -> u64 {
        self.count_before.saturating_sub(self.count_after)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegisterReport {
    pub duplicate_groups: usize,
    pub tally: ApplyTally,
    pub audit: RegisterAudit,
}

pub struct Maintenance<'a> {
    store: &'a dyn VoterStore,
    confirm: &'a dyn Confirm,
    config: &'a MaintenanceConfig,
}

impl<'a> Maintenance<'a> {
    pub fn new(
        store: &'a dyn VoterStore,
        confirm: &'a dyn Confirm,
        config: &'a MaintenanceConfig,
    ) -> Self {
        Self {
            store,
            confirm,
            config,
        }
    }

    async fn snapshot(&self) -> Result<Vec<voter::Model>> {
        let snapshot = fetch_all(self.store, self.config.page_size)
            .await
            .context("Failed to load voter snapshot")?;
        println!("Loaded {} voters", snapshot.len());
        Ok(snapshot)
    }

    pub async fn import(&self, rows: &[ImportRow]) -> Result<Outcome<ImportReport>> {
        let snapshot = self.snapshot().await?;
        let plan = plan_import(rows, &snapshot);

        println!(
            "Spreadsheet rows: {} | matched: {} | unmatched: {} | without id: {}",
            rows.len(),
            plan.matched(),
            plan.unmatched,
            plan.skipped
        );
        for update in plan.updates.iter().take(PREVIEW_LINES) {
            println!(
                "  voter {} (original id {}): family={:?} classification={:?}",
                update.voter_id, update.original_id, update.family, update.classification
            );
        }
        print_remainder(plan.updates.len());

        if plan.updates.is_empty() {
            return Ok(Outcome::NothingToDo);
        }
        if !self
            .confirm
            .confirm(&format!("Update {} voters?", plan.matched()))
        {
            return Ok(Outcome::Declined);
        }

        let report = apply_import(self.store, &plan).await;
        println!(
            "Import finished: {} updated, {} failed, {} unmatched",
            report.succeeded, report.failed, report.unmatched
        );
        Ok(Outcome::Applied(report))
    }

    pub async fn dedup(&self) -> Result<Outcome<DedupReport>> {
        let snapshot = self.snapshot().await?;
        let plan = plan_dedup(&snapshot);
        let deletions = plan.deletions().len();

        println!(
            "Duplicate groups: {} | voters to delete: {deletions}",
            plan.groups.len()
        );
        for group in plan.groups.iter().take(PREVIEW_LINES) {
            println!(
                "  {} / {}: keep {}, delete {:?}",
                group.full_name, group.father_name, group.canonical, group.duplicates
            );
        }
        print_remainder(plan.groups.len());

        if plan.is_empty() {
            return Ok(Outcome::NothingToDo);
        }
        if !self
            .confirm
            .confirm(&format!("Delete {deletions} duplicate voters?"))
        {
            return Ok(Outcome::Declined);
        }

        let count_before = self
            .store
            .count(&VoterFilter::default())
            .await
            .context("Failed to count voters before deletion")?;
        let deletion = apply_dedup(self.store, &plan, self.config.delete_batch_size).await;
        let count_after = self
            .store
            .count(&VoterFilter::default())
            .await
            .context("Failed to count voters after deletion")?;

        let report = DedupReport {
            duplicate_groups: plan.groups.len(),
            deletion,
            count_before,
            count_after,
        };
        println!(
            "Dedup finished: {count_before} -> {count_after} voters ({} removed, {} failed batches)",
            report.removed(),
            report.deletion.failed_batches
        );
        Ok(Outcome::Applied(report))
    }

    pub async fn repair_register_numbers(&self) -> Result<Outcome<RegisterReport>> {
        let snapshot = self.snapshot().await?;
        let plan = plan_register_repair(&snapshot);

        println!(
            "Duplicated register numbers: {} | voters to renumber: {}",
            plan.duplicate_groups,
            plan.fixes.len()
        );
        for fix in plan.fixes.iter().take(PREVIEW_LINES) {
            println!(
                "  voter {}: {} -> {}",
                fix.voter_id, fix.original, fix.replacement
            );
        }
        print_remainder(plan.fixes.len());

        if plan.is_empty() {
            return Ok(Outcome::NothingToDo);
        }
        if !self
            .confirm
            .confirm(&format!("Renumber {} voters?", plan.fixes.len()))
        {
            return Ok(Outcome::Declined);
        }

        let tally = apply_register_repair(self.store, &plan).await;
        let refreshed = fetch_all(self.store, self.config.page_size)
            .await
            .context("Failed to reload voters for verification")?;
        let audit = audit_register_numbers(&refreshed);

        if audit.is_clean() {
            println!(
                "Register numbers verified: {} unique across {} numbered voters",
                audit.unique_numbers, audit.numbered_rows
            );
        } else {
            println!(
                "Register numbers still duplicated: {} residual duplicates",
                audit.residual_duplicates()
            );
        }
        info!(
            "Register repair: {} updated, {} failed",
            tally.succeeded, tally.failed
        );

        Ok(Outcome::Applied(RegisterReport {
            duplicate_groups: plan.duplicate_groups,
            tally,
            audit,
        }))
    }
}

fn print_remainder(total: usize) {
    if total > PREVIEW_LINES {
        println!("  ... and {} more", total - PREVIEW_LINES);
    }
}
