//! Batch reconciliation between the voter table and outside data.
//!
//! Each procedure is split into a pure `plan_*` function over a full snapshot
//! (see [`crate::store::fetch_all`]) and an async `apply_*` step that issues the
//! writes one at a time. Apply steps never stop on a per-item failure: the
//! failure is logged with the offending id and counted.

pub mod dedup;
pub mod import;
pub mod register;

use serde::Serialize;

/// Per-item outcome counts of an apply step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyTally {
    pub succeeded: usize,
    pub failed: usize,
}

impl ApplyTally {
    fn record(&mut self, ok: bool) {
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}
