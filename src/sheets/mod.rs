//! Best-effort mirror of voting state into the tracking spreadsheet.
//!
//! The mirror is a side channel: [`record_vote_best_effort`] awaits the write
//! but only logs its failure. Nothing here can fail an HTTP request.

use async_trait::async_trait;
use tracing::{debug, warn};

mod client;

pub use client::SheetsMirror;

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("spreadsheet mirror is not configured")]
    NotConfigured,
    #[error("spreadsheet request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("spreadsheet API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("no spreadsheet row for original id {original_id}")]
    RowNotFound { original_id: i64 },
    #[error("invalid spreadsheet endpoint: {0}")]
    Endpoint(String),
}

#[async_trait]
pub trait VoteMirror: Send + Sync {
    async fn record_vote(&self, original_id: i64, voted: bool) -> Result<(), MirrorError>;
}

/// Used when no `[spreadsheet]` section is configured.
pub struct DisabledMirror;

#[async_trait]
impl VoteMirror for DisabledMirror {
    async fn record_vote(&self, _original_id: i64, _voted: bool) -> Result<(), MirrorError> {
        Err(MirrorError::NotConfigured)
    }
}

pub async fn record_vote_best_effort(mirror: &dyn VoteMirror, original_id: i64, voted: bool) {
    match mirror.record_vote(original_id, voted).await {
        Ok(()) => debug!("Mirrored vote state {voted} for original id {original_id}"),
        Err(MirrorError::NotConfigured) => {
            debug!("Spreadsheet mirror disabled; skipping original id {original_id}")
        }
        Err(err) => warn!("Spreadsheet mirror failed for original id {original_id}: {err}"),
    }
}
