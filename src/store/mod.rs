//! Voter store facade.
//!
//! Everything durable lives in the `voters` table; callers hold an
//! `Arc<dyn VoterStore>` constructed once in `main`. The trait covers exactly
//! the operations the registry needs from the database:
//! - windowed scans ordered by `id`
//! - filtered, paginated queries ordered by `original_id`
//! - exact counts
//! - single-row updates by `id`
//! - set-membership deletes

use async_trait::async_trait;
use sea_orm::DbErr;
use sea_orm::prelude::DateTimeWithTimeZone;

use crate::entities::voter;

mod bulk;
#[cfg(test)]
pub mod memory;
mod postgres;

pub use bulk::fetch_all;
pub use postgres::PostgresVoterStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterMatch {
    /// Case-insensitive substring match
    Partial(String),
    Exact(String),
}

/// Query filter. All present criteria must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoterFilter {
    /// Case-insensitive substring of full name, family or father name
    pub search: Option<String>,
    pub religion: Option<String>,
    pub has_voted: Option<bool>,
    pub register_number: Option<RegisterMatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

/// Column assignments for a single-row update. `None` leaves a column untouched;
/// `Some(None)` writes null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoterPatch {
    pub family: Option<Option<String>>,
    pub classification: Option<Option<String>>,
    pub register_number: Option<String>,
    pub has_voted: Option<bool>,
    pub voted_at: Option<Option<DateTimeWithTimeZone>>,
}

impl VoterPatch {
    pub fn enrichment(family: Option<String>, classification: Option<String>) -> Self {
        Self {
            family: Some(family),
            classification: Some(classification),
            ..Self::default()
        }
    }

    pub fn register_number(value: String) -> Self {
        Self {
            register_number: Some(value),
            ..Self::default()
        }
    }

    /// `Some(at)` marks the voter as voted at `at`, `None` clears the vote.
    pub fn vote(voted_at: Option<DateTimeWithTimeZone>) -> Self {
        Self {
            has_voted: Some(voted_at.is_some()),
            voted_at: Some(voted_at),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, model: &mut voter::Model) {
        if let Some(family) = &self.family {
            model.family = family.clone();
        }
        if let Some(classification) = &self.classification {
            model.classification = classification.clone();
        }
        if let Some(register_number) = &self.register_number {
            model.register_number = Some(register_number.clone());
        }
        if let Some(has_voted) = self.has_voted {
            model.has_voted = has_voted;
        }
        if let Some(voted_at) = self.voted_at {
            model.voted_at = voted_at;
        }
    }
}

#[async_trait]
pub trait VoterStore: Send + Sync {
    /// Rows ordered by `id` ascending, skipping `window.offset` rows.
    async fn fetch_window(&self, window: Window) -> Result<Vec<voter::Model>, StoreError>;

    /// Filtered rows ordered by `original_id`, then `id`.
    async fn query(
        &self,
        filter: &VoterFilter,
        window: Window,
    ) -> Result<Vec<voter::Model>, StoreError>;

    async fn count(&self, filter: &VoterFilter) -> Result<u64, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<voter::Model>, StoreError>;

    /// Returns the updated row, or `None` when no row has this id.
    async fn update(
        &self,
        id: i64,
        patch: &VoterPatch,
    ) -> Result<Option<voter::Model>, StoreError>;

    /// Deletes every row whose id is in `ids`, returning the number removed.
    async fn delete_ids(&self, ids: &[i64]) -> Result<u64, StoreError>;

    /// Raw distinct `religion` column values, null included.
    async fn distinct_religions(&self) -> Result<Vec<Option<String>>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::sample_voter;
    use chrono::Utc;

    #[test]
    fn enrichment_patch_overwrites_with_null() {
        let mut model = sample_voter(1, 10, "Ali", Some("Hasan"));
        model.family = Some("Old".to_string());
        model.classification = Some("A".to_string());

        VoterPatch::enrichment(None, Some("B".to_string())).apply_to(&mut model);

        assert_eq!(model.family, None);
        assert_eq!(model.classification.as_deref(), Some("B"));
    }

    #[test]
    fn vote_patch_sets_and_clears_state() {
        let mut model = sample_voter(1, 10, "Ali", None);
        let now = Utc::now().fixed_offset();

        VoterPatch::vote(Some(now)).apply_to(&mut model);
        assert!(model.has_voted);
        assert_eq!(model.voted_at, Some(now));

        VoterPatch::vote(None).apply_to(&mut model);
        assert!(!model.has_voted);
        assert_eq!(model.voted_at, None);
    }

    #[test]
    fn empty_patch_leaves_row_untouched() {
        let mut model = sample_voter(3, 12, "Rana", Some("Karim"));
        model.register_number = Some("R-1".to_string());
        let before = model.clone();
        let patch = VoterPatch::default();
        assert!(patch.is_empty());
        assert!(!VoterPatch::vote(None).is_empty());
        patch.apply_to(&mut model);
        assert_eq!(model, before);
    }
}
