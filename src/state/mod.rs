use std::sync::Arc;
use std::time::Instant;

use crate::sheets::VoteMirror;
use crate::store::VoterStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn VoterStore>,
    pub mirror: Arc<dyn VoteMirror>,
    /// Window size for full-table scans behind `/api/stats`
    pub page_size: u64,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn VoterStore>, mirror: Arc<dyn VoteMirror>, page_size: u64) -> Self {
        assert!(page_size > 0, "Scan page size must be positive");
        Self {
            store,
            mirror,
            page_size,
            start_time: Instant::now(),
        }
    }
}
