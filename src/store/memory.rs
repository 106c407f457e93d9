//! In-process `VoterStore` for tests, with request counting and failure injection.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use sea_orm::DbErr;

use crate::entities::voter;

use super::{RegisterMatch, StoreError, VoterFilter, VoterPatch, VoterStore, Window};

pub fn sample_voter(
    id: i64,
    original_id: i64,
    full_name: &str,
    father_name: Option<&str>,
) -> voter::Model {
    voter::Model {
        id,
        original_id,
        full_name: full_name.to_string(),
        father_name: father_name.map(str::to_string),
        register_number: None,
        family: None,
        classification: None,
        religion: None,
        has_voted: false,
        voted_at: None,
    }
}

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<voter::Model>>,
    window_requests: AtomicUsize,
    fail_windows: AtomicBool,
    failing_updates: Mutex<HashSet<i64>>,
    failing_deletes: Mutex<HashSet<i64>>,
}

impl MemoryStore {
    pub fn with_rows(mut rows: Vec<voter::Model>) -> Self {
        rows.sort_by_key(|row| row.id);
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub fn rows(&self) -> Vec<voter::Model> {
        self.rows.lock().expect("rows lock").clone()
    }

    pub fn window_requests(&self) -> usize {
        self.window_requests.load(Ordering::SeqCst)
    }

    pub fn fail_windows(&self) {
        self.fail_windows.store(true, Ordering::SeqCst);
    }

    pub fn fail_update_of(&self, id: i64) {
        self.failing_updates.lock().expect("updates lock").insert(id);
    }

    /// Any delete batch containing `id` fails as a whole.
    pub fn fail_delete_of(&self, id: i64) {
        self.failing_deletes.lock().expect("deletes lock").insert(id);
    }

    fn injected(message: &str) -> StoreError {
        StoreError::Database(DbErr::Custom(message.to_string()))
    }
}

fn contains(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|value| value.to_lowercase().contains(needle))
        .unwrap_or(false)
}

fn matches(filter: &VoterFilter, row: &voter::Model) -> bool {
    if let Some(search) = filter.search.as_deref() {
        let needle = search.trim().to_lowercase();
        let hit = contains(Some(&row.full_name), &needle)
            || contains(row.family.as_deref(), &needle)
            || contains(row.father_name.as_deref(), &needle);
        if !hit {
            return false;
        }
    }
    if let Some(religion) = filter.religion.as_deref() {
        if row.religion.as_deref() != Some(religion) {
            return false;
        }
    }
    if let Some(has_voted) = filter.has_voted {
        if row.has_voted != has_voted {
            return false;
        }
    }
    match &filter.register_number {
        Some(RegisterMatch::Exact(value)) => row.register_number.as_deref() == Some(value.as_str()),
        Some(RegisterMatch::Partial(value)) => contains(
            row.register_number.as_deref(),
            &value.trim().to_lowercase(),
        ),
        None => true,
    }
}

fn slice(rows: Vec<voter::Model>, window: Window) -> Vec<voter::Model> {
    rows.into_iter()
        .skip(window.offset as usize)
        .take(window.limit as usize)
        .collect()
}

#[async_trait]
impl VoterStore for MemoryStore {
    async fn fetch_window(&self, window: Window) -> Result<Vec<voter::Model>, StoreError> {
        self.window_requests.fetch_add(1, Ordering::SeqCst);
        if self.fail_windows.load(Ordering::SeqCst) {
            return Err(Self::injected("connection reset"));
        }
        Ok(slice(self.rows(), window))
    }

    async fn query(
        &self,
        filter: &VoterFilter,
        window: Window,
    ) -> Result<Vec<voter::Model>, StoreError> {
        let mut rows: Vec<_> = self
            .rows()
            .into_iter()
            .filter(|row| matches(filter, row))
            .collect();
        rows.sort_by_key(|row| (row.original_id, row.id));
        Ok(slice(rows, window))
    }

    async fn count(&self, filter: &VoterFilter) -> Result<u64, StoreError> {
        Ok(self.rows().iter().filter(|row| matches(filter, row)).count() as u64)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<voter::Model>, StoreError> {
        Ok(self.rows().into_iter().find(|row| row.id == id))
    }

    async fn update(
        &self,
        id: i64,
        patch: &VoterPatch,
    ) -> Result<Option<voter::Model>, StoreError> {
        if self.failing_updates.lock().expect("updates lock").contains(&id) {
            return Err(Self::injected("update rejected"));
        }
        let mut rows = self.rows.lock().expect("rows lock");
        let Some(row) = rows.iter_mut().find(|row| row.id == id) else {
            return Ok(None);
        };
        patch.apply_to(row);
        Ok(Some(row.clone()))
    }

    async fn delete_ids(&self, ids: &[i64]) -> Result<u64, StoreError> {
        {
            let failing = self.failing_deletes.lock().expect("deletes lock");
            if ids.iter().any(|id| failing.contains(id)) {
                return Err(Self::injected("delete rejected"));
            }
        }
        let targets: HashSet<i64> = ids.iter().copied().collect();
        let mut rows = self.rows.lock().expect("rows lock");
        let before = rows.len();
        rows.retain(|row| !targets.contains(&row.id));
        Ok((before - rows.len()) as u64)
    }

    async fn distinct_religions(&self) -> Result<Vec<Option<String>>, StoreError> {
        let mut values: Vec<Option<String>> = Vec::new();
        for row in self.rows() {
            if !values.contains(&row.religion) {
                values.push(row.religion);
            }
        }
        Ok(values)
    }
}
