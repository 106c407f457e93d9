use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::entities::voter;
use crate::models::voter::PaginationView;
use crate::sheets::record_vote_best_effort;
use crate::state::AppState;
use crate::store::{RegisterMatch, VoterFilter, VoterPatch, Window};

use super::{ApiResponse, HttpError};

const DEFAULT_PAGE_LIMIT: u64 = 50;
const MAX_PAGE_LIMIT: u64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/voters", get(list_voters))
        .route("/voters/{id}", get(get_voter))
        .route("/voters/{id}/vote", post(mark_voted))
        .route("/voters/{id}/unvote", post(mark_not_voted))
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ListVotersQuery {
    search: Option<String>,
    religion: Option<String>,
    voted: Option<String>,
    register_number: Option<String>,
    exact: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
}

impl ListVotersQuery {
    fn filter(&self) -> VoterFilter {
        let register_number = non_blank(&self.register_number).map(|value| {
            if parse_flag(self.exact.as_deref()) == Some(true) {
                RegisterMatch::Exact(value)
            } else {
                RegisterMatch::Partial(value)
            }
        });
        VoterFilter {
            search: non_blank(&self.search),
            religion: non_blank(&self.religion),
            has_voted: parse_flag(self.voted.as_deref()),
            register_number,
        }
    }

    fn window(&self) -> (u64, Window) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        let offset = (page - 1).saturating_mul(limit);
        (page, Window { offset, limit })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Anything other than `true`/`false` means "no filter".
fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}

async fn list_voters(
    query: Result<Query<ListVotersQuery>, QueryRejection>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<voter::Model>>>, HttpError> {
    let Query(query) = query?;
    let filter = query.filter();
    let (page, window) = query.window();

    let total = state.store.count(&filter).await?;
    let voters = state.store.query(&filter, window).await?;
    assert!(
        voters.len() as u64 <= window.limit,
        "Returned more voters than requested"
    );

    let pagination = PaginationView::new(page, window.limit, total);
    Ok(Json(ApiResponse::paginated(voters, pagination)))
}

async fn get_voter(
    id: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<voter::Model>>, HttpError> {
    let Path(id) = id?;
    let voter = state
        .store
        .find_by_id(id)
        .await?
        .ok_or_else(|| HttpError::new(StatusCode::NOT_FOUND, format!("Voter {id} not found")))?;
    Ok(Json(ApiResponse::ok(voter)))
}

async fn mark_voted(
    id: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<voter::Model>>, HttpError> {
    let Path(id) = id?;
    set_vote_state(&state, id, true).await
}

async fn mark_not_voted(
    id: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<voter::Model>>, HttpError> {
    let Path(id) = id?;
    set_vote_state(&state, id, false).await
}

async fn set_vote_state(
    state: &AppState,
    id: i64,
    voted: bool,
) -> Result<Json<ApiResponse<voter::Model>>, HttpError> {
    let voted_at = voted.then(|| Utc::now().fixed_offset());
    let updated = state
        .store
        .update(id, &VoterPatch::vote(voted_at))
        .await?
        .ok_or_else(|| HttpError::internal(format!("Voter {id} not found")))?;

    info!(
        "Voter {} (original id {}) marked voted={voted}",
        updated.id, updated.original_id
    );
    record_vote_best_effort(state.mirror.as_ref(), updated.original_id, voted).await;

    Ok(Json(ApiResponse::ok(updated)))
}
