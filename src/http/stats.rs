use std::collections::{BTreeSet, HashMap};

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::entities::voter;
use crate::models::voter::{ReligionCount, VoterStatsView};
use crate::state::AppState;
use crate::store::fetch_all;

use super::{ApiResponse, HttpError};

/// Label for voters without a religion value.
pub const UNKNOWN_RELIGION: &str = "Unknown";

/// Values entered in place of a missing religion.
const PLACEHOLDER_RELIGIONS: [&str; 4] = ["-", "n/a", "null", "none"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/religions", get(get_religions))
}

async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<VoterStatsView>>, HttpError> {
    let snapshot = fetch_all(state.store.as_ref(), state.page_size).await?;
    Ok(Json(ApiResponse::ok(summarize(&snapshot))))
}

async fn get_religions(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<String>>>, HttpError> {
    let raw = state.store.distinct_religions().await?;
    Ok(Json(ApiResponse::ok(filter_religions(raw))))
}

fn summarize(snapshot: &[voter::Model]) -> VoterStatsView {
    let total = snapshot.len() as u64;
    let voted = snapshot.iter().filter(|voter| voter.has_voted).count() as u64;

    let mut tallies: HashMap<String, (u64, u64)> = HashMap::new();
    for voter in snapshot {
        let label = voter
            .religion
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(UNKNOWN_RELIGION);
        let entry = tallies.entry(label.to_string()).or_default();
        entry.0 += 1;
        if voter.has_voted {
            entry.1 += 1;
        }
    }

    let mut by_religion: Vec<ReligionCount> = tallies
        .into_iter()
        .map(|(religion, (total, voted))| ReligionCount {
            religion,
            total,
            voted,
        })
        .collect();
    by_religion.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.religion.cmp(&b.religion)));

    VoterStatsView {
        total,
        voted,
        not_voted: total - voted,
        percentage: percentage(voted, total),
        by_religion,
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let raw = part as f64 * 100.0 / whole as f64;
    (raw * 100.0).round() / 100.0
}

fn filter_religions(raw: Vec<Option<String>>) -> Vec<String> {
    raw.into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .filter(|value| {
            let lowered = value.to_lowercase();
            !PLACEHOLDER_RELIGIONS.contains(&lowered.as_str())
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Method, StatusCode};

    use super::*;
    use crate::http::test_support::{app, send};
    use crate::store::memory::{MemoryStore, sample_voter};

    fn with_religion(id: i64, religion: Option<&str>, has_voted: bool) -> voter::Model {
        let mut voter = sample_voter(id, id, &format!("Voter {id}"), None);
        voter.religion = religion.map(str::to_string);
        voter.has_voted = has_voted;
        voter
    }

    #[test]
    fn percentage_rounds_to_two_decimals() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(0, 0), 0.0);
    }

    #[test]
    fn missing_religion_uses_sentinel() {
        let stats = summarize(&[
            with_religion(1, Some("Muslim"), true),
            with_religion(2, None, false),
            with_religion(3, Some("  "), true),
            with_religion(4, Some("Muslim"), false),
        ]);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.voted, 2);
        assert_eq!(stats.not_voted, 2);
        assert_eq!(stats.percentage, 50.0);
        assert_eq!(
            stats.by_religion,
            vec![
                ReligionCount {
                    religion: "Muslim".to_string(),
                    total: 2,
                    voted: 1,
                },
                ReligionCount {
                    religion: UNKNOWN_RELIGION.to_string(),
                    total: 2,
                    voted: 1,
                },
            ]
        );
    }

    #[test]
    fn religions_drop_placeholders_and_blanks() {
        let values = filter_religions(vec![
            Some("Muslim".to_string()),
            None,
            Some(" ".to_string()),
            Some("N/A".to_string()),
            Some("-".to_string()),
            Some("Christian ".to_string()),
            Some("Christian".to_string()),
        ]);
        assert_eq!(values, vec!["Christian".to_string(), "Muslim".to_string()]);
    }

    #[tokio::test]
    async fn stats_endpoint_scans_all_pages() {
        let store = Arc::new(MemoryStore::with_rows(vec![
            with_religion(1, Some("Druze"), true),
            with_religion(2, Some("Druze"), false),
            with_religion(3, None, false),
            with_religion(4, Some("Druze"), true),
            with_religion(5, Some("Muslim"), false),
        ]));
        let (status, body) = send(app(store.clone()), Method::GET, "/api/stats").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 5);
        assert_eq!(body["data"]["voted"], 2);
        assert_eq!(body["data"]["percentage"], 40.0);
        assert_eq!(body["data"]["by_religion"][0]["religion"], "Druze");
        assert_eq!(store.window_requests(), 3);
    }

    #[tokio::test]
    async fn religions_endpoint_lists_distinct_values() {
        let store = Arc::new(MemoryStore::with_rows(vec![
            with_religion(1, Some("Muslim"), false),
            with_religion(2, Some("null"), false),
            with_religion(3, Some("Muslim"), false),
        ]));
        let (_, body) = send(app(store), Method::GET, "/api/religions").await;
        assert_eq!(body["data"], serde_json::json!(["Muslim"]));
    }
}
