use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationView {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl PaginationView {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        assert!(limit > 0, "Pagination limit must be positive");
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoterStatsView {
    pub total: u64,
    pub voted: u64,
    pub not_voted: u64,
    /// Share of voters who voted, in percent with two decimals
    pub percentage: f64,
    pub by_religion: Vec<ReligionCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReligionCount {
    pub religion: String,
    pub total: u64,
    pub voted: u64,
}
