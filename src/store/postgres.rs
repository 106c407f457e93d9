use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, UpdateMany,
};
use tracing::debug;

use crate::entities::prelude::Voter;
use crate::entities::voter;

use super::{RegisterMatch, StoreError, VoterFilter, VoterPatch, VoterStore, Window};

/// `VoterStore` over the sea-orm connection pool.
#[derive(Clone)]
pub struct PostgresVoterStore {
    database: DatabaseConnection,
}

impl PostgresVoterStore {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

#[async_trait]
impl VoterStore for PostgresVoterStore {
    async fn fetch_window(&self, window: Window) -> Result<Vec<voter::Model>, StoreError> {
        assert!(window.limit > 0, "Window limit must be positive");
        let rows = Voter::find()
            .order_by_asc(voter::Column::Id)
            .offset(window.offset)
            .limit(window.limit)
            .all(&self.database)
            .await?;
        debug!(
            "Fetched {} voters at offset {} (limit {})",
            rows.len(),
            window.offset,
            window.limit
        );
        Ok(rows)
    }

    async fn query(
        &self,
        filter: &VoterFilter,
        window: Window,
    ) -> Result<Vec<voter::Model>, StoreError> {
        assert!(window.limit > 0, "Window limit must be positive");
        let rows = Voter::find()
            .filter(filter_condition(filter))
            .order_by_asc(voter::Column::OriginalId)
            .order_by_asc(voter::Column::Id)
            .offset(window.offset)
            .limit(window.limit)
            .all(&self.database)
            .await?;
        Ok(rows)
    }

    async fn count(&self, filter: &VoterFilter) -> Result<u64, StoreError> {
        let total = Voter::find()
            .filter(filter_condition(filter))
            .count(&self.database)
            .await?;
        Ok(total)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<voter::Model>, StoreError> {
        Ok(Voter::find_by_id(id).one(&self.database).await?)
    }

    async fn update(
        &self,
        id: i64,
        patch: &VoterPatch,
    ) -> Result<Option<voter::Model>, StoreError> {
        if patch.is_empty() {
            return self.find_by_id(id).await;
        }
        let mut updated = update_statement(id, patch)
            .exec_with_returning(&self.database)
            .await?;
        assert!(updated.len() <= 1, "Primary key matched several voters");
        Ok(updated.pop())
    }

    async fn delete_ids(&self, ids: &[i64]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = Voter::delete_many()
            .filter(voter::Column::Id.is_in(ids.iter().copied()))
            .exec(&self.database)
            .await?;
        Ok(result.rows_affected)
    }

    async fn distinct_religions(&self) -> Result<Vec<Option<String>>, StoreError> {
        let values = Voter::find()
            .select_only()
            .column(voter::Column::Religion)
            .distinct()
            .into_tuple::<Option<String>>()
            .all(&self.database)
            .await?;
        Ok(values)
    }
}

fn filter_condition(filter: &VoterFilter) -> Condition {
    let mut condition = Condition::all();

    if let Some(search) = filter.search.as_deref() {
        let pattern = contains_pattern(search);
        condition = condition.add(
            Condition::any()
                .add(lower_like(voter::Column::FullName, &pattern))
                .add(lower_like(voter::Column::Family, &pattern))
                .add(lower_like(voter::Column::FatherName, &pattern)),
        );
    }

    if let Some(religion) = filter.religion.as_deref() {
        condition = condition.add(voter::Column::Religion.eq(religion));
    }

    if let Some(has_voted) = filter.has_voted {
        condition = condition.add(voter::Column::HasVoted.eq(has_voted));
    }

    match &filter.register_number {
        Some(RegisterMatch::Exact(value)) => {
            condition = condition.add(voter::Column::RegisterNumber.eq(value.as_str()));
        }
        Some(RegisterMatch::Partial(value)) => {
            condition = condition.add(lower_like(
                voter::Column::RegisterNumber,
                &contains_pattern(value),
            ));
        }
        None => {}
    }

    condition
}

/// Single statement so a row deleted concurrently yields no returned row.
fn update_statement(id: i64, patch: &VoterPatch) -> UpdateMany<Voter> {
    let mut statement = Voter::update_many().filter(voter::Column::Id.eq(id));
    if let Some(family) = &patch.family {
        statement = statement.col_expr(voter::Column::Family, Expr::value(family.clone()));
    }
    if let Some(classification) = &patch.classification {
        statement = statement.col_expr(
            voter::Column::Classification,
            Expr::value(classification.clone()),
        );
    }
    if let Some(register_number) = &patch.register_number {
        statement = statement.col_expr(
            voter::Column::RegisterNumber,
            Expr::value(register_number.clone()),
        );
    }
    if let Some(has_voted) = patch.has_voted {
        statement = statement.col_expr(voter::Column::HasVoted, Expr::value(has_voted));
    }
    if let Some(voted_at) = patch.voted_at {
        statement = statement.col_expr(voter::Column::VotedAt, Expr::value(voted_at));
    }
    statement
}

const LIKE_ESCAPE: char = '!';

fn lower_like(column: voter::Column, pattern: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).like(LikeExpr::new(pattern).escape(LIKE_ESCAPE))
}

/// `%term%` with the term's own LIKE metacharacters matched literally.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::from("%");
    for c in term.trim().to_lowercase().chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
