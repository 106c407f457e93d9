//! Voter registrant row. `id` is store-assigned; `original_id` correlates with the source spreadsheet.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "voters")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Identifier from the source import
    pub original_id: i64,
    #[sea_orm(column_type = "Text")]
    pub full_name: String,
    #[sea_orm(column_type = "Text")]
    pub father_name: Option<String>,
    /// Registration code, unique once repaired
    #[sea_orm(column_type = "Text")]
    pub register_number: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub family: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub classification: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub religion: Option<String>,
    pub has_voted: bool,
    pub voted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
