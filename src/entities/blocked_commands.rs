use sea_orm::entity::prelude::*;

/// Forbidden command tokens. Append-only; no removal is exposed.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "blocked_commands")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub command: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
