use sea_orm::entity::prelude::*;

/// Append-only audit event. Timestamps are unix epoch seconds.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub description: String,

    pub timestamp: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::actors::Entity")]
    Actors,
}

impl Related<super::actors::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Actors.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
