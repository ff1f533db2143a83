use sea_orm::entity::prelude::*;

/// One managed machine. Created as a placeholder row (synthetic
/// `under-construction-*` hostname) so the id is claimed before provisioning,
/// then finalized with the real hostname and ip once `up` succeeds.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "virtual_machines")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub hostname: String,

    pub owner_id: i64,

    /// Assigned late, once provisioning has finished.
    pub ip: Option<String>,

    #[sea_orm(column_name = "box")]
    pub box_name: String,

    /// NULL or true = live, false = destroyed-but-recorded.
    pub active: Option<bool>,

    pub init_date: String,

    pub last_build_date: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerId",
        to = "super::users::Column::Id"
    )]
    Owner,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
