use sea_orm::entity::prelude::*;

/// Internal identity. Names are NOT unique; lookups may return several rows.
/// Row id 0 is the synthetic System user seeded by the initial migration.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub name: String,

    /// Active employee. Deactivation flips this flag; rows are never deleted.
    pub works_here: bool,

    /// Admin eligibility is `is_admin && works_here`.
    pub is_admin: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::virtual_machines::Entity")]
    VirtualMachines,
}

impl Related<super::virtual_machines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VirtualMachines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
