use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(column_type = "Double")]
    pub rating: f64,
    pub genre: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub poster_path: Option<String>,
    pub external_id: Option<String>,
    pub trailer_id: Option<String>,
    pub source: MovieSource,
    #[sea_orm(column_type = "Text", nullable)]
    pub personal_opinion: Option<String>,
    pub is_favorite: bool,
    pub year: Option<String>,
    pub user_id: Option<i32>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum MovieSource {
    #[sea_orm(string_value = "seed")]
    Seed,
    #[default]
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "tmdb")]
    Tmdb,
}

impl MovieSource {
    pub fn as_str(self) -> &'static str {
        match self {
            MovieSource::Seed => "seed",
            MovieSource::User => "user",
            MovieSource::Tmdb => "tmdb",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "seed" => Some(MovieSource::Seed),
            "user" => Some(MovieSource::User),
            "tmdb" => Some(MovieSource::Tmdb),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
