use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Movies::Table)
                    .if_not_exists()
                    .col(pk_auto(Movies::Id))
                    .col(string(Movies::Title))
                    .col(double(Movies::Rating))
                    .col(string(Movies::Genre))
                    .col(text_null(Movies::Description))
                    .col(string_null(Movies::PosterPath))
                    .col(string_null(Movies::ExternalId))
                    .col(string_null(Movies::TrailerId))
                    .col(string(Movies::Source).default("user"))
                    .col(text_null(Movies::PersonalOpinion))
                    .col(boolean(Movies::IsFavorite).default(true))
                    .col(string_null(Movies::Year))
                    .col(integer_null(Movies::UserId))
                    .col(big_integer(Movies::CreatedAt))
                    .col(big_integer(Movies::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movies_genre")
                    .table(Movies::Table)
                    .col(Movies::Genre)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movies_source")
                    .table(Movies::Table)
                    .col(Movies::Source)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movies_user_created")
                    .table(Movies::Table)
                    .col(Movies::UserId)
                    .col(Movies::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Movies::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    Id,
    Title,
    Rating,
    Genre,
    Description,
    PosterPath,
    ExternalId,
    TrailerId,
    Source,
    PersonalOpinion,
    IsFavorite,
    Year,
    UserId,
    CreatedAt,
    UpdatedAt,
}
