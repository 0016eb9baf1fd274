use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};

use crate::error::AppResult;

/// Non-partial unique index from older schemas. It rejected every second
/// anonymous record once `external_id` was stored as NULL or blank.
pub const LEGACY_EXTERNAL_ID_INDEX: &str = "idx_movies_external_id";
pub const EXTERNAL_ID_INDEX: &str = "idx_movies_external_id_user";

const CREATE_EXTERNAL_ID_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_movies_external_id_user \
     ON movies (external_id, IFNULL(user_id, 0)) WHERE external_id IS NOT NULL";

const BACKFILL_NULL_EXTERNAL_IDS: &str = "UPDATE movies SET external_id = NULL \
     WHERE external_id IS NOT NULL AND (TRIM(external_id) = '' OR LOWER(external_id) = 'null')";

pub async fn connect_and_migrate(database_url: &str) -> AppResult<DatabaseConnection> {
    let mut opts = ConnectOptions::new(database_url.to_string());
    opts.sqlx_logging(false);
    if database_url.contains(":memory:") {
        // Every pooled connection would otherwise see its own empty database.
        opts.max_connections(1).min_connections(1);
    }
    let db = Database::connect(opts).await?;

    for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL", "PRAGMA cache_size=-64000"] {
        db.execute(Statement::from_string(db.get_database_backend(), pragma.to_string())).await?;
    }

    Migrator::up(&db, None).await?;
    reconcile_external_id_index(&db).await?;
    Ok(db)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub dropped_legacy: bool,
    pub backfilled: u64,
    pub created_partial: bool,
}

/// Brings the `(external_id, user_id)` uniqueness constraint to its current
/// shape. Every step checks the schema first, so running it on each startup is
/// a no-op once the database is up to date.
pub async fn reconcile_external_id_index(db: &DatabaseConnection) -> AppResult<IndexReport> {
    let mut report = IndexReport::default();

    let existing = movie_indexes(db).await?;
    tracing::debug!(indexes = ?existing, "movie indexes");

    if existing.iter().any(|name| name == LEGACY_EXTERNAL_ID_INDEX) {
        tracing::info!(index = LEGACY_EXTERNAL_ID_INDEX, "dropping legacy index");
        execute(db, &format!("DROP INDEX IF EXISTS {LEGACY_EXTERNAL_ID_INDEX}")).await?;
        report.dropped_legacy = true;
    }

    let res = db
        .execute(Statement::from_string(
            db.get_database_backend(),
            BACKFILL_NULL_EXTERNAL_IDS.to_string(),
        ))
        .await?;
    report.backfilled = res.rows_affected();
    if report.backfilled > 0 {
        tracing::info!(rows = report.backfilled, "cleared placeholder external ids");
    }

    if !existing.iter().any(|name| name == EXTERNAL_ID_INDEX) {
        tracing::info!(index = EXTERNAL_ID_INDEX, "creating partial unique index");
        execute(db, CREATE_EXTERNAL_ID_INDEX).await?;
        report.created_partial = true;
    }

    Ok(report)
}

async fn movie_indexes(db: &DatabaseConnection) -> AppResult<Vec<String>> {
    let rows = db
        .query_all(Statement::from_string(
            db.get_database_backend(),
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'movies'".to_string(),
        ))
        .await?;

    let mut names = Vec::with_capacity(rows.len());
    for row in rows {
        names.push(row.try_get::<String>("", "name")?);
    }
    Ok(names)
}

async fn execute(db: &DatabaseConnection, sql: &str) -> AppResult<()> {
    db.execute(Statement::from_string(db.get_database_backend(), sql.to_string())).await?;
    Ok(())
}
