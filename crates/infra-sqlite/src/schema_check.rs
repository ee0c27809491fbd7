// Startup check of entity schemas against the live tables

use sqlx::Row as _;
use tracing::{debug, error};

use crate::connection::SqlitePool;
use crate::executor::map_sqlx_error;
use blogstore_core::error::Result;
use blogstore_core::mapper::{EntitySchema, TableColumn};

async fn table_columns(pool: &SqlitePool, table: &str) -> Result<Vec<TableColumn>> {
    let mut conn = pool.acquire().await?;
    let rows = sqlx::query(r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?)"#)
        .bind(table)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

    rows.iter()
        .map(|row| {
            Ok(TableColumn {
                name: row.try_get("name").map_err(map_sqlx_error)?,
                declared_type: row.try_get("type").map_err(map_sqlx_error)?,
                not_null: row.try_get::<i64, _>("notnull").map_err(map_sqlx_error)? != 0,
                primary_key: row.try_get::<i64, _>("pk").map_err(map_sqlx_error)? != 0,
            })
        })
        .collect()
}

/// Fail fast when a table no longer matches the columns its entity maps
pub async fn verify_schemas(pool: &SqlitePool, schemas: &[&EntitySchema]) -> Result<()> {
    for schema in schemas {
        let columns = table_columns(pool, schema.table).await?;
        if let Err(err) = schema.verify_table(&columns) {
            error!(table = schema.table, error = %err, "entity schema mismatch");
            return Err(err.into());
        }
        debug!(table = schema.table, columns = columns.len(), "entity schema verified");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_config;
    use crate::{create_pool, run_migrations};
    use blogstore_core::domain::{COMMENT_SCHEMA, POST_SCHEMA};
    use blogstore_core::error::AppError;
    use blogstore_core::mapper::MappingError;

    #[tokio::test]
    async fn test_migrated_schema_matches_entities() {
        let (config, _db) = temp_config();
        let pool = create_pool(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();

        verify_schemas(&pool, &[&POST_SCHEMA, &COMMENT_SCHEMA])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_table_detected() {
        let (config, _db) = temp_config();
        let pool = create_pool(&config).await.unwrap();

        let err = verify_schemas(&pool, &[&POST_SCHEMA]).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Mapping(MappingError::SchemaMismatch { table: "posts", .. })
        ));
    }

    #[tokio::test]
    async fn test_dropped_column_detected() {
        let (config, _db) = temp_config();
        let pool = create_pool(&config).await.unwrap();
        {
            let mut conn = pool.acquire().await.unwrap();
            sqlx::query("CREATE TABLE comments (id INTEGER PRIMARY KEY, post_id INTEGER NOT NULL)")
                .execute(&mut *conn)
                .await
                .unwrap();
        }

        let err = verify_schemas(&pool, &[&COMMENT_SCHEMA]).await.unwrap_err();
        match err {
            AppError::Mapping(MappingError::SchemaMismatch { detail, .. }) => {
                assert!(detail.contains("missing column"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
