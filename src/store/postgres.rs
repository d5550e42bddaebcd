//! `PostgreSQL` record store (single JSONB table, see `db/sql/01_records.sql`).

use super::{Fields, Record, RecordStore, SetMode, StoreError, StoreFuture};
use sqlx::{Connection, PgPool, Row, types::Json};
use tracing::{Instrument, error, info_span};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let query =
            "SELECT EXISTS(SELECT 1 FROM records WHERE collection = $1 AND id = $2) AS exists";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(collection)
            .bind(id)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(unavailable)?;
        row.try_get("exists").map_err(unavailable)
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    error!("record store query failed: {err}");
    StoreError::Unavailable(err.to_string())
}

impl RecordStore for PgStore {
    fn get<'a>(&'a self, collection: &'a str, id: &'a str) -> StoreFuture<'a, Option<Record>> {
        Box::pin(async move {
            let query = "SELECT data, version FROM records WHERE collection = $1 AND id = $2";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = query
            );
            let row = sqlx::query(query)
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .map_err(unavailable)?;

            let Some(row) = row else {
                return Ok(None);
            };

            let Json(fields): Json<Fields> = row.try_get("data").map_err(unavailable)?;
            let version: i64 = row.try_get("version").map_err(unavailable)?;
            Ok(Some(Record { fields, version }))
        })
    }

    fn set<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Fields,
        mode: SetMode,
    ) -> StoreFuture<'a, i64> {
        Box::pin(async move {
            // `||` on jsonb is a shallow merge, matching document-store merge writes.
            let query = match mode {
                SetMode::Overwrite => {
                    r"
                    INSERT INTO records (collection, id, data)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (collection, id) DO UPDATE
                    SET data = EXCLUDED.data,
                        version = nextval('records_version_seq'),
                        updated_at = NOW()
                    RETURNING version
                    "
                }
                SetMode::Merge => {
                    r"
                    INSERT INTO records (collection, id, data)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (collection, id) DO UPDATE
                    SET data = records.data || EXCLUDED.data,
                        version = nextval('records_version_seq'),
                        updated_at = NOW()
                    RETURNING version
                    "
                }
            };
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPSERT",
                db.statement = query
            );
            let row = sqlx::query(query)
                .bind(collection)
                .bind(id)
                .bind(Json(&fields))
                .fetch_one(&self.pool)
                .instrument(span)
                .await
                .map_err(unavailable)?;
            row.try_get("version").map_err(unavailable)
        })
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Fields,
        expected_version: Option<i64>,
    ) -> StoreFuture<'a, i64> {
        Box::pin(async move {
            let query = r"
                UPDATE records
                SET data = data || $3,
                    version = nextval('records_version_seq'),
                    updated_at = NOW()
                WHERE collection = $1
                  AND id = $2
                  AND ($4::bigint IS NULL OR version = $4)
                RETURNING version
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            let row = sqlx::query(query)
                .bind(collection)
                .bind(id)
                .bind(Json(&fields))
                .bind(expected_version)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .map_err(unavailable)?;

            match row {
                Some(row) => row.try_get("version").map_err(unavailable),
                None if self.exists(collection, id).await? => {
                    Err(StoreError::conflict(collection, id))
                }
                None => Err(StoreError::not_found(collection, id)),
            }
        })
    }

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        expected_version: Option<i64>,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let query = r"
                DELETE FROM records
                WHERE collection = $1
                  AND id = $2
                  AND ($3::bigint IS NULL OR version = $3)
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DELETE",
                db.statement = query
            );
            let result = sqlx::query(query)
                .bind(collection)
                .bind(id)
                .bind(expected_version)
                .execute(&self.pool)
                .instrument(span)
                .await
                .map_err(unavailable)?;

            if result.rows_affected() > 0 {
                return Ok(true);
            }

            if expected_version.is_some() && self.exists(collection, id).await? {
                return Err(StoreError::conflict(collection, id));
            }

            Ok(false)
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let acquire_span = info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            );
            let mut conn = self
                .pool
                .acquire()
                .instrument(acquire_span)
                .await
                .map_err(unavailable)?;
            let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
            conn.ping().instrument(ping_span).await.map_err(unavailable)
        })
    }
}
