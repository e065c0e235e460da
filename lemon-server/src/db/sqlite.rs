use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// One row of the ambient request-audit log (§3.1).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RequestRecord {
    pub trace_id: String,
    pub method: String,
    pub path: String,
    pub status: i64,
    pub latency_ms: i64,
    pub created_at: String,
}

/// Thin wrapper over a SQLite pool for the request-audit log, carried over
/// from the predecessor's `TraceLayer` + `RequestStore` pattern as the
/// project's ambient persistence/test-tooling layer.
#[derive(Clone)]
pub struct RequestStore {
    pool: SqlitePool,
}

impl RequestStore {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn record(
        &self,
        trace_id: &str,
        method: &str,
        path: &str,
        status: u16,
        latency_ms: u64,
    ) -> Result<(), sqlx::Error> {
        let created_at: DateTime<Utc> = Utc::now();
        sqlx::query(
            "INSERT INTO request_log (trace_id, method, path, status, latency_ms, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(trace_id)
        .bind(method)
        .bind(path)
        .bind(status as i64)
        .bind(latency_ms as i64)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<RequestRecord>, sqlx::Error> {
        sqlx::query_as::<_, RequestRecord>(
            "SELECT trace_id, method, path, status, latency_ms, created_at FROM request_log ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn record_then_read_back() {
        let store = RequestStore::connect("sqlite::memory:").await.unwrap();
        store.record("trace-1", "GET", "/health", 200, 12).await.unwrap();
        let rows = store.recent(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "/health");
        assert_eq!(rows[0].status, 200);
    }
}
