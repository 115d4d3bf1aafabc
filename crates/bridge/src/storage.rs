//! Durable buffer storage

use crate::database::Database;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use types::{
    BridgeError, BufferedContainer, BufferedPackage, ClearedCounts, DatabaseError, PackageId,
    Result,
};
use uuid::Uuid;

/// Buffer storage interface
///
/// Entries come back in insertion order. Every mutation is a single statement
/// or one transaction, so readers never see a half-written entry.
#[async_trait]
pub trait BufferStore: Send + Sync {
    /// Append a link package
    async fn enqueue_package(&self, package: &BufferedPackage) -> Result<()>;

    /// Append a container, replacing any buffered container with the same
    /// filename. Returns the insertion sequence assigned to it.
    async fn enqueue_container(&self, container: &BufferedContainer) -> Result<i64>;

    async fn list_packages(&self) -> Result<Vec<BufferedPackage>>;

    async fn list_containers(&self) -> Result<Vec<BufferedContainer>>;

    async fn get_package(&self, id: PackageId) -> Result<Option<BufferedPackage>>;

    /// The container upload identified by `filename` and `seq`, if still buffered
    async fn get_container(&self, filename: &str, seq: i64) -> Result<Option<BufferedContainer>>;

    /// Returns false when no such package was buffered
    async fn remove_package(&self, id: PackageId) -> Result<bool>;

    /// Returns false when no such container was buffered
    async fn remove_container(&self, filename: &str) -> Result<bool>;

    /// Remove a container only if it is still the upload that was delivered
    async fn remove_delivered_container(&self, filename: &str, seq: i64) -> Result<bool>;

    async fn record_package_failure(&self, id: PackageId, error: &str) -> Result<()>;

    async fn record_container_failure(&self, filename: &str, seq: i64, error: &str) -> Result<()>;

    /// Remove everything
    async fn clear(&self) -> Result<ClearedCounts>;

    /// Buffered packages plus buffered containers
    async fn count(&self) -> Result<u64>;
}

/// SQLite implementation of buffer storage
#[derive(Debug, Clone)]
pub struct SqliteBufferStore {
    db: Database,
}

impl SqliteBufferStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn query_failed(e: sqlx::Error) -> BridgeError {
    DatabaseError::QueryFailed(e.to_string()).into()
}

fn transaction_failed(e: sqlx::Error) -> BridgeError {
    DatabaseError::TransactionFailed(e.to_string()).into()
}

fn corrupt(table: &str, message: impl std::fmt::Display) -> BridgeError {
    DatabaseError::CorruptRow {
        table: table.to_string(),
        message: message.to_string(),
    }
    .into()
}

fn attempt_count(row: &SqliteRow, table: &str) -> Result<u32> {
    let raw: i64 = row.try_get("attempt_count").map_err(|e| corrupt(table, e))?;
    u32::try_from(raw).map_err(|e| corrupt(table, e))
}

fn package_from_row(row: &SqliteRow) -> Result<BufferedPackage> {
    const TABLE: &str = "buffered_packages";

    let id: String = row.try_get("id").map_err(|e| corrupt(TABLE, e))?;
    let links: String = row.try_get("links").map_err(|e| corrupt(TABLE, e))?;
    let enqueued_at: DateTime<Utc> = row.try_get("enqueued_at").map_err(|e| corrupt(TABLE, e))?;

    Ok(BufferedPackage {
        id: Uuid::parse_str(&id).map_err(|e| corrupt(TABLE, e))?,
        name: row.try_get("name").map_err(|e| corrupt(TABLE, e))?,
        links: serde_json::from_str(&links).map_err(|e| corrupt(TABLE, e))?,
        passwords: row.try_get("passwords").map_err(|e| corrupt(TABLE, e))?,
        source: row.try_get("source").map_err(|e| corrupt(TABLE, e))?,
        enqueued_at,
        attempt_count: attempt_count(row, TABLE)?,
        last_error: row.try_get("last_error").map_err(|e| corrupt(TABLE, e))?,
    })
}

fn container_from_row(row: &SqliteRow) -> Result<BufferedContainer> {
    const TABLE: &str = "buffered_containers";

    let size: i64 = row.try_get("size").map_err(|e| corrupt(TABLE, e))?;

    Ok(BufferedContainer {
        filename: row.try_get("filename").map_err(|e| corrupt(TABLE, e))?,
        payload: row.try_get("payload").map_err(|e| corrupt(TABLE, e))?,
        size: u64::try_from(size).map_err(|e| corrupt(TABLE, e))?,
        enqueued_at: row.try_get("enqueued_at").map_err(|e| corrupt(TABLE, e))?,
        attempt_count: attempt_count(row, TABLE)?,
        last_error: row.try_get("last_error").map_err(|e| corrupt(TABLE, e))?,
        seq: row.try_get("seq").map_err(|e| corrupt(TABLE, e))?,
    })
}

#[async_trait]
impl BufferStore for SqliteBufferStore {
    async fn enqueue_package(&self, package: &BufferedPackage) -> Result<()> {
        let links = serde_json::to_string(&package.links)
            .map_err(|e| BridgeError::Internal(format!("Failed to encode links: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO buffered_packages
                (id, name, links, passwords, source, enqueued_at, attempt_count, last_error)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(package.id.to_string())
        .bind(&package.name)
        .bind(links)
        .bind(&package.passwords)
        .bind(&package.source)
        .bind(package.enqueued_at)
        .bind(i64::from(package.attempt_count))
        .bind(&package.last_error)
        .execute(self.db.pool())
        .await
        .map_err(query_failed)?;

        tracing::debug!(package_id = %package.id, links = package.links.len(), "Package buffered");
        Ok(())
    }

    async fn enqueue_container(&self, container: &BufferedContainer) -> Result<i64> {
        let mut tx = self.db.pool().begin().await.map_err(transaction_failed)?;

        let replaced = sqlx::query("DELETE FROM buffered_containers WHERE filename = ?")
            .bind(&container.filename)
            .execute(&mut *tx)
            .await
            .map_err(transaction_failed)?
            .rows_affected();

        let seq: i64 = sqlx::query(
            r#"
            INSERT INTO buffered_containers
                (filename, payload, size, enqueued_at, attempt_count, last_error)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING seq
            "#,
        )
        .bind(&container.filename)
        .bind(&container.payload)
        .bind(container.payload.len() as i64)
        .bind(container.enqueued_at)
        .bind(i64::from(container.attempt_count))
        .bind(&container.last_error)
        .fetch_one(&mut *tx)
        .await
        .map_err(transaction_failed)?
        .try_get("seq")
        .map_err(transaction_failed)?;

        tx.commit().await.map_err(transaction_failed)?;

        tracing::debug!(
            filename = %container.filename,
            size = container.payload.len(),
            replaced = replaced > 0,
            "Container buffered"
        );
        Ok(seq)
    }

    async fn list_packages(&self) -> Result<Vec<BufferedPackage>> {
        let rows = sqlx::query("SELECT * FROM buffered_packages ORDER BY seq ASC")
            .fetch_all(self.db.pool())
            .await
            .map_err(query_failed)?;

        rows.iter().map(package_from_row).collect()
    }

    async fn list_containers(&self) -> Result<Vec<BufferedContainer>> {
        let rows = sqlx::query("SELECT * FROM buffered_containers ORDER BY seq ASC")
            .fetch_all(self.db.pool())
            .await
            .map_err(query_failed)?;

        rows.iter().map(container_from_row).collect()
    }

    async fn get_package(&self, id: PackageId) -> Result<Option<BufferedPackage>> {
        let row = sqlx::query("SELECT * FROM buffered_packages WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .map_err(query_failed)?;

        row.as_ref().map(package_from_row).transpose()
    }

    async fn get_container(&self, filename: &str, seq: i64) -> Result<Option<BufferedContainer>> {
        let row = sqlx::query("SELECT * FROM buffered_containers WHERE filename = ? AND seq = ?")
            .bind(filename)
            .bind(seq)
            .fetch_optional(self.db.pool())
            .await
            .map_err(query_failed)?;

        row.as_ref().map(container_from_row).transpose()
    }

    async fn remove_package(&self, id: PackageId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM buffered_packages WHERE id = ?")
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .map_err(query_failed)?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_container(&self, filename: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM buffered_containers WHERE filename = ?")
            .bind(filename)
            .execute(self.db.pool())
            .await
            .map_err(query_failed)?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_delivered_container(&self, filename: &str, seq: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM buffered_containers WHERE filename = ? AND seq = ?")
            .bind(filename)
            .bind(seq)
            .execute(self.db.pool())
            .await
            .map_err(query_failed)?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_package_failure(&self, id: PackageId, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE buffered_packages SET attempt_count = attempt_count + 1, last_error = ? WHERE id = ?",
        )
        .bind(error)
        .bind(id.to_string())
        .execute(self.db.pool())
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    async fn record_container_failure(&self, filename: &str, seq: i64, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE buffered_containers
            SET attempt_count = attempt_count + 1, last_error = ?
            WHERE filename = ? AND seq = ?
            "#,
        )
        .bind(error)
        .bind(filename)
        .bind(seq)
        .execute(self.db.pool())
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    async fn clear(&self) -> Result<ClearedCounts> {
        let mut tx = self.db.pool().begin().await.map_err(transaction_failed)?;

        let deleted_packages = sqlx::query("DELETE FROM buffered_packages")
            .execute(&mut *tx)
            .await
            .map_err(transaction_failed)?
            .rows_affected();

        let deleted_dlcs = sqlx::query("DELETE FROM buffered_containers")
            .execute(&mut *tx)
            .await
            .map_err(transaction_failed)?
            .rows_affected();

        tx.commit().await.map_err(transaction_failed)?;

        Ok(ClearedCounts {
            deleted_packages,
            deleted_dlcs,
        })
    }

    async fn count(&self) -> Result<u64> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM buffered_packages) +
                (SELECT COUNT(*) FROM buffered_containers) AS total
            "#,
        )
        .fetch_one(self.db.pool())
        .await
        .map_err(query_failed)?;

        let total: i64 = row.try_get("total").map_err(query_failed)?;
        Ok(total.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::DatabaseConfig;
    use types::{ErrorKind, LinkSubmission};

    async fn store() -> SqliteBufferStore {
        SqliteBufferStore::new(Database::new_in_memory().await.unwrap())
    }

    fn package(links: &[&str], name: Option<&str>) -> BufferedPackage {
        BufferedPackage::new(LinkSubmission {
            links: links.iter().map(|l| l.to_string()).collect(),
            name: name.map(str::to_string),
            password: Some("pw".to_string()),
            source: Some("http://source.example".to_string()),
        })
    }

    #[tokio::test]
    async fn test_package_round_trip_keeps_fields() {
        let store = store().await;
        let package = package(&["http://a", "http://b"], Some("pkg"));

        store.enqueue_package(&package).await.unwrap();

        let loaded = store.get_package(package.id).await.unwrap().unwrap();
        assert_eq!(loaded.links, vec!["http://a", "http://b"]);
        assert_eq!(loaded.name.as_deref(), Some("pkg"));
        assert_eq!(loaded.passwords.as_deref(), Some("pw"));
        assert_eq!(loaded.attempt_count, 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_packages_listed_in_insertion_order() {
        let store = store().await;
        for name in ["A", "B", "C"] {
            store.enqueue_package(&package(&["http://x"], Some(name))).await.unwrap();
        }

        let names: Vec<_> = store
            .list_packages()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_container_replaced_by_filename() {
        let store = store().await;

        let first = store
            .enqueue_container(&BufferedContainer::new("x.dlc".to_string(), b"old".to_vec()))
            .await
            .unwrap();
        store
            .enqueue_container(&BufferedContainer::new("y.dlc".to_string(), b"y".to_vec()))
            .await
            .unwrap();
        let second = store
            .enqueue_container(&BufferedContainer::new("x.dlc".to_string(), b"newer".to_vec()))
            .await
            .unwrap();
        assert!(second > first);

        let containers = store.list_containers().await.unwrap();
        assert_eq!(containers.len(), 2);
        // the replacement moves to the back of the queue
        assert_eq!(containers[0].filename, "y.dlc");
        assert_eq!(containers[1].filename, "x.dlc");
        assert_eq!(containers[1].payload, b"newer");
        assert_eq!(containers[1].size, 5);
    }

    #[tokio::test]
    async fn test_stale_delivery_does_not_remove_replacement() {
        let store = store().await;
        let old_seq = store
            .enqueue_container(&BufferedContainer::new("x.dlc".to_string(), b"old".to_vec()))
            .await
            .unwrap();
        store
            .enqueue_container(&BufferedContainer::new("x.dlc".to_string(), b"new".to_vec()))
            .await
            .unwrap();

        assert!(store.get_container("x.dlc", old_seq).await.unwrap().is_none());
        assert!(!store.remove_delivered_container("x.dlc", old_seq).await.unwrap());
        store.record_container_failure("x.dlc", old_seq, "boom").await.unwrap();

        let containers = store.list_containers().await.unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].payload, b"new");
        assert_eq!(containers[0].attempt_count, 0);
    }

    #[tokio::test]
    async fn test_failure_recording() {
        let store = store().await;
        let package = package(&["http://a"], None);
        store.enqueue_package(&package).await.unwrap();

        store.record_package_failure(package.id, "first").await.unwrap();
        store.record_package_failure(package.id, "second").await.unwrap();

        let loaded = store.get_package(package.id).await.unwrap().unwrap();
        assert_eq!(loaded.attempt_count, 2);
        assert_eq!(loaded.last_error.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let store = store().await;
        let a = package(&["http://a"], None);
        let b = package(&["http://b"], None);
        store.enqueue_package(&a).await.unwrap();
        store.enqueue_package(&b).await.unwrap();
        store
            .enqueue_container(&BufferedContainer::new("x.dlc".to_string(), b"x".to_vec()))
            .await
            .unwrap();

        assert!(store.remove_package(a.id).await.unwrap());
        assert!(!store.remove_package(a.id).await.unwrap());
        assert!(!store.remove_container("missing.dlc").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 2);

        let cleared = store.clear().await.unwrap();
        assert_eq!(cleared, ClearedCounts { deleted_packages: 1, deleted_dlcs: 1 });
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_is_surfaced() {
        let db = Database::new_in_memory().await.unwrap();
        let store = SqliteBufferStore::new(db.clone());
        db.close().await.unwrap();

        let err = store.count().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[tokio::test]
    async fn test_buffer_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite:{}", dir.path().join("buffer.db").display()),
            ..DatabaseConfig::default()
        };

        let package = package(&["http://durable"], Some("durable"));
        {
            let db = Database::new(&config).await.unwrap();
            db.migrate().await.unwrap();
            let store = SqliteBufferStore::new(db.clone());
            store.enqueue_package(&package).await.unwrap();
            store
                .enqueue_container(&BufferedContainer::new("keep.dlc".to_string(), b"dlc".to_vec()))
                .await
                .unwrap();
            db.close().await.unwrap();
        }

        let db = Database::new(&config).await.unwrap();
        db.migrate().await.unwrap();
        let store = SqliteBufferStore::new(db);

        let packages = store.list_packages().await.unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].id, package.id);
        assert_eq!(packages[0].links, vec!["http://durable"]);
        assert_eq!(store.list_containers().await.unwrap()[0].payload, b"dlc");
    }
}
