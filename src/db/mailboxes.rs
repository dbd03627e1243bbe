use anyhow::Result;
use sqlx::sqlite::SqlitePool;

use crate::domain::MailboxRecord;

/// Durable directory of watched mailboxes. The poller re-reads it every tick,
/// so additions and removals take effect on the next pass without restarts.
#[derive(Clone)]
pub struct MailboxRepository {
    pool: SqlitePool,
}

impl MailboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Inserts a mailbox; returns false when the name is already saved.
    pub async fn add(&self, record: &MailboxRecord) -> Result<bool> {
        let affected = sqlx::query(r#"INSERT OR IGNORE INTO mailboxes (name, account) VALUES (?1, ?2)"#)
            .bind(&record.name)
            .bind(&record.account)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    pub async fn remove(&self, name: &str) -> Result<bool> {
        let affected = sqlx::query(r#"DELETE FROM mailboxes WHERE name = ?1"#)
            .bind(name)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    pub async fn clear(&self) -> Result<u64> {
        let affected = sqlx::query(r#"DELETE FROM mailboxes"#)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }

    pub async fn find(&self, name: &str) -> Result<Option<MailboxRecord>> {
        let row: Option<(String, String)> =
            sqlx::query_as(r#"SELECT name, account FROM mailboxes WHERE name = ?1"#)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(name, account)| MailboxRecord { name, account }))
    }

    /// All mailboxes in stable tick-visit order: insertion order, then name.
    pub async fn list(&self) -> Result<Vec<MailboxRecord>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as(r#"SELECT name, account FROM mailboxes ORDER BY added_at, name"#)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(name, account)| MailboxRecord { name, account })
            .collect())
    }
}
