//! Exclusive write transactions.

use sqlx::Sqlite;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use std::ops::{Deref, DerefMut};

/// A pooled connection inside `BEGIN IMMEDIATE ... COMMIT`.
///
/// The write lock is held from `begin` until `commit` or `rollback`. A
/// transaction dropped without either (a cancelled future) detaches its
/// connection from the pool, so the open transaction dies with it instead of
/// leaking into the next borrower.
pub struct ImmediateTransaction {
    conn: Option<PoolConnection<Sqlite>>,
}

impl ImmediateTransaction {
    /// Acquire a connection and take the database write lock.
    pub async fn begin(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(Self { conn: Some(conn) })
    }

    pub async fn commit(mut self) -> Result<(), sqlx::Error> {
        if let Some(mut conn) = self.conn.take() {
            sqlx::query("COMMIT").execute(&mut *conn).await?;
        }
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), sqlx::Error> {
        if let Some(mut conn) = self.conn.take() {
            sqlx::query("ROLLBACK").execute(&mut *conn).await?;
        }
        Ok(())
    }

    /// Commit on `Ok`, roll back on `Err`.
    ///
    /// A failed rollback is logged and the original error is returned.
    pub async fn finish<T, E>(self, result: Result<T, E>) -> Result<T, E>
    where
        E: From<sqlx::Error>,
    {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    log::error!("Rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }
}

impl Deref for ImmediateTransaction {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        match &self.conn {
            Some(conn) => &**conn,
            None => unreachable!("transaction used after commit or rollback"),
        }
    }
}

impl DerefMut for ImmediateTransaction {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        match &mut self.conn {
            Some(conn) => &mut **conn,
            None => unreachable!("transaction used after commit or rollback"),
        }
    }
}

impl Drop for ImmediateTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            log::warn!("Transaction dropped while open; discarding its connection");
            drop(conn.detach());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use sqlx::Row;

    async fn count_accounts(pool: &SqlitePool) -> i64 {
        sqlx::query("SELECT COUNT(*) AS n FROM accounts")
            .fetch_one(pool)
            .await
            .unwrap()
            .get("n")
    }

    #[tokio::test]
    async fn test_finish_commits_on_ok() {
        let db = Database::in_memory().await.unwrap();
        let mut tx = ImmediateTransaction::begin(db.pool()).await.unwrap();
        let result: Result<(), sqlx::Error> = sqlx::query("INSERT INTO accounts (user_id) VALUES (1)")
            .execute(&mut *tx)
            .await
            .map(|_| ());
        tx.finish(result).await.unwrap();

        assert_eq!(count_accounts(db.pool()).await, 1);
    }

    #[tokio::test]
    async fn test_finish_rolls_back_on_err() {
        let db = Database::in_memory().await.unwrap();
        let mut tx = ImmediateTransaction::begin(db.pool()).await.unwrap();
        sqlx::query("INSERT INTO accounts (user_id) VALUES (1)")
            .execute(&mut *tx)
            .await
            .unwrap();
        let result: Result<(), sqlx::Error> = Err(sqlx::Error::RowNotFound);
        assert!(tx.finish(result).await.is_err());

        assert_eq!(count_accounts(db.pool()).await, 0);
    }
}
