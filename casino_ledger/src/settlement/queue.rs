//! Durable FIFO of funded stakes.
#![allow(clippy::needless_raw_string_hashes)]

use super::models::{QueueEntry, QueueStatus};
use crate::ledger::{Cents, UserId};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};

fn entry_from_row(row: &SqliteRow) -> Result<QueueEntry, sqlx::Error> {
    let status: String = row.get("status");
    Ok(QueueEntry {
        id: row.get("id"),
        user_id: row.get("user_id"),
        amount: row.get("amount"),
        game: row.get("game"),
        bet_type: row.get("bet_type"),
        is_bonus_bet: row.get("is_bonus_bet"),
        status: status
            .parse::<QueueStatus>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?,
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    })
}

/// Append a pending entry. Returns its ID.
pub async fn add_to_queue(
    conn: &mut SqliteConnection,
    user_id: UserId,
    amount: Cents,
    game: &str,
    bet_type: &str,
    is_bonus_bet: bool,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO bet_queue (user_id, amount, game, bet_type, is_bonus_bet, status)
        VALUES (?, ?, ?, ?, ?, 'pending')
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(game)
    .bind(bet_type)
    .bind(is_bonus_bet)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.get("id"))
}

pub async fn pending_for_user(
    conn: &mut SqliteConnection,
    user_id: UserId,
) -> Result<Option<QueueEntry>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT * FROM bet_queue WHERE user_id = ? AND status = 'pending' ORDER BY id LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(entry_from_row).transpose()
}

/// Flip a pending entry to processed.
///
/// # Returns
///
/// * `Result<bool, sqlx::Error>` - False when the entry was not pending
pub async fn mark_processed(conn: &mut SqliteConnection, queue_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE bet_queue SET status = 'processed' WHERE id = ? AND status = 'pending'")
        .bind(queue_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Pool-level queue access.
#[derive(Clone)]
pub struct BetQueue {
    pool: SqlitePool,
}

impl BetQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Enqueue without funding. Placement goes through
    /// [`BetManager`](super::BetManager), which debits first.
    pub async fn add_to_queue(
        &self,
        user_id: UserId,
        amount: Cents,
        game: &str,
        bet_type: &str,
        is_bonus_bet: bool,
    ) -> Result<i64, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        add_to_queue(&mut conn, user_id, amount, game, bet_type, is_bonus_bet).await
    }

    pub async fn get_user_pending_bet(&self, user_id: UserId) -> Result<Option<QueueEntry>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        pending_for_user(&mut conn, user_id).await
    }

    pub async fn get_entry(&self, queue_id: i64) -> Result<Option<QueueEntry>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM bet_queue WHERE id = ?")
            .bind(queue_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(entry_from_row).transpose()
    }

    /// Oldest pending entries, lowest ID first.
    pub async fn oldest_pending(&self, limit: i64) -> Result<Vec<QueueEntry>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM bet_queue WHERE status = 'pending' ORDER BY id LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(entry_from_row).collect()
    }

    pub async fn mark_processed(&self, queue_id: i64) -> Result<bool, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        mark_processed(&mut conn, queue_id).await
    }

    pub async fn pending_count(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS pending FROM bet_queue WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("pending"))
    }

    /// Mark every pending entry processed without settling it.
    ///
    /// Run once at startup: stakes left over from a previous process are
    /// forfeited rather than replayed.
    pub async fn sweep_pending(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE bet_queue SET status = 'processed' WHERE status = 'pending'")
            .execute(&self.pool)
            .await?;

        let swept = result.rows_affected();
        if swept > 0 {
            log::warn!("Discarded {} unsettled bets from a previous run", swept);
        }
        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> (Database, BetQueue) {
        let db = Database::in_memory().await.unwrap();
        sqlx::query("INSERT INTO accounts (user_id, username) VALUES (1, 'alice'), (2, 'bob')")
            .execute(db.pool())
            .await
            .unwrap();
        let queue = BetQueue::new(db.pool().clone());
        (db, queue)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (_db, queue) = setup().await;

        let first = queue.add_to_queue(1, 100, "cube", "even", false).await.unwrap();
        let second = queue.add_to_queue(2, 200, "darts", "red", true).await.unwrap();

        let pending = queue.oldest_pending(10).await.unwrap();
        assert_eq!(pending.iter().map(|e| e.id).collect::<Vec<_>>(), vec![first, second]);
        assert!(pending[1].is_bonus_bet);
        assert_eq!(queue.pending_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_mark_processed_once() {
        let (_db, queue) = setup().await;

        let id = queue.add_to_queue(1, 100, "cube", "even", false).await.unwrap();
        assert!(queue.mark_processed(id).await.unwrap());
        assert!(!queue.mark_processed(id).await.unwrap());

        let entry = queue.get_entry(id).await.unwrap().unwrap();
        assert_eq!(entry.status, QueueStatus::Processed);
        assert!(queue.get_user_pending_bet(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_pending() {
        let (_db, queue) = setup().await;

        queue.add_to_queue(1, 100, "cube", "even", false).await.unwrap();
        queue.add_to_queue(2, 100, "cube", "odd", false).await.unwrap();

        assert_eq!(queue.sweep_pending().await.unwrap(), 2);
        assert_eq!(queue.pending_count().await.unwrap(), 0);
        assert_eq!(queue.sweep_pending().await.unwrap(), 0);
    }
}
