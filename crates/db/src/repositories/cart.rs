use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};
use tracing::warn;

use basketbot_core::cart::{CartStore, StoreError};
use basketbot_core::{ProductCode, Quantity, StoredLine, UserId};

use super::RepositoryError;
use crate::DbPool;

/// `cart_line` table access. Rows are returned in insertion order.
pub struct SqlCartStore {
    pool: DbPool,
}

impl SqlCartStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn unavailable(operation: &'static str, user_id: UserId, error: RepositoryError) -> StoreError {
    warn!(
        event_name = "db.cart.query_failed",
        operation,
        user_id = user_id.0,
        error = %error,
        "cart query failed"
    );
    StoreError::from(error)
}

#[async_trait]
impl CartStore for SqlCartStore {
    async fn insert(
        &self,
        user_id: UserId,
        quantity: Quantity,
        code: ProductCode,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO cart_line (user_id, quantity, product_code) VALUES (?, ?, ?)")
            .bind(user_id.0)
            .bind(i64::from(quantity.get()))
            .bind(code.to_string())
            .execute(&self.pool)
            .await
            .map_err(|error| unavailable("insert", user_id, error.into()))?;
        Ok(())
    }

    async fn clear(&self, user_id: UserId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM cart_line WHERE user_id = ?")
            .bind(user_id.0)
            .execute(&self.pool)
            .await
            .map_err(|error| unavailable("clear", user_id, error.into()))?;
        Ok(result.rows_affected())
    }

    async fn delete_one(&self, user_id: UserId, code: ProductCode) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM cart_line WHERE user_id = ? AND product_code = ?")
            .bind(user_id.0)
            .bind(code.to_string())
            .execute(&self.pool)
            .await
            .map_err(|error| unavailable("delete_one", user_id, error.into()))?;
        Ok(result.rows_affected())
    }

    async fn list_for(&self, user_id: UserId) -> Result<Vec<StoredLine>, StoreError> {
        let rows = sqlx::query(
            "SELECT product_code, quantity
             FROM cart_line
             WHERE user_id = ?
             ORDER BY id ASC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| unavailable("list_for", user_id, error.into()))?;

        rows.into_iter()
            .map(line_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| unavailable("list_for", user_id, error))
    }

    async fn count_for(&self, user_id: UserId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_line WHERE user_id = ?")
            .bind(user_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| unavailable("count_for", user_id, error.into()))?;
        u64::try_from(count).map_err(|_| {
            unavailable(
                "count_for",
                user_id,
                RepositoryError::Decode(format!("negative row count {count}")),
            )
        })
    }
}

fn line_from_row(row: SqliteRow) -> Result<StoredLine, RepositoryError> {
    Ok(StoredLine {
        product_code: row.try_get("product_code")?,
        quantity: row.try_get("quantity")?,
    })
}
