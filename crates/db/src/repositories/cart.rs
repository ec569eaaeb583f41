use sqlx::Row;

use easyshop_core::{CartLineRecord, ProductId, UserId};

use super::product::parse_decimal;
use super::{CartRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCartRepository {
    pool: DbPool,
}

impl SqlCartRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<CartLineRecord, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let discount_str: String = row.try_get("discount_percent").map_err(decode)?;

    Ok(CartLineRecord {
        product_id: ProductId(row.try_get("product_id").map_err(decode)?),
        quantity: row.try_get("quantity").map_err(decode)?,
        discount_percent: parse_decimal("discount_percent", &discount_str)?,
    })
}

#[async_trait::async_trait]
impl CartRepository for SqlCartRepository {
    async fn load(&self, user_id: UserId) -> Result<Vec<CartLineRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT product_id, quantity, discount_percent
             FROM shopping_cart
             WHERE user_id = ?
             ORDER BY product_id",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn save(
        &self,
        user_id: UserId,
        lines: &[CartLineRecord],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM shopping_cart WHERE user_id = ?")
            .bind(user_id.0)
            .execute(&mut *tx)
            .await?;

        for line in lines {
            sqlx::query(
                "INSERT INTO shopping_cart (user_id, product_id, quantity, discount_percent)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(user_id.0)
            .bind(line.product_id.0)
            .bind(line.quantity)
            .bind(line.discount_percent.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shopping_cart WHERE user_id = ?")
            .bind(user_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
