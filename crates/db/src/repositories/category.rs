use sqlx::Row;

use easyshop_core::{Category, CategoryDeletion, CategoryDraft, CategoryId};

use super::{CategoryRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCategoryRepository {
    pool: DbPool,
}

impl SqlCategoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_category(row: &sqlx::sqlite::SqliteRow) -> Result<Category, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    Ok(Category {
        id: CategoryId(row.try_get("category_id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
    })
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    error.as_database_error().is_some_and(|db_error| db_error.is_foreign_key_violation())
}

#[async_trait::async_trait]
impl CategoryRepository for SqlCategoryRepository {
    async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT category_id, name, description FROM categories ORDER BY category_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_category).collect()
    }

    async fn find_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query(
            "SELECT category_id, name, description FROM categories WHERE category_id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_category).transpose()
    }

    async fn create(&self, draft: CategoryDraft) -> Result<Category, RepositoryError> {
        let result = sqlx::query("INSERT INTO categories (name, description) VALUES (?, ?)")
            .bind(&draft.name)
            .bind(&draft.description)
            .execute(&self.pool)
            .await?;

        Ok(draft.into_category(CategoryId(result.last_insert_rowid())))
    }

    async fn update(
        &self,
        id: CategoryId,
        draft: CategoryDraft,
    ) -> Result<Option<Category>, RepositoryError> {
        let result =
            sqlx::query("UPDATE categories SET name = ?, description = ? WHERE category_id = ?")
                .bind(&draft.name)
                .bind(&draft.description)
                .bind(id.0)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(draft.into_category(id)))
    }

    async fn delete_unreferenced(
        &self,
        id: CategoryId,
    ) -> Result<CategoryDeletion, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = ?")
                .bind(id.0)
                .fetch_one(&mut *tx)
                .await?;
        if product_count > 0 {
            tx.rollback().await?;
            return Ok(CategoryDeletion::HasDependents { product_count });
        }

        // The FK on products.category_id backs the count above if a product lands
        // between the two statements.
        let deleted = match sqlx::query("DELETE FROM categories WHERE category_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await
        {
            Ok(result) => result.rows_affected(),
            Err(error) if is_foreign_key_violation(&error) => {
                tx.rollback().await?;
                let product_count: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = ?")
                        .bind(id.0)
                        .fetch_one(&self.pool)
                        .await?;
                return Ok(CategoryDeletion::HasDependents { product_count });
            }
            Err(error) => return Err(error.into()),
        };
        tx.commit().await?;

        if deleted == 0 {
            return Ok(CategoryDeletion::NotFound);
        }
        Ok(CategoryDeletion::Deleted)
    }
}
