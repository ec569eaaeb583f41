use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Row, Sqlite};

use easyshop_core::{
    CategoryId, Product, ProductDraft, ProductFilter, ProductId, ProductPredicate,
};

use super::{ProductRepository, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str =
    "product_id, name, price, category_id, description, color, stock, featured, image_url";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn parse_decimal(field: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value)
        .map_err(|error| RepositoryError::Decode(format!("{field} `{value}`: {error}")))
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let price_str: String = row.try_get("price").map_err(decode)?;

    Ok(Product {
        id: ProductId(row.try_get("product_id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        price: parse_decimal("price", &price_str)?,
        category_id: CategoryId(row.try_get("category_id").map_err(decode)?),
        description: row.try_get("description").map_err(decode)?,
        color: row.try_get("color").map_err(decode)?,
        stock: row.try_get("stock").map_err(decode)?,
        featured: row.try_get("featured").map_err(decode)?,
        image_url: row.try_get("image_url").map_err(decode)?,
    })
}

/// Pushes the exact-match predicates into SQL. Price bounds are left to
/// [`ProductFilter::matches`] so they are compared as decimals, not as text.
fn push_predicates(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter) {
    for predicate in filter.predicates() {
        match predicate {
            ProductPredicate::Category(category_id) => {
                builder.push(" AND category_id = ");
                builder.push_bind(category_id.0);
            }
            ProductPredicate::Color(color) => {
                builder.push(" AND color = ");
                builder.push_bind(color.clone());
            }
            ProductPredicate::MinPrice(_) | ProductPredicate::MaxPrice(_) => {}
        }
    }
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn list_by_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE category_id = ? ORDER BY product_id"
        ))
        .bind(category_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn exists_by_category(&self, category_id: CategoryId) -> Result<bool, RepositoryError> {
        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE category_id = ?)")
                .bind(category_id.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists == 1)
    }

    async fn search(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE 1=1"
        ));
        push_predicates(&mut builder, filter);
        builder.push(" ORDER BY product_id");

        let rows = builder.build().fetch_all(&self.pool).await?;

        let mut matched = Vec::with_capacity(rows.len());
        for row in &rows {
            let product = row_to_product(row)?;
            if filter.matches(&product) {
                matched.push(product);
            }
        }
        Ok(matched)
    }

    async fn create(&self, draft: ProductDraft) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO products
                 (name, price, category_id, description, color, stock, featured, image_url)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&draft.name)
        .bind(draft.price.to_string())
        .bind(draft.category_id.0)
        .bind(&draft.description)
        .bind(&draft.color)
        .bind(draft.stock)
        .bind(draft.featured)
        .bind(&draft.image_url)
        .execute(&self.pool)
        .await?;

        Ok(draft.into_product(ProductId(result.last_insert_rowid())))
    }

    async fn update(
        &self,
        id: ProductId,
        draft: ProductDraft,
    ) -> Result<Option<Product>, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products
             SET name = ?, price = ?, category_id = ?, description = ?, color = ?,
                 stock = ?, featured = ?, image_url = ?
             WHERE product_id = ?",
        )
        .bind(&draft.name)
        .bind(draft.price.to_string())
        .bind(draft.category_id.0)
        .bind(&draft.description)
        .bind(&draft.color)
        .bind(draft.stock)
        .bind(draft.featured)
        .bind(&draft.image_url)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(draft.into_product(id)))
    }

    async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE product_id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use easyshop_core::{CategoryId, ProductDraft, ProductFilter, ProductId, SearchCriteria};

    use super::SqlProductRepository;
    use crate::repositories::ProductRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        sqlx::query(
            "INSERT INTO categories (category_id, name) VALUES (1, 'Electronics'), (2, 'Fashion')",
        )
        .execute(&pool)
        .await
        .expect("seed categories");
        pool
    }

    fn draft(name: &str, price: Decimal, category: i64, color: Option<&str>) -> ProductDraft {
        ProductDraft {
            name: name.to_string(),
            price,
            category_id: CategoryId(category),
            description: String::new(),
            color: color.map(str::to_string),
            stock: 3,
            featured: false,
            image_url: None,
        }
    }

    async fn seed(repo: &SqlProductRepository) {
        // text ordering would put "9.99" after "10.00" and "100.00"
        for product in [
            draft("Cable", Decimal::new(999, 2), 1, Some("red")),
            draft("Headphones", Decimal::new(1000, 2), 1, Some("red")),
            draft("Scarf", Decimal::new(2000, 2), 2, Some("red")),
            draft("Jacket", Decimal::new(10000, 2), 2, Some("Red")),
            draft("Charger", Decimal::new(1550, 2), 1, None),
        ] {
            repo.create(product).await.expect("create product");
        }
    }

    fn names(products: &[easyshop_core::Product]) -> Vec<&str> {
        products.iter().map(|product| product.name.as_str()).collect()
    }

    #[tokio::test]
    async fn create_then_find_preserves_exact_price() {
        let pool = setup().await;
        let repo = SqlProductRepository::new(pool.clone());

        let created = repo
            .create(draft("Laptop", Decimal::new(129_999, 2), 1, Some("Silver")))
            .await
            .expect("create");
        let found = repo.find_by_id(created.id).await.expect("find").expect("present");

        assert_eq!(found, created);
        assert_eq!(found.price.to_string(), "1299.99");
        assert!(repo.find_by_id(ProductId(999)).await.expect("find").is_none());

        pool.close().await;
    }

    #[tokio::test]
    async fn search_without_filters_returns_every_product() {
        let pool = setup().await;
        let repo = SqlProductRepository::new(pool.clone());
        seed(&repo).await;

        let found = repo.search(&ProductFilter::any()).await.expect("search");
        assert_eq!(found.len(), 5);

        pool.close().await;
    }

    #[tokio::test]
    async fn search_compares_prices_as_decimals() {
        let pool = setup().await;
        let repo = SqlProductRepository::new(pool.clone());
        seed(&repo).await;

        let filter = ProductFilter::try_from(SearchCriteria {
            min_price: Some(Decimal::new(10, 0)),
            max_price: Some(Decimal::new(20, 0)),
            color: Some("red".to_string()),
            ..SearchCriteria::default()
        })
        .expect("criteria");
        let found = repo.search(&filter).await.expect("search");

        assert_eq!(names(&found), vec!["Headphones", "Scarf"]);

        pool.close().await;
    }

    #[tokio::test]
    async fn search_by_category_matches_list_by_category() {
        let pool = setup().await;
        let repo = SqlProductRepository::new(pool.clone());
        seed(&repo).await;

        let searched =
            repo.search(&ProductFilter::any().category(CategoryId(2))).await.expect("search");
        let listed = repo.list_by_category(CategoryId(2)).await.expect("list");

        assert_eq!(searched, listed);
        assert_eq!(names(&searched), vec!["Scarf", "Jacket"]);
        assert!(repo.exists_by_category(CategoryId(2)).await.expect("exists"));

        pool.close().await;
    }

    #[tokio::test]
    async fn search_with_no_match_is_empty() {
        let pool = setup().await;
        let repo = SqlProductRepository::new(pool.clone());
        seed(&repo).await;

        let found = repo.search(&ProductFilter::any().color("purple")).await.expect("search");
        assert!(found.is_empty());

        pool.close().await;
    }

    #[tokio::test]
    async fn search_on_closed_pool_is_an_error_not_an_empty_result() {
        let pool = setup().await;
        let repo = SqlProductRepository::new(pool.clone());
        pool.close().await;

        assert!(repo.search(&ProductFilter::any()).await.is_err());
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let pool = setup().await;
        let repo = SqlProductRepository::new(pool.clone());
        let created =
            repo.create(draft("Mouse", Decimal::new(2500, 2), 1, None)).await.expect("create");

        let updated = repo
            .update(created.id, draft("Mouse v2", Decimal::new(2750, 2), 1, Some("Black")))
            .await
            .expect("update")
            .expect("present");
        assert_eq!(updated.name, "Mouse v2");
        assert_eq!(
            repo.find_by_id(created.id).await.expect("find").map(|p| p.price),
            Some(Decimal::new(2750, 2))
        );

        assert!(repo
            .update(ProductId(404), draft("Ghost", Decimal::ONE, 1, None))
            .await
            .expect("update")
            .is_none());
        assert!(repo.delete(created.id).await.expect("delete"));
        assert!(!repo.delete(created.id).await.expect("second delete"));

        pool.close().await;
    }
}
