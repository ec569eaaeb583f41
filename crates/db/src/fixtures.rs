use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_CATEGORY_IDS: &[i64] = &[1, 2, 3];

const SEED_PRODUCT_IDS: &[i64] = &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10];

/// Products per seeded category, in category id order.
const SEED_PRODUCTS_PER_CATEGORY: &[(i64, i64)] = &[(1, 4), (2, 3), (3, 3)];

/// Deterministic demo catalog used by `easyshop seed` and integration tests.
pub struct DemoCatalog;

impl DemoCatalog {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_catalog.sql");

    /// Loads the demo catalog. Rows that already exist are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            categories_seeded: SEED_CATEGORY_IDS.len(),
            products_seeded: SEED_PRODUCT_IDS.len(),
        })
    }

    /// Checks that every seeded row is present and still attached to its category.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let categories: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM categories WHERE category_id IN {}",
            sql_list(SEED_CATEGORY_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("categories-present", categories == SEED_CATEGORY_IDS.len() as i64));

        let products: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM products WHERE product_id IN {}",
            sql_list(SEED_PRODUCT_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("products-present", products == SEED_PRODUCT_IDS.len() as i64));

        for (category_id, expected) in SEED_PRODUCTS_PER_CATEGORY {
            let count: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(*) FROM products WHERE category_id = ?1 AND product_id IN {}",
                sql_list(SEED_PRODUCT_IDS)
            ))
            .bind(category_id)
            .fetch_one(pool)
            .await?;
            checks.push((category_label(*category_id), count == *expected));
        }

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the seeded rows, including any cart lines that reference them.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        let products = sql_list(SEED_PRODUCT_IDS);

        sqlx::query(&format!("DELETE FROM shopping_cart WHERE product_id IN {products}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM products WHERE product_id IN {products}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "DELETE FROM categories WHERE category_id IN {}",
            sql_list(SEED_CATEGORY_IDS)
        ))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn category_label(category_id: i64) -> &'static str {
    match category_id {
        1 => "electronics-products",
        2 => "fashion-products",
        _ => "home-kitchen-products",
    }
}

fn sql_list(ids: &[i64]) -> String {
    let joined = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
    format!("({joined})")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedResult {
    pub categories_seeded: usize,
    pub products_seeded: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use easyshop_core::{CategoryId, ProductFilter, SearchCriteria};

    use super::*;
    use crate::repositories::{ProductRepository, SqlProductRepository};
    use crate::{connect_with_settings, migrations};

    async fn seeded_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        DemoCatalog::load(&pool).await.expect("load demo catalog");
        pool
    }

    #[test]
    fn sql_fixture_is_not_empty() {
        assert!(DemoCatalog::SQL.contains("INSERT OR IGNORE INTO products"));
    }

    #[tokio::test]
    async fn load_is_idempotent_and_verifies() {
        let pool = seeded_pool().await;
        let second = DemoCatalog::load(&pool).await.expect("second load");
        assert_eq!(second.products_seeded, SEED_PRODUCT_IDS.len());

        let verification = DemoCatalog::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "failed checks: {:?}", verification.checks);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&pool)
            .await
            .expect("count products");
        assert_eq!(total, SEED_PRODUCT_IDS.len() as i64);

        pool.close().await;
    }

    #[tokio::test]
    async fn clean_removes_seeded_rows() {
        let pool = seeded_pool().await;
        DemoCatalog::clean(&pool).await.expect("clean");

        let verification = DemoCatalog::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);

        pool.close().await;
    }

    #[tokio::test]
    async fn seeded_catalog_supports_combined_search() {
        let pool = seeded_pool().await;
        let products = SqlProductRepository::new(pool.clone());

        let filter = ProductFilter::try_from(SearchCriteria {
            category_id: Some(CategoryId(2)),
            min_price: Some(Decimal::new(25, 0)),
            max_price: Some(Decimal::new(80, 0)),
            color: Some("Red".to_string()),
        })
        .expect("criteria");
        let found = products.search(&filter).await.expect("search");
        let names: Vec<&str> = found.iter().map(|product| product.name.as_str()).collect();

        assert_eq!(names, vec!["Men's T-Shirt", "Running Shoes"]);

        pool.close().await;
    }
}
