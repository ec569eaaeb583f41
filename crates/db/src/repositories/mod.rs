use async_trait::async_trait;
use thiserror::Error;

use easyshop_core::{
    ApplicationError, CartLineRecord, Category, CategoryDeletion, CategoryDraft, CategoryId,
    Product, ProductDraft, ProductFilter, ProductId, UserId,
};

pub mod cart;
pub mod category;
pub mod memory;
pub mod product;

pub use cart::SqlCartRepository;
pub use category::SqlCategoryRepository;
pub use memory::{
    InMemoryCartRepository, InMemoryCatalog, InMemoryCategoryRepository, InMemoryProductRepository,
};
pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn list_by_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Product>, RepositoryError>;

    async fn exists_by_category(&self, category_id: CategoryId) -> Result<bool, RepositoryError>;

    /// Products matching every predicate of `filter`, in ascending id order.
    async fn search(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError>;

    async fn create(&self, draft: ProductDraft) -> Result<Product, RepositoryError>;

    /// Returns `None` when no product has `id`.
    async fn update(
        &self,
        id: ProductId,
        draft: ProductDraft,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Returns `false` when no product has `id`.
    async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Category>, RepositoryError>;

    async fn find_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError>;

    async fn create(&self, draft: CategoryDraft) -> Result<Category, RepositoryError>;

    async fn update(
        &self,
        id: CategoryId,
        draft: CategoryDraft,
    ) -> Result<Option<Category>, RepositoryError>;

    /// Deletes the category only if no product references it. The dependent check and the
    /// delete are a single atomic step.
    async fn delete_unreferenced(&self, id: CategoryId)
        -> Result<CategoryDeletion, RepositoryError>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn load(&self, user_id: UserId) -> Result<Vec<CartLineRecord>, RepositoryError>;

    /// Replaces every stored line of `user_id` with `lines`.
    async fn save(&self, user_id: UserId, lines: &[CartLineRecord])
        -> Result<(), RepositoryError>;

    async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError>;
}
