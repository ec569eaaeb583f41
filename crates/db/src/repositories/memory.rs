use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use easyshop_core::{
    CartLineRecord, Category, CategoryDeletion, CategoryDraft, CategoryId, Product, ProductDraft,
    ProductFilter, ProductId, UserId,
};

use super::{CartRepository, CategoryRepository, ProductRepository, RepositoryError};

#[derive(Default)]
struct CatalogState {
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    next_category_id: i64,
    next_product_id: i64,
}

impl CatalogState {
    fn allocate_category_id(&mut self) -> CategoryId {
        self.next_category_id = self
            .next_category_id
            .max(self.categories.keys().next_back().map_or(0, |id| id.0))
            + 1;
        CategoryId(self.next_category_id)
    }

    fn allocate_product_id(&mut self) -> ProductId {
        self.next_product_id =
            self.next_product_id.max(self.products.keys().next_back().map_or(0, |id| id.0)) + 1;
        ProductId(self.next_product_id)
    }
}

/// Categories and products sharing one lock, so the category delete guard sees
/// the same product set that product writes modify.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn products(&self) -> InMemoryProductRepository {
        InMemoryProductRepository { state: Arc::clone(&self.state) }
    }

    pub fn categories(&self) -> InMemoryCategoryRepository {
        InMemoryCategoryRepository { state: Arc::clone(&self.state) }
    }

    /// Inserts a category with a caller-chosen id, replacing any existing one.
    pub async fn insert_category(&self, category: Category) {
        self.state.write().await.categories.insert(category.id, category);
    }

    /// Inserts a product with a caller-chosen id, replacing any existing one.
    pub async fn insert_product(&self, product: Product) {
        self.state.write().await.products.insert(product.id, product);
    }
}

pub struct InMemoryProductRepository {
    state: Arc<RwLock<CatalogState>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.products.get(&id).cloned())
    }

    async fn list_by_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.read().await;
        Ok(ProductFilter::any().category(category_id).apply(state.products.values()))
    }

    async fn exists_by_category(&self, category_id: CategoryId) -> Result<bool, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.products.values().any(|product| product.category_id == category_id))
    }

    async fn search(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.read().await;
        Ok(filter.apply(state.products.values()))
    }

    async fn create(&self, draft: ProductDraft) -> Result<Product, RepositoryError> {
        let mut state = self.state.write().await;
        let id = state.allocate_product_id();
        let product = draft.into_product(id);
        state.products.insert(id, product.clone());
        Ok(product)
    }

    async fn update(
        &self,
        id: ProductId,
        draft: ProductDraft,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(slot) = state.products.get_mut(&id) else {
            return Ok(None);
        };
        *slot = draft.into_product(id);
        Ok(Some(slot.clone()))
    }

    async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(state.products.remove(&id).is_some())
    }
}

pub struct InMemoryCategoryRepository {
    state: Arc<RwLock<CatalogState>>,
}

#[async_trait::async_trait]
impl CategoryRepository for InMemoryCategoryRepository {
    async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.categories.values().cloned().collect())
    }

    async fn find_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.categories.get(&id).cloned())
    }

    async fn create(&self, draft: CategoryDraft) -> Result<Category, RepositoryError> {
        let mut state = self.state.write().await;
        let id = state.allocate_category_id();
        let category = draft.into_category(id);
        state.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn update(
        &self,
        id: CategoryId,
        draft: CategoryDraft,
    ) -> Result<Option<Category>, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(slot) = state.categories.get_mut(&id) else {
            return Ok(None);
        };
        *slot = draft.into_category(id);
        Ok(Some(slot.clone()))
    }

    async fn delete_unreferenced(
        &self,
        id: CategoryId,
    ) -> Result<CategoryDeletion, RepositoryError> {
        let mut state = self.state.write().await;
        let product_count =
            state.products.values().filter(|product| product.category_id == id).count() as i64;
        if product_count > 0 {
            return Ok(CategoryDeletion::HasDependents { product_count });
        }
        if state.categories.remove(&id).is_none() {
            return Ok(CategoryDeletion::NotFound);
        }
        Ok(CategoryDeletion::Deleted)
    }
}

#[derive(Default)]
pub struct InMemoryCartRepository {
    carts: RwLock<HashMap<UserId, Vec<CartLineRecord>>>,
}

impl InMemoryCartRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn load(&self, user_id: UserId) -> Result<Vec<CartLineRecord>, RepositoryError> {
        let carts = self.carts.read().await;
        Ok(carts.get(&user_id).cloned().unwrap_or_default())
    }

    async fn save(
        &self,
        user_id: UserId,
        lines: &[CartLineRecord],
    ) -> Result<(), RepositoryError> {
        let mut carts = self.carts.write().await;
        if lines.is_empty() {
            carts.remove(&user_id);
        } else {
            carts.insert(user_id, lines.to_vec());
        }
        Ok(())
    }

    async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        self.carts.write().await.remove(&user_id);
        Ok(())
    }
}
