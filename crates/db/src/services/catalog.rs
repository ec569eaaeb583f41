use std::sync::Arc;

use tracing::info;

use easyshop_core::{
    ApplicationError, Category, CategoryDeletion, CategoryDraft, CategoryId, Product,
    ProductDraft, ProductFilter, ProductId, SearchCriteria,
};

use crate::repositories::{CategoryRepository, ProductRepository};

/// Product search and category/product administration.
pub struct CatalogService {
    products: Arc<dyn ProductRepository>,
    categories: Arc<dyn CategoryRepository>,
}

impl CatalogService {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        categories: Arc<dyn CategoryRepository>,
    ) -> Self {
        Self { products, categories }
    }

    /// Products satisfying every supplied criterion. Absent criteria do not constrain.
    pub async fn search(
        &self,
        criteria: SearchCriteria,
    ) -> Result<Vec<Product>, ApplicationError> {
        let filter = ProductFilter::try_from(criteria)?;
        Ok(self.products.search(&filter).await?)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, ApplicationError> {
        self.products
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("product", id))
    }

    pub async fn create_product(&self, draft: ProductDraft) -> Result<Product, ApplicationError> {
        draft.validate()?;
        self.require_category(draft.category_id).await?;

        let product = self.products.create(draft).await?;
        info!(
            event_name = "catalog.product.created",
            product_id = %product.id,
            category_id = %product.category_id,
            "product created"
        );
        Ok(product)
    }

    pub async fn update_product(
        &self,
        id: ProductId,
        draft: ProductDraft,
    ) -> Result<Product, ApplicationError> {
        draft.validate()?;
        self.require_category(draft.category_id).await?;

        let product = self
            .products
            .update(id, draft)
            .await?
            .ok_or_else(|| ApplicationError::not_found("product", id))?;
        info!(event_name = "catalog.product.updated", product_id = %id, "product updated");
        Ok(product)
    }

    pub async fn delete_product(&self, id: ProductId) -> Result<(), ApplicationError> {
        if !self.products.delete(id).await? {
            return Err(ApplicationError::not_found("product", id));
        }
        info!(event_name = "catalog.product.deleted", product_id = %id, "product deleted");
        Ok(())
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, ApplicationError> {
        Ok(self.categories.list().await?)
    }

    pub async fn get_category(&self, id: CategoryId) -> Result<Category, ApplicationError> {
        self.require_category(id).await
    }

    /// Products of an existing category, in id order.
    pub async fn products_in_category(
        &self,
        id: CategoryId,
    ) -> Result<Vec<Product>, ApplicationError> {
        self.require_category(id).await?;
        Ok(self.products.list_by_category(id).await?)
    }

    pub async fn create_category(
        &self,
        draft: CategoryDraft,
    ) -> Result<Category, ApplicationError> {
        draft.validate()?;
        let category = self.categories.create(draft).await?;
        info!(
            event_name = "catalog.category.created",
            category_id = %category.id,
            "category created"
        );
        Ok(category)
    }

    pub async fn update_category(
        &self,
        id: CategoryId,
        draft: CategoryDraft,
    ) -> Result<Category, ApplicationError> {
        draft.validate()?;
        let category = self
            .categories
            .update(id, draft)
            .await?
            .ok_or_else(|| ApplicationError::not_found("category", id))?;
        info!(event_name = "catalog.category.updated", category_id = %id, "category updated");
        Ok(category)
    }

    /// Deletes a category that no product references.
    ///
    /// The dependent check runs again inside [`CategoryRepository::delete_unreferenced`],
    /// so a product created after the early check still blocks the delete.
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), ApplicationError> {
        if self.products.exists_by_category(id).await? {
            return Err(dependents_conflict(id, None));
        }

        match self.categories.delete_unreferenced(id).await? {
            CategoryDeletion::Deleted => {
                info!(
                    event_name = "catalog.category.deleted",
                    category_id = %id,
                    "category deleted"
                );
                Ok(())
            }
            CategoryDeletion::NotFound => Err(ApplicationError::not_found("category", id)),
            CategoryDeletion::HasDependents { product_count } => {
                Err(dependents_conflict(id, Some(product_count)))
            }
        }
    }

    async fn require_category(&self, id: CategoryId) -> Result<Category, ApplicationError> {
        self.categories
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("category", id))
    }
}

fn dependents_conflict(id: CategoryId, product_count: Option<i64>) -> ApplicationError {
    let message = match product_count {
        Some(count) => format!("category {id} still has {count} product(s)"),
        None => format!("category {id} still has products"),
    };
    ApplicationError::Conflict(message)
}
