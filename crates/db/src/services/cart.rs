use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use easyshop_core::{ApplicationError, CartLine, DomainError, ProductId, ShoppingCart, UserId};

use crate::repositories::{CartRepository, ProductRepository};

const LOCK_TABLE_PRUNE_THRESHOLD: usize = 1024;

/// Loads, mutates, and persists per-user carts.
///
/// Every mutation runs load, change, and save under a lock scoped to the user, so
/// concurrent requests for the same user serialize and none of their changes are lost.
/// Carts of different users never contend.
pub struct CartService {
    products: Arc<dyn ProductRepository>,
    carts: Arc<dyn CartRepository>,
    user_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl CartService {
    pub fn new(products: Arc<dyn ProductRepository>, carts: Arc<dyn CartRepository>) -> Self {
        Self { products, carts, user_locks: Mutex::new(HashMap::new()) }
    }

    pub async fn get_cart(&self, user_id: UserId) -> Result<ShoppingCart, ApplicationError> {
        self.load_cart(user_id).await
    }

    /// Adds `quantity` of a product, merging with an existing line. Returns the updated cart.
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<ShoppingCart, ApplicationError> {
        if quantity <= 0 {
            return Err(DomainError::NonPositiveQuantity(quantity).into());
        }

        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let product = self
            .products
            .find_by_id(product_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("product", product_id))?;

        let mut cart = self.load_cart(user_id).await?;
        let new_quantity = cart.add(product, quantity)?.quantity();
        self.carts.save(user_id, &cart.records()).await?;

        info!(
            event_name = "cart.item_added",
            user_id = %user_id,
            product_id = %product_id,
            added = quantity,
            line_quantity = new_quantity,
            "item added to cart"
        );
        Ok(cart)
    }

    /// Sets the quantity of an existing line. Never creates a line.
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<ShoppingCart, ApplicationError> {
        if quantity <= 0 {
            return Err(DomainError::NonPositiveQuantity(quantity).into());
        }

        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let mut cart = self.load_cart(user_id).await?;
        cart.update_quantity(product_id, quantity)?;
        self.carts.save(user_id, &cart.records()).await?;

        info!(
            event_name = "cart.quantity_updated",
            user_id = %user_id,
            product_id = %product_id,
            quantity,
            "cart line quantity updated"
        );
        Ok(cart)
    }

    /// Removes a line if present. Removing an absent line leaves the cart unchanged.
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<ShoppingCart, ApplicationError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let mut cart = self.load_cart(user_id).await?;
        if cart.remove(product_id).is_some() {
            self.carts.save(user_id, &cart.records()).await?;
            info!(
                event_name = "cart.item_removed",
                user_id = %user_id,
                product_id = %product_id,
                "item removed from cart"
            );
        }
        Ok(cart)
    }

    pub async fn clear_cart(&self, user_id: UserId) -> Result<(), ApplicationError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        self.carts.clear(user_id).await?;
        info!(event_name = "cart.cleared", user_id = %user_id, "cart cleared");
        Ok(())
    }

    async fn load_cart(&self, user_id: UserId) -> Result<ShoppingCart, ApplicationError> {
        let records = self.carts.load(user_id).await?;
        let mut cart = ShoppingCart::new();

        for record in records {
            let Some(product) = self.products.find_by_id(record.product_id).await? else {
                warn!(
                    event_name = "cart.line_dropped",
                    user_id = %user_id,
                    product_id = %record.product_id,
                    "stored cart line references a missing product"
                );
                continue;
            };

            let inserted =
                CartLine::with_discount(product, record.quantity, record.discount_percent)
                    .and_then(|line| cart.insert_line(line));
            match inserted {
                Ok(()) => {}
                // a catalog price change can push a stored line out of range
                Err(
                    error @ (DomainError::TotalOverflow { .. }
                    | DomainError::QuantityOverflow { .. }),
                ) => {
                    warn!(
                        event_name = "cart.line_dropped",
                        user_id = %user_id,
                        product_id = %record.product_id,
                        reason = %error,
                        "stored cart line no longer fits the cart totals"
                    );
                }
                Err(error) => {
                    return Err(ApplicationError::Persistence(format!(
                        "stored cart line for user {user_id}, product {}: {error}",
                        record.product_id
                    )));
                }
            }
        }

        Ok(cart)
    }

    async fn user_lock(&self, user_id: UserId) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        if locks.len() >= LOCK_TABLE_PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Arc::clone(locks.entry(user_id).or_default())
    }
}
