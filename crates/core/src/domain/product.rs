use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::category::CategoryId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub i64);

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A catalog product as read from the product store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub category_id: CategoryId,
    pub description: String,
    pub color: Option<String>,
    pub stock: i64,
    pub featured: bool,
    pub image_url: Option<String>,
}

/// Writable product fields, used for both create and update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub price: Decimal,
    pub category_id: CategoryId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ProductDraft {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvariantViolation("product name must not be empty".into()));
        }
        if self.price < Decimal::ZERO {
            return Err(DomainError::InvariantViolation(
                "product price must not be negative".into(),
            ));
        }
        if self.stock < 0 {
            return Err(DomainError::InvariantViolation(
                "product stock must not be negative".into(),
            ));
        }
        Ok(())
    }

    pub fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            price: self.price,
            category_id: self.category_id,
            description: self.description,
            color: self.color,
            stock: self.stock,
            featured: self.featured,
            image_url: self.image_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{ProductDraft, ProductId};
    use crate::domain::category::CategoryId;
    use crate::errors::DomainError;

    fn draft() -> ProductDraft {
        ProductDraft {
            name: "Smartphone".to_string(),
            price: Decimal::new(49999, 2),
            category_id: CategoryId(1),
            description: "A powerful smartphone".to_string(),
            color: Some("Black".to_string()),
            stock: 50,
            featured: false,
            image_url: None,
        }
    }

    #[test]
    fn accepts_well_formed_draft() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn rejects_negative_price() {
        let mut draft = draft();
        draft.price = Decimal::new(-1, 2);
        assert!(matches!(draft.validate(), Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn rejects_blank_name_and_negative_stock() {
        let mut blank = draft();
        blank.name = "   ".to_string();
        assert!(blank.validate().is_err());

        let mut negative = draft();
        negative.stock = -3;
        assert!(negative.validate().is_err());
    }

    #[test]
    fn into_product_keeps_fields() {
        let product = draft().into_product(ProductId(7));
        assert_eq!(product.id, ProductId(7));
        assert_eq!(product.price, Decimal::new(49999, 2));
        assert_eq!(product.color.as_deref(), Some("Black"));
    }
}
