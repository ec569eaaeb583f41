//! Product search filters.
//!
//! A [`ProductFilter`] is a list of independent predicates. Each supplied
//! criterion adds one predicate; absent criteria add nothing, so an empty
//! filter matches every product.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::category::CategoryId;
use crate::domain::product::Product;
use crate::errors::ApplicationError;

/// Optional search criteria as received from a caller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub category_id: Option<CategoryId>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub color: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProductPredicate {
    Category(CategoryId),
    MinPrice(Decimal),
    MaxPrice(Decimal),
    /// Exact, case-sensitive.
    Color(String),
}

impl ProductPredicate {
    pub fn matches(&self, product: &Product) -> bool {
        match self {
            Self::Category(category_id) => product.category_id == *category_id,
            Self::MinPrice(min) => product.price >= *min,
            Self::MaxPrice(max) => product.price <= *max,
            Self::Color(color) => product.color.as_deref() == Some(color.as_str()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProductFilter {
    predicates: Vec<ProductPredicate>,
}

impl ProductFilter {
    /// Filter with no constraints.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn category(mut self, category_id: CategoryId) -> Self {
        self.predicates.push(ProductPredicate::Category(category_id));
        self
    }

    pub fn min_price(mut self, min: Decimal) -> Self {
        self.predicates.push(ProductPredicate::MinPrice(min));
        self
    }

    pub fn max_price(mut self, max: Decimal) -> Self {
        self.predicates.push(ProductPredicate::MaxPrice(max));
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.predicates.push(ProductPredicate::Color(color.into()));
        self
    }

    pub fn predicates(&self) -> &[ProductPredicate] {
        &self.predicates
    }

    pub fn is_unconstrained(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, product: &Product) -> bool {
        self.predicates.iter().all(|predicate| predicate.matches(product))
    }

    /// Applies the filter to an in-memory product list, returning matches in id order.
    pub fn apply<'a, I>(&self, products: I) -> Vec<Product>
    where
        I: IntoIterator<Item = &'a Product>,
    {
        let mut matched: Vec<Product> =
            products.into_iter().filter(|product| self.matches(product)).cloned().collect();
        matched.sort_by_key(|product| product.id);
        matched
    }
}

impl TryFrom<SearchCriteria> for ProductFilter {
    type Error = ApplicationError;

    fn try_from(criteria: SearchCriteria) -> Result<Self, Self::Error> {
        if let Some(min) = criteria.min_price {
            if min < Decimal::ZERO {
                return Err(ApplicationError::InvalidArgument(format!(
                    "minPrice must not be negative, got {min}"
                )));
            }
        }
        if let Some(max) = criteria.max_price {
            if max < Decimal::ZERO {
                return Err(ApplicationError::InvalidArgument(format!(
                    "maxPrice must not be negative, got {max}"
                )));
            }
        }
        if let (Some(min), Some(max)) = (criteria.min_price, criteria.max_price) {
            if min > max {
                return Err(ApplicationError::InvalidArgument(format!(
                    "minPrice ({min}) must not exceed maxPrice ({max})"
                )));
            }
        }

        let mut filter = Self::any();
        if let Some(category_id) = criteria.category_id {
            filter = filter.category(category_id);
        }
        if let Some(min) = criteria.min_price {
            filter = filter.min_price(min);
        }
        if let Some(max) = criteria.max_price {
            filter = filter.max_price(max);
        }
        if let Some(color) = criteria.color {
            filter = filter.color(color);
        }
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{ProductFilter, SearchCriteria};
    use crate::domain::category::CategoryId;
    use crate::domain::product::{Product, ProductId};
    use crate::errors::ApplicationError;

    fn product(id: i64, category: i64, price: Decimal, color: Option<&str>) -> Product {
        Product {
            id: ProductId(id),
            name: format!("product-{id}"),
            price,
            category_id: CategoryId(category),
            description: String::new(),
            color: color.map(str::to_string),
            stock: 5,
            featured: false,
            image_url: None,
        }
    }

    fn catalog() -> Vec<Product> {
        vec![
            product(4, 2, Decimal::new(1500, 2), Some("red")),
            product(1, 1, Decimal::new(999, 2), Some("red")),
            product(2, 1, Decimal::new(2000, 2), Some("Red")),
            product(3, 2, Decimal::new(1000, 2), None),
            product(5, 3, Decimal::new(2001, 2), Some("red")),
        ]
    }

    fn ids(products: &[Product]) -> Vec<i64> {
        products.iter().map(|product| product.id.0).collect()
    }

    #[test]
    fn empty_filter_returns_every_product() {
        let found = ProductFilter::any().apply(&catalog());
        assert_eq!(ids(&found), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn category_filter_matches_exactly() {
        let found = ProductFilter::any().category(CategoryId(2)).apply(&catalog());
        assert_eq!(ids(&found), vec![3, 4]);
    }

    #[test]
    fn price_bounds_are_inclusive_and_color_is_case_sensitive() {
        let filter = ProductFilter::try_from(SearchCriteria {
            min_price: Some(Decimal::new(10, 0)),
            max_price: Some(Decimal::new(20, 0)),
            color: Some("red".to_string()),
            ..SearchCriteria::default()
        })
        .expect("valid criteria");

        let found = filter.apply(&catalog());
        // product 2 is 20.00 but "Red"; product 5 is above the bound
        assert_eq!(ids(&found), vec![4]);
    }

    #[test]
    fn null_color_never_matches_a_color_filter() {
        let found = ProductFilter::any().color("red").apply(&catalog());
        assert!(found.iter().all(|product| product.color.as_deref() == Some("red")));
        assert!(!ids(&found).contains(&3));
    }

    #[test]
    fn no_matches_is_an_empty_result() {
        let found = ProductFilter::any().category(CategoryId(99)).apply(&catalog());
        assert!(found.is_empty());
    }

    #[test]
    fn inverted_price_range_is_invalid() {
        let error = ProductFilter::try_from(SearchCriteria {
            min_price: Some(Decimal::new(30, 0)),
            max_price: Some(Decimal::new(20, 0)),
            ..SearchCriteria::default()
        })
        .expect_err("min > max");
        assert!(matches!(error, ApplicationError::InvalidArgument(_)));
    }

    #[test]
    fn absent_criteria_produce_no_predicates() {
        let filter = ProductFilter::try_from(SearchCriteria::default()).expect("valid");
        assert!(filter.is_unconstrained());
    }
}
