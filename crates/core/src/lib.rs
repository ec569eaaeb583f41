pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;

pub use catalog::{ProductFilter, ProductPredicate, SearchCriteria};
pub use domain::cart::{CartLine, CartLineRecord, ShoppingCart, UserId};
pub use domain::category::{Category, CategoryDeletion, CategoryDraft, CategoryId};
pub use domain::product::{Product, ProductDraft, ProductId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
