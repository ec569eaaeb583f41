//! Application services over the repository traits.

pub mod cart;
pub mod catalog;

pub use cart::CartService;
pub use catalog::CatalogService;
