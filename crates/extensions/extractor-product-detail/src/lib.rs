//! Product detail extractor for the context harvester.
//!
//! Reads prices, delivery estimate, cart amount, short description, related
//! and alternative product grids and the parameter table of a product detail
//! page.

mod extractor;
mod grid;

pub use extractor::{ProductDetailExtractor, PRODUCT_DETAIL_KIND};
pub use grid::read_product_grid;
