//! Catalogue product.

use gusturi_core::{Price, ProductId};

#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub code: String,
    pub name: String,
    pub price: Price,
    pub stock: i32,
    pub active: bool,
    pub image: Option<String>,
}
