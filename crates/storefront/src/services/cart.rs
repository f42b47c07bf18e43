//! Cart service.
//!
//! Quantities are checked against current stock when the customer edits the
//! cart; checkout re-checks under lock.

use sqlx::PgPool;
use thiserror::Error;

use gusturi_core::{ProductId, UserId};

use crate::db::{CartRepository, ProductRepository, RepositoryError};
use crate::models::Cart;

/// Errors from cart edits.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("unknown product")]
    UnknownProduct,

    #[error("product {name} is not available")]
    Unavailable { name: String },

    #[error("only {available} of {name} in stock")]
    InsufficientStock { name: String, available: i32 },

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl CartError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownProduct => "Produsul nu a fost găsit.".to_string(),
            Self::Unavailable { name } => format!("Produsul „{name}” nu mai este disponibil."),
            Self::InsufficientStock { name, available } => {
                format!("Stoc insuficient pentru „{name}”. Disponibil: {available}.")
            }
            Self::Repository(_) => {
                "A apărut o eroare la actualizarea coșului. Te rugăm să încerci din nou."
                    .to_string()
            }
        }
    }

    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Repository(_))
    }
}

/// Cart service.
pub struct CartService<'a> {
    carts: CartRepository<'a>,
    products: ProductRepository<'a>,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            carts: CartRepository::new(pool),
            products: ProductRepository::new(pool),
        }
    }

    /// The user's cart with current prices and stock.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn get(&self, user_id: UserId) -> Result<Cart, CartError> {
        Ok(self.carts.get(user_id).await?)
    }

    /// Set a line's quantity; zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::UnknownProduct`, `Unavailable` or
    /// `InsufficientStock` if the quantity cannot be honoured.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), CartError> {
        if quantity <= 0 {
            return self.remove(user_id, product_id).await;
        }

        let product = self
            .products
            .get(product_id)
            .await?
            .ok_or(CartError::UnknownProduct)?;
        if !product.active {
            return Err(CartError::Unavailable { name: product.name });
        }
        if quantity > product.stock {
            return Err(CartError::InsufficientStock {
                name: product.name,
                available: product.stock,
            });
        }

        self.carts
            .set_quantity(user_id, product_id, quantity)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CartError::UnknownProduct,
                other => CartError::Repository(other),
            })
    }

    /// Remove a line from the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the delete fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), CartError> {
        self.carts.remove(user_id, product_id).await?;
        Ok(())
    }
}
