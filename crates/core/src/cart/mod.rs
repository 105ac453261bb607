pub mod memory;
pub mod service;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::cart::{Quantity, StoredLine, UserId};
use crate::domain::product::ProductCode;

pub use memory::{InMemoryCartStore, StoreCall};
pub use service::{CartError, CartService, CartSummary, SummaryLine};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("cart store unavailable: {0}")]
    Unavailable(String),
}

/// Persistent cart rows. Implementations hold no business rules: no merging, no validation
/// beyond what the column types enforce, no retries.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Appends a line. An existing line for the same product is left alone.
    async fn insert(
        &self,
        user_id: UserId,
        quantity: Quantity,
        code: ProductCode,
    ) -> Result<(), StoreError>;

    /// Removes every line of the user and returns how many were removed.
    async fn clear(&self, user_id: UserId) -> Result<u64, StoreError>;

    /// Removes every line of the user that matches `code`, duplicates included.
    async fn delete_one(&self, user_id: UserId, code: ProductCode) -> Result<u64, StoreError>;

    /// Lines of the user in insertion order.
    async fn list_for(&self, user_id: UserId) -> Result<Vec<StoredLine>, StoreError>;

    async fn count_for(&self, user_id: UserId) -> Result<u64, StoreError>;
}
