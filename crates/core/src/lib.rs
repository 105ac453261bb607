pub mod cart;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod keyboard;
pub mod notify;

pub use cart::{CartError, CartService, CartStore, CartSummary, InMemoryCartStore, StoreError};
pub use catalog::{Catalog, CatalogError, CatalogLoadError};
pub use domain::cart::{InvalidQuantity, Quantity, StoredLine, UserId};
pub use domain::product::{CatalogItem, Category, ProductCode, ProductCodeError};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{ConversationRuntime, ConversationState, InboundEvent};
pub use keyboard::{InlineButton, Keyboard};
pub use notify::{DeliveryError, Messenger, Outbound, RecordingMessenger};
