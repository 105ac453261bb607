use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::product::ProductCode;

/// Identity supplied by the transport. Telegram chat and user ids fit in an `i64`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("quantity `{input}` is not a positive whole number")]
pub struct InvalidQuantity {
    pub input: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    /// Parses user input. Surrounding whitespace is ignored; signs, decimals and zero are not.
    pub fn parse(input: &str) -> Result<Self, InvalidQuantity> {
        let invalid = || InvalidQuantity { input: input.to_owned() };
        let trimmed = input.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(invalid());
        }
        trimmed.parse::<u32>().ok().and_then(Self::new).ok_or_else(invalid)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cart row as the store returns it. The code stays raw so corrupt rows surface
/// in the cart service instead of disappearing inside the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredLine {
    pub product_code: String,
    pub quantity: i64,
}

impl StoredLine {
    pub fn new(code: ProductCode, quantity: Quantity) -> Self {
        Self { product_code: code.to_string(), quantity: i64::from(quantity.get()) }
    }
}
