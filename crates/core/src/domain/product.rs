use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Vegetables,
    Fruits,
    Meals,
    Drinks,
}

impl Category {
    pub const ALL: [Category; 4] =
        [Category::Vegetables, Category::Fruits, Category::Meals, Category::Drinks];

    /// Single-character tag used as the first character of a product code.
    pub fn tag(self) -> char {
        match self {
            Self::Vegetables => 'v',
            Self::Fruits => 'f',
            Self::Meals => 'm',
            Self::Drinks => 'd',
        }
    }

    pub fn from_tag(tag: char) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.tag() == tag)
    }

    /// Stable identifier, also used as the button payload that opens the category.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vegetables => "vegetables",
            Self::Fruits => "fruits",
            Self::Meals => "meals",
            Self::Drinks => "drinks",
        }
    }

    pub fn from_payload(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.as_str() == value)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Vegetables => "Vegetables 🥦",
            Self::Fruits => "Fruits 🍏",
            Self::Meals => "Hot meals 🍽",
            Self::Drinks => "Drinks 🥤",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProductCodeError {
    #[error("malformed product code `{code}`: {reason}")]
    Malformed { code: String, reason: &'static str },
    #[error("product positions are 1-based; got 0 for {category}")]
    ZeroPosition { category: Category },
}

/// Typed reference to a catalog entry: a category plus a 1-based position.
///
/// The string form (`v1`, `d12`, ...) only exists at the edges: button payloads and
/// the `product_code` column of the cart table. It is canonical, so `v01` is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductCode {
    pub category: Category,
    pub position: u16,
}

impl ProductCode {
    pub fn encode(category: Category, position: u16) -> Result<Self, ProductCodeError> {
        if position == 0 {
            return Err(ProductCodeError::ZeroPosition { category });
        }
        Ok(Self { category, position })
    }

    pub fn decode(code: &str) -> Result<Self, ProductCodeError> {
        let malformed = |reason| ProductCodeError::Malformed { code: code.to_owned(), reason };

        let mut chars = code.chars();
        let tag = chars.next().ok_or_else(|| malformed("empty code"))?;
        let category = Category::from_tag(tag).ok_or_else(|| malformed("unknown category tag"))?;

        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(malformed("position is not a positive integer"));
        }
        if digits.starts_with('0') {
            return Err(malformed("position must not have leading zeros"));
        }

        let position = digits.parse::<u16>().map_err(|_| malformed("position is out of range"))?;
        Ok(Self { category, position })
    }

    /// Zero-based index into the category's item list.
    pub fn index(&self) -> usize {
        usize::from(self.position) - 1
    }
}

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.category.tag(), self.position)
    }
}

impl FromStr for ProductCode {
    type Err = ProductCodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::decode(value)
    }
}

impl TryFrom<String> for ProductCode {
    type Error = ProductCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::decode(&value)
    }
}

impl From<ProductCode> for String {
    fn from(value: ProductCode) -> Self {
        value.to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    pub unit_price: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl CatalogItem {
    pub fn new(name: impl Into<String>, unit_price: u32) -> Self {
        Self { name: name.into(), unit_price, unit: None }
    }

    pub fn per(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Button label, e.g. `Potatoes - 200 KZT per kg`.
    pub fn label(&self, currency: &str) -> String {
        match &self.unit {
            Some(unit) => format!("{} - {} {currency} {unit}", self.name, self.unit_price),
            None => format!("{} - {} {currency}", self.name, self.unit_price),
        }
    }
}
