//! Read-only product catalog.
//!
//! Positions are 1-based and stable for the life of the process. Product codes handed out
//! by [`Catalog::codes`] always resolve against the same catalog.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::product::{Category, CatalogItem, ProductCode};

pub const DEFAULT_CURRENCY: &str = "KZT";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("no product at position {position} in {category}")]
    NotFound { category: Category, position: u16 },
}

#[derive(Debug, Error)]
pub enum CatalogLoadError {
    #[error("failed to read catalog file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse catalog file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("invalid catalog: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    currency: String,
    sections: BTreeMap<Category, Vec<CatalogItem>>,
}

impl Catalog {
    pub fn new(
        currency: impl Into<String>,
        sections: BTreeMap<Category, Vec<CatalogItem>>,
    ) -> Result<Self, CatalogLoadError> {
        let currency = currency.into();
        if currency.trim().is_empty() {
            return Err(CatalogLoadError::Invalid("currency must not be empty".to_owned()));
        }

        for (category, items) in &sections {
            if items.len() > usize::from(u16::MAX) {
                return Err(CatalogLoadError::Invalid(format!(
                    "{category} has {} items; at most {} are addressable",
                    items.len(),
                    u16::MAX
                )));
            }
            for (index, item) in items.iter().enumerate() {
                if item.name.trim().is_empty() {
                    return Err(CatalogLoadError::Invalid(format!(
                        "{category} item #{} has an empty name",
                        index + 1
                    )));
                }
                if item.unit_price == 0 {
                    return Err(CatalogLoadError::Invalid(format!(
                        "{category} item `{}` must have a price greater than zero",
                        item.name
                    )));
                }
            }
        }

        Ok(Self { currency, sections })
    }

    /// Loads a catalog from a TOML file. `default_currency` applies when the file omits one.
    pub fn load(path: &Path, default_currency: &str) -> Result<Self, CatalogLoadError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CatalogLoadError::Read { path: path.to_path_buf(), source })?;
        let file: CatalogFile = toml::from_str(&raw)
            .map_err(|source| CatalogLoadError::Parse { path: path.to_path_buf(), source })?;

        let currency = file.currency.clone().unwrap_or_else(|| default_currency.to_owned());
        Self::new(currency, file.into_sections())
    }

    /// The built-in menu, used when no catalog file is configured.
    pub fn builtin(currency: &str) -> Self {
        let sections = BTreeMap::from([
            (
                Category::Vegetables,
                vec![
                    CatalogItem::new("Potatoes", 200).per("per kg"),
                    CatalogItem::new("Carrots", 180).per("per kg"),
                    CatalogItem::new("Onions", 150).per("per kg"),
                    CatalogItem::new("Tomatoes", 900).per("per kg"),
                    CatalogItem::new("Cucumbers", 700).per("per kg"),
                ],
            ),
            (
                Category::Fruits,
                vec![
                    CatalogItem::new("Apples", 600).per("per kg"),
                    CatalogItem::new("Bananas", 750).per("per kg"),
                    CatalogItem::new("Oranges", 850).per("per kg"),
                    CatalogItem::new("Pears", 800).per("per kg"),
                ],
            ),
            (
                Category::Meals,
                vec![
                    CatalogItem::new("Plov", 1_500).per("per portion"),
                    CatalogItem::new("Lagman", 1_400).per("per portion"),
                    CatalogItem::new("Manti", 1_300).per("per 5 pcs"),
                    CatalogItem::new("Beshbarmak", 2_200).per("per portion"),
                ],
            ),
            (
                Category::Drinks,
                vec![
                    CatalogItem::new("Kumis", 900).per("per litre"),
                    CatalogItem::new("Ayran", 400).per("per litre"),
                    CatalogItem::new("Green tea", 300).per("per cup"),
                    CatalogItem::new("Compote", 350).per("per glass"),
                ],
            ),
        ]);
        Self { currency: currency.to_owned(), sections }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn categories(&self) -> &'static [Category] {
        &Category::ALL
    }

    pub fn items(&self, category: Category) -> &[CatalogItem] {
        self.sections.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn lookup(&self, category: Category, position: u16) -> Result<&CatalogItem, CatalogError> {
        let not_found = CatalogError::NotFound { category, position };
        if position == 0 {
            return Err(not_found);
        }
        self.items(category).get(usize::from(position) - 1).ok_or(not_found)
    }

    pub fn resolve(&self, code: ProductCode) -> Result<&CatalogItem, CatalogError> {
        self.lookup(code.category, code.position)
    }

    /// Codes and items of one category, in display order.
    pub fn codes(&self, category: Category) -> impl Iterator<Item = (ProductCode, &CatalogItem)> {
        self.items(category).iter().zip(1_u16..).map(move |(item, position)| {
            (ProductCode { category, position }, item)
        })
    }

    pub fn len(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin(DEFAULT_CURRENCY)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    currency: Option<String>,
    #[serde(default)]
    vegetables: Vec<CatalogFileItem>,
    #[serde(default)]
    fruits: Vec<CatalogFileItem>,
    #[serde(default)]
    meals: Vec<CatalogFileItem>,
    #[serde(default)]
    drinks: Vec<CatalogFileItem>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFileItem {
    name: String,
    price: u32,
    unit: Option<String>,
}

impl CatalogFile {
    fn into_sections(self) -> BTreeMap<Category, Vec<CatalogItem>> {
        let convert = |items: Vec<CatalogFileItem>| {
            items
                .into_iter()
                .map(|item| CatalogItem {
                    name: item.name,
                    unit_price: item.price,
                    unit: item.unit,
                })
                .collect::<Vec<_>>()
        };
        BTreeMap::from([
            (Category::Vegetables, convert(self.vegetables)),
            (Category::Fruits, convert(self.fruits)),
            (Category::Meals, convert(self.meals)),
            (Category::Drinks, convert(self.drinks)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use super::{Catalog, CatalogError, CatalogLoadError};
    use crate::domain::product::{Category, CatalogItem, ProductCode};

    #[test]
    fn builtin_catalog_prices_first_vegetable_at_200() {
        let catalog = Catalog::default();
        let item = catalog.lookup(Category::Vegetables, 1).expect("first vegetable");
        assert_eq!(item.name, "Potatoes");
        assert_eq!(item.unit_price, 200);
        assert_eq!(catalog.currency(), "KZT");
    }

    #[test]
    fn every_generated_code_resolves_to_its_item() {
        let catalog = Catalog::default();
        for category in catalog.categories() {
            let items = catalog.items(*category);
            assert!(!items.is_empty(), "{category} should not be empty");
            for (code, item) in catalog.codes(*category) {
                assert_eq!(catalog.resolve(code), Ok(item));
                let decoded = ProductCode::decode(&code.to_string()).expect("round trip");
                assert_eq!(decoded, code);
            }
        }
    }

    #[test]
    fn lookup_out_of_range_is_not_found() {
        let catalog = Catalog::default();
        let past_end = u16::try_from(catalog.items(Category::Drinks).len() + 1).expect("small");
        assert_eq!(
            catalog.lookup(Category::Drinks, past_end),
            Err(CatalogError::NotFound { category: Category::Drinks, position: past_end })
        );
        assert!(catalog.lookup(Category::Drinks, 0).is_err());
    }

    #[test]
    fn categories_keep_display_order() {
        let catalog = Catalog::default();
        assert_eq!(
            catalog.categories(),
            &[Category::Vegetables, Category::Fruits, Category::Meals, Category::Drinks]
        );
    }

    #[test]
    fn rejects_zero_price_and_blank_names() {
        let zero_price = BTreeMap::from([(Category::Fruits, vec![CatalogItem::new("Plum", 0)])]);
        assert!(matches!(Catalog::new("KZT", zero_price), Err(CatalogLoadError::Invalid(_))));

        let blank_name = BTreeMap::from([(Category::Fruits, vec![CatalogItem::new("  ", 10)])]);
        assert!(matches!(Catalog::new("KZT", blank_name), Err(CatalogLoadError::Invalid(_))));

        assert!(matches!(Catalog::new(" ", BTreeMap::new()), Err(CatalogLoadError::Invalid(_))));
    }

    #[test]
    fn loads_catalog_file_and_falls_back_to_default_currency() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("catalog.toml");
        fs::write(
            &path,
            r#"
[[vegetables]]
name = "Beetroot"
price = 250
unit = "per kg"

[[drinks]]
name = "Mineral water"
price = 300
"#,
        )
        .expect("write catalog");

        let catalog = Catalog::load(&path, "USD").expect("load catalog");
        assert_eq!(catalog.currency(), "USD");
        assert_eq!(catalog.len(), 2);
        assert!(catalog.items(Category::Meals).is_empty());
        let water = catalog.lookup(Category::Drinks, 1).expect("water");
        assert_eq!(water.label("USD"), "Mineral water - 300 USD");
    }

    #[test]
    fn load_reports_unknown_keys_and_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("catalog.toml");
        fs::write(&path, "[[snacks]]\nname = \"Chips\"\nprice = 100\n").expect("write");
        assert!(matches!(Catalog::load(&path, "KZT"), Err(CatalogLoadError::Parse { .. })));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(Catalog::load(&missing, "KZT"), Err(CatalogLoadError::Read { .. })));
    }
}
