use std::fmt::Write as _;
use std::sync::Arc;

use thiserror::Error;

use super::{CartStore, StoreError};
use crate::catalog::{Catalog, CatalogError};
use crate::domain::cart::{InvalidQuantity, Quantity, UserId};
use crate::domain::product::ProductCode;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error(transparent)]
    InvalidQuantity(#[from] InvalidQuantity),
    #[error("cart line `{code}` is corrupt: {reason}")]
    CorruptCartLine { code: String, reason: String },
    #[error(transparent)]
    UnknownProduct(#[from] CatalogError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummaryLine {
    pub code: ProductCode,
    pub name: String,
    pub quantity: u32,
    pub unit_price: u32,
    pub line_total: u64,
}

impl SummaryLine {
    /// `Potatoes: 3 * 200 KZT = 600 KZT`
    pub fn describe(&self, currency: &str) -> String {
        format!(
            "{}: {} * {} {currency} = {} {currency}",
            self.name, self.quantity, self.unit_price, self.line_total
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CartSummary {
    pub lines: Vec<SummaryLine>,
    pub total: u64,
}

impl CartSummary {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Numbered lines followed by the total. Empty carts render as an empty string.
    pub fn render(&self, currency: &str) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut text = String::new();
        for (number, line) in self.lines.iter().enumerate() {
            let _ = writeln!(text, "{}. {}", number + 1, line.describe(currency));
        }
        let _ = write!(text, "Total: {} {currency}", self.total);
        text
    }
}

/// Cart operations on top of a [`CartStore`] and the catalog.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn CartStore>,
    catalog: Arc<Catalog>,
}

impl CartService {
    pub fn new(store: Arc<dyn CartStore>, catalog: Arc<Catalog>) -> Self {
        Self { store, catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Fails on the first stored line that no longer decodes or resolves; nothing is skipped.
    pub async fn summarize(&self, user_id: UserId) -> Result<CartSummary, CartError> {
        let stored = self.store.list_for(user_id).await?;
        let mut summary = CartSummary::default();

        for row in stored {
            let corrupt = |reason: String| CartError::CorruptCartLine {
                code: row.product_code.clone(),
                reason,
            };
            let code = ProductCode::decode(&row.product_code)
                .map_err(|error| corrupt(error.to_string()))?;
            let item = self.catalog.resolve(code).map_err(|error| corrupt(error.to_string()))?;
            let quantity = u32::try_from(row.quantity)
                .ok()
                .and_then(Quantity::new)
                .ok_or_else(|| corrupt(format!("quantity {} is not positive", row.quantity)))?;

            let line_total = u64::from(quantity.get()) * u64::from(item.unit_price);
            summary.total = summary
                .total
                .checked_add(line_total)
                .ok_or_else(|| corrupt(format!("cart total overflows after adding {line_total}")))?;
            summary.lines.push(SummaryLine {
                code,
                name: item.name.clone(),
                quantity: quantity.get(),
                unit_price: item.unit_price,
                line_total,
            });
        }

        Ok(summary)
    }

    /// Validates raw user input before anything reaches the store.
    pub async fn add_item(
        &self,
        user_id: UserId,
        code: ProductCode,
        raw_quantity: &str,
    ) -> Result<Quantity, CartError> {
        let quantity = Quantity::parse(raw_quantity)?;
        self.add_quantity(user_id, code, quantity).await?;
        Ok(quantity)
    }

    pub async fn add_quantity(
        &self,
        user_id: UserId,
        code: ProductCode,
        quantity: Quantity,
    ) -> Result<(), CartError> {
        self.catalog.resolve(code)?;
        self.store.insert(user_id, quantity, code).await?;
        Ok(())
    }

    pub async fn remove_item(&self, user_id: UserId, code: ProductCode) -> Result<u64, CartError> {
        Ok(self.store.delete_one(user_id, code).await?)
    }

    pub async fn clear_cart(&self, user_id: UserId) -> Result<u64, CartError> {
        Ok(self.store.clear(user_id).await?)
    }

    pub async fn is_empty(&self, user_id: UserId) -> Result<bool, CartError> {
        Ok(self.store.count_for(user_id).await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::{CartError, CartService};
    use crate::cart::{CartStore, InMemoryCartStore};
    use crate::catalog::Catalog;
    use crate::domain::cart::UserId;
    use crate::domain::product::{CatalogItem, Category, ProductCode};

    const USER: UserId = UserId(42);

    fn service() -> (Arc<InMemoryCartStore>, CartService) {
        let store = Arc::new(InMemoryCartStore::default());
        let service = CartService::new(store.clone(), Arc::new(Catalog::default()));
        (store, service)
    }

    fn code(category: Category, position: u16) -> ProductCode {
        ProductCode::encode(category, position).expect("valid code")
    }

    #[tokio::test]
    async fn empty_cart_summarizes_to_zero() {
        let (_, service) = service();
        let summary = service.summarize(USER).await.expect("summary");
        assert!(summary.is_empty());
        assert_eq!(summary.total, 0);
        assert_eq!(summary.render("KZT"), "");
        assert!(service.is_empty(USER).await.expect("is_empty"));
    }

    #[tokio::test]
    async fn three_potatoes_cost_600() {
        let (_, service) = service();
        service.add_item(USER, code(Category::Vegetables, 1), "3").await.expect("add");

        let summary = service.summarize(USER).await.expect("summary");
        assert_eq!(summary.lines.len(), 1);
        assert_eq!(summary.lines[0].line_total, 600);
        assert_eq!(summary.total, 600);
        assert_eq!(summary.render("KZT"), "1. Potatoes: 3 * 200 KZT = 600 KZT\nTotal: 600 KZT");
    }

    #[tokio::test]
    async fn total_is_the_sum_of_every_line() {
        let (_, service) = service();
        let catalog = Catalog::default();
        let picks =
            [(Category::Fruits, 2, "2"), (Category::Meals, 1, "1"), (Category::Drinks, 3, "4")];

        let mut expected = 0_u64;
        for (category, position, quantity) in picks {
            service.add_item(USER, code(category, position), quantity).await.expect("add");
            let price = catalog.lookup(category, position).expect("item").unit_price;
            expected += u64::from(price) * quantity.parse::<u64>().expect("numeric");
        }

        let summary = service.summarize(USER).await.expect("summary");
        assert_eq!(summary.total, expected);
        assert_eq!(summary.lines.iter().map(|line| line.line_total).sum::<u64>(), expected);
    }

    #[tokio::test]
    async fn invalid_quantities_never_touch_the_store() {
        let (store, service) = service();
        for raw in ["0", "-1", "abc"] {
            let error = service
                .add_item(USER, code(Category::Vegetables, 1), raw)
                .await
                .expect_err("must reject");
            assert!(matches!(error, CartError::InvalidQuantity(_)), "{raw}: {error:?}");
        }
        assert_eq!(store.count_for(USER).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn duplicate_lines_are_kept_and_removed_together() {
        let (_, service) = service();
        let apples = code(Category::Fruits, 1);
        service.add_item(USER, apples, "1").await.expect("add");
        service.add_item(USER, apples, "2").await.expect("add again");

        let summary = service.summarize(USER).await.expect("summary");
        assert_eq!(summary.lines.len(), 2);
        assert_eq!(summary.total, 3 * 600);

        assert_eq!(service.remove_item(USER, apples).await.expect("remove"), 2);
        assert!(service.is_empty(USER).await.expect("is_empty"));
    }

    #[tokio::test]
    async fn clearing_twice_is_safe() {
        let (_, service) = service();
        service.add_item(USER, code(Category::Drinks, 1), "2").await.expect("add");
        assert_eq!(service.clear_cart(USER).await.expect("clear"), 1);
        assert_eq!(service.clear_cart(USER).await.expect("clear again"), 0);
        assert!(service.is_empty(USER).await.expect("is_empty"));
    }

    #[tokio::test]
    async fn corrupt_rows_fail_the_summary() {
        let (store, service) = service();
        store.insert_raw(USER, "z9", 1).await;
        let error = service.summarize(USER).await.expect_err("malformed code");
        assert!(matches!(error, CartError::CorruptCartLine { ref code, .. } if code == "z9"));

        let (store, service) = self::service();
        store.insert_raw(USER, "v999", 1).await;
        assert!(matches!(
            service.summarize(USER).await,
            Err(CartError::CorruptCartLine { .. })
        ));

        let (store, service) = self::service();
        store.insert_raw(USER, "v1", 0).await;
        assert!(matches!(
            service.summarize(USER).await,
            Err(CartError::CorruptCartLine { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_products_are_not_inserted() {
        let (store, service) = service();
        let error = service
            .add_item(USER, code(Category::Meals, 500), "1")
            .await
            .expect_err("past the end of the catalog");
        assert!(matches!(error, CartError::UnknownProduct(_)));
        assert_eq!(store.count_for(USER).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn store_failures_propagate() {
        let (store, service) = service();
        store.set_unavailable(true);
        assert!(matches!(service.is_empty(USER).await, Err(CartError::Store(_))));
        assert!(matches!(service.summarize(USER).await, Err(CartError::Store(_))));
    }

    #[tokio::test]
    async fn a_total_beyond_u64_is_reported_instead_of_wrapping() {
        let store = Arc::new(InMemoryCartStore::default());
        let sections =
            BTreeMap::from([(Category::Meals, vec![CatalogItem::new("Feast", u32::MAX)])]);
        let catalog = Catalog::new("KZT", sections).expect("catalog");
        let service = CartService::new(store.clone(), Arc::new(catalog));

        store.insert_raw(USER, "m1", i64::from(u32::MAX)).await;
        let single = service.summarize(USER).await.expect("one line still fits");
        assert_eq!(single.total, u64::from(u32::MAX) * u64::from(u32::MAX));

        store.insert_raw(USER, "m1", i64::from(u32::MAX)).await;
        let error = service.summarize(USER).await.expect_err("sum overflows");
        match error {
            CartError::CorruptCartLine { reason, .. } => {
                assert!(reason.contains("overflows"), "{reason}")
            }
            other => panic!("expected a corrupt line, got {other:?}"),
        }
    }
}
