use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CartStore, StoreError};
use crate::domain::cart::{Quantity, StoredLine, UserId};
use crate::domain::product::ProductCode;

/// Store calls that can be told to fail once with [`InMemoryCartStore::fail_once`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreCall {
    Insert,
    Clear,
    DeleteOne,
    ListFor,
    CountFor,
}

/// Process-local cart store for tests and for running without a database.
#[derive(Default)]
pub struct InMemoryCartStore {
    rows: RwLock<Vec<(UserId, StoredLine)>>,
    unavailable: AtomicBool,
    scheduled_failures: Mutex<Vec<StoreCall>>,
}

impl InMemoryCartStore {
    /// Makes every subsequent call fail with [`StoreError::Unavailable`] until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Writes a row without any typing, the way a hand-edited table would look.
    pub async fn insert_raw(&self, user_id: UserId, product_code: &str, quantity: i64) {
        let mut rows = self.rows.write().await;
        rows.push((user_id, StoredLine { product_code: product_code.to_owned(), quantity }));
    }

    /// Makes the next `call` fail with [`StoreError::Unavailable`]; later calls succeed again.
    pub fn fail_once(&self, call: StoreCall) {
        self.scheduled_failures.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(call);
    }

    fn check_available(&self, call: StoreCall) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".to_owned()));
        }
        let mut scheduled =
            self.scheduled_failures.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(index) = scheduled.iter().position(|pending| *pending == call) {
            scheduled.remove(index);
            return Err(StoreError::Unavailable(format!("scheduled failure of {call:?}")));
        }
        Ok(())
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn insert(
        &self,
        user_id: UserId,
        quantity: Quantity,
        code: ProductCode,
    ) -> Result<(), StoreError> {
        self.check_available(StoreCall::Insert)?;
        let mut rows = self.rows.write().await;
        rows.push((user_id, StoredLine::new(code, quantity)));
        Ok(())
    }

    async fn clear(&self, user_id: UserId) -> Result<u64, StoreError> {
        self.check_available(StoreCall::Clear)?;
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|(owner, _)| *owner != user_id);
        Ok((before - rows.len()) as u64)
    }

    async fn delete_one(&self, user_id: UserId, code: ProductCode) -> Result<u64, StoreError> {
        self.check_available(StoreCall::DeleteOne)?;
        let code = code.to_string();
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|(owner, line)| !(*owner == user_id && line.product_code == code));
        Ok((before - rows.len()) as u64)
    }

    async fn list_for(&self, user_id: UserId) -> Result<Vec<StoredLine>, StoreError> {
        self.check_available(StoreCall::ListFor)?;
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, line)| line.clone())
            .collect())
    }

    async fn count_for(&self, user_id: UserId) -> Result<u64, StoreError> {
        self.check_available(StoreCall::CountFor)?;
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|(owner, _)| *owner == user_id).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryCartStore, StoreCall};
    use crate::cart::{CartStore, StoreError};
    use crate::domain::cart::{Quantity, UserId};
    use crate::domain::product::{Category, ProductCode};

    fn code(category: Category, position: u16) -> ProductCode {
        ProductCode::encode(category, position).expect("valid code")
    }

    fn qty(value: u32) -> Quantity {
        Quantity::new(value).expect("positive")
    }

    #[tokio::test]
    async fn lines_are_listed_per_user_in_insertion_order() {
        let store = InMemoryCartStore::default();
        let alice = UserId(1);
        let bob = UserId(2);

        store.insert(alice, qty(2), code(Category::Fruits, 2)).await.expect("insert");
        store.insert(bob, qty(1), code(Category::Meals, 1)).await.expect("insert");
        store.insert(alice, qty(5), code(Category::Vegetables, 1)).await.expect("insert");

        let lines = store.list_for(alice).await.expect("list");
        let codes: Vec<_> = lines.iter().map(|line| line.product_code.as_str()).collect();
        assert_eq!(codes, vec!["f2", "v1"]);
        assert_eq!(store.count_for(bob).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn delete_one_removes_duplicates_and_clear_is_idempotent() {
        let store = InMemoryCartStore::default();
        let user = UserId(7);
        let carrots = code(Category::Vegetables, 2);

        store.insert(user, qty(1), carrots).await.expect("insert");
        store.insert(user, qty(3), carrots).await.expect("insert");
        store.insert(user, qty(1), code(Category::Drinks, 1)).await.expect("insert");

        assert_eq!(store.delete_one(user, carrots).await.expect("delete"), 2);
        assert_eq!(store.count_for(user).await.expect("count"), 1);

        assert_eq!(store.clear(user).await.expect("clear"), 1);
        assert_eq!(store.clear(user).await.expect("second clear"), 0);
        assert_eq!(store.count_for(user).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = InMemoryCartStore::default();
        store.set_unavailable(true);
        let error = store.count_for(UserId(1)).await.expect_err("switched off");
        assert!(matches!(error, StoreError::Unavailable(_)));

        store.set_unavailable(false);
        assert_eq!(store.count_for(UserId(1)).await.expect("back on"), 0);
    }

    #[tokio::test]
    async fn scheduled_failure_hits_only_the_next_matching_call() {
        let store = InMemoryCartStore::default();
        let user = UserId(3);
        store.insert(user, qty(1), code(Category::Fruits, 1)).await.expect("insert");
        store.fail_once(StoreCall::ListFor);

        assert_eq!(store.count_for(user).await.expect("count is unaffected"), 1);
        assert!(matches!(store.list_for(user).await, Err(StoreError::Unavailable(_))));
        assert_eq!(store.list_for(user).await.expect("recovered").len(), 1);
    }
}
