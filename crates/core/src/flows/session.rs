//! Per-user conversation sessions.
//!
//! A session exists only while a user is in the middle of a conversation. Each one sits in
//! its own slot behind a `tokio::sync::Mutex`, and the handler holds that lock for the whole
//! event, so a user's events never interleave while different users proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::cart::UserId;
use crate::domain::product::ProductCode;
use crate::flows::states::ConversationState;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckoutDraft {
    pub name: Option<String>,
    pub address: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationSession {
    pub state: ConversationState,
    pub pending_selection: Option<ProductCode>,
    pub draft: CheckoutDraft,
}

impl ConversationSession {
    pub fn reset_draft(&mut self) {
        self.pending_selection = None;
        self.draft = CheckoutDraft::default();
    }
}

#[derive(Default)]
struct SessionSlot {
    retired: bool,
    session: ConversationSession,
}

/// Exclusive access to one user's session for the duration of an event.
pub struct SessionGuard {
    user_id: UserId,
    slot: Arc<Mutex<SessionSlot>>,
    guard: OwnedMutexGuard<SessionSlot>,
}

impl SessionGuard {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn session(&self) -> &ConversationSession {
        &self.guard.session
    }

    pub fn session_mut(&mut self) -> &mut ConversationSession {
        &mut self.guard.session
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    slots: Mutex<HashMap<UserId, Arc<Mutex<SessionSlot>>>>,
}

impl SessionRegistry {
    /// Waits until no other event of this user is being handled. A slot retired while we
    /// were waiting on it is skipped and a fresh one is taken instead.
    pub async fn acquire(&self, user_id: UserId) -> SessionGuard {
        loop {
            let slot = {
                let mut slots = self.slots.lock().await;
                slots.entry(user_id).or_default().clone()
            };
            let guard = slot.clone().lock_owned().await;
            if !guard.retired {
                return SessionGuard { user_id, slot, guard };
            }
        }
    }

    /// Drops the session. The user starts from `Idle` on their next event.
    pub async fn discard(&self, mut guard: SessionGuard) {
        guard.guard.retired = true;
        let mut slots = self.slots.lock().await;
        if slots.get(&guard.user_id).is_some_and(|current| Arc::ptr_eq(current, &guard.slot)) {
            slots.remove(&guard.user_id);
        }
    }

    pub async fn active_sessions(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Current state of a user, after any in-flight event of theirs has finished.
    pub async fn state_of(&self, user_id: UserId) -> ConversationState {
        let slot = self.slots.lock().await.get(&user_id).cloned();
        match slot {
            Some(slot) => {
                let slot = slot.lock().await;
                if slot.retired {
                    ConversationState::Idle
                } else {
                    slot.session.state
                }
            }
            None => ConversationState::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::SessionRegistry;
    use crate::domain::cart::UserId;
    use crate::flows::states::ConversationState;

    #[tokio::test]
    async fn fresh_users_start_idle_and_sessions_persist_until_discarded() {
        let registry = SessionRegistry::default();
        let user = UserId(1);
        assert_eq!(registry.state_of(user).await, ConversationState::Idle);

        let mut guard = registry.acquire(user).await;
        assert_eq!(guard.session().state, ConversationState::Idle);
        guard.session_mut().state = ConversationState::BrowsingMenu;
        drop(guard);

        assert_eq!(registry.state_of(user).await, ConversationState::BrowsingMenu);
        assert_eq!(registry.active_sessions().await, 1);

        let guard = registry.acquire(user).await;
        registry.discard(guard).await;
        assert_eq!(registry.active_sessions().await, 0);
        assert_eq!(registry.state_of(user).await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn waiter_on_a_discarded_slot_gets_a_fresh_session() {
        let registry = Arc::new(SessionRegistry::default());
        let user = UserId(2);

        let mut first = registry.acquire(user).await;
        first.session_mut().state = ConversationState::AwaitingPhone;

        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let guard = registry.acquire(user).await;
                guard.session().state
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        registry.discard(first).await;
        let seen = waiter.await.expect("waiter task");
        assert_eq!(seen, ConversationState::Idle);
    }

    #[tokio::test]
    async fn different_users_do_not_block_each_other() {
        let registry = SessionRegistry::default();
        let _alice = registry.acquire(UserId(10)).await;
        let bob = tokio::time::timeout(Duration::from_secs(1), registry.acquire(UserId(11))).await;
        assert!(bob.is_ok());
    }
}
