use std::sync::Arc;

use basketbot_core::cart::{CartService, CartStore, InMemoryCartStore};
use basketbot_core::flows::render;
use basketbot_core::flows::{ConversationRuntime, ConversationState, InboundEvent};
use basketbot_core::{Catalog, RecordingMessenger, UserId};

const CUSTOMER: UserId = UserId(500);
const ADMINS: [UserId; 3] = [UserId(1), UserId(2), UserId(3)];

struct Bot {
    store: Arc<InMemoryCartStore>,
    messenger: Arc<RecordingMessenger>,
    runtime: ConversationRuntime,
}

impl Bot {
    fn new() -> Self {
        let store = Arc::new(InMemoryCartStore::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let cart = CartService::new(store.clone(), Arc::new(Catalog::default()));
        let runtime = ConversationRuntime::new(cart, messenger.clone(), ADMINS.to_vec());
        Self { store, messenger, runtime }
    }

    async fn text(&self, text: &str) -> ConversationState {
        let event = InboundEvent::text(CUSTOMER, text).with_username("jane_doe");
        self.runtime.handle(event).await.expect("text handled").to
    }

    async fn press(&self, payload: &str) -> ConversationState {
        let event = InboundEvent::button(CUSTOMER, payload).with_username("jane_doe");
        self.runtime.handle(event).await.expect("button handled").to
    }

    async fn add(&self, code: &str, quantity: &str) {
        assert_eq!(self.press(code).await, ConversationState::AwaitingQuantity);
        assert_eq!(self.text(quantity).await, ConversationState::BrowsingMenu);
    }
}

#[tokio::test]
async fn full_checkout_notifies_every_admin_and_empties_the_cart() {
    let bot = Bot::new();
    assert_eq!(bot.text("/menu").await, ConversationState::BrowsingMenu);
    bot.press("vegetables").await;
    bot.add("v1", "3").await;
    bot.add("d2", "2").await;

    assert_eq!(bot.press("order").await, ConversationState::AwaitingName);
    assert_eq!(bot.text("Jane").await, ConversationState::AwaitingAddress);
    assert_eq!(bot.text("1 Main St").await, ConversationState::AwaitingPhone);
    assert_eq!(bot.text("5551234").await, ConversationState::Idle);

    for admin in ADMINS {
        let notices = bot.messenger.messages_for(admin);
        assert_eq!(notices.len(), 1, "admin {admin} should get exactly one order");
        let text = &notices[0].text;
        for expected in [
            "Jane",
            "1 Main St",
            "5551234",
            "@jane_doe",
            "Potatoes: 3 * 200 KZT = 600 KZT",
            "Ayran: 2 * 400 KZT = 800 KZT",
            "Total: 1400 KZT",
        ] {
            assert!(text.contains(expected), "missing `{expected}` in:\n{text}");
        }
    }

    assert_eq!(bot.store.count_for(CUSTOMER).await.expect("count"), 0);
    let confirmation = bot.messenger.last_for(CUSTOMER).expect("confirmation");
    assert!(confirmation.text.starts_with(render::ORDER_ACCEPTED));
    assert_eq!(bot.runtime.sessions().active_sessions().await, 0);
}

#[tokio::test]
async fn unreachable_admin_does_not_block_the_order() {
    let bot = Bot::new();
    bot.messenger.fail_for(ADMINS[1]);

    bot.text("/menu").await;
    bot.add("m1", "1").await;
    bot.press("order").await;
    bot.text("Jane").await;
    bot.text("1 Main St").await;
    assert_eq!(bot.text("+77011234567").await, ConversationState::Idle);

    assert_eq!(bot.messenger.messages_for(ADMINS[0]).len(), 1);
    assert!(bot.messenger.messages_for(ADMINS[1]).is_empty());
    assert_eq!(bot.messenger.messages_for(ADMINS[2]).len(), 1);
    assert_eq!(bot.store.count_for(CUSTOMER).await.expect("count"), 0);
}

#[tokio::test]
async fn invalid_phone_reprompts_until_digits_arrive() {
    let bot = Bot::new();
    bot.text("/menu").await;
    bot.add("f1", "2").await;
    bot.press("order").await;
    bot.text("Jane").await;
    bot.text("1 Main St").await;

    assert_eq!(bot.text("call me").await, ConversationState::AwaitingPhone);
    assert_eq!(
        bot.messenger.last_for(CUSTOMER).map(|message| message.text).as_deref(),
        Some(render::INVALID_PHONE)
    );
    assert!(bot.messenger.messages_for(ADMINS[0]).is_empty());
    assert_eq!(bot.text("5551234").await, ConversationState::Idle);
}

#[tokio::test]
async fn declining_the_clear_keeps_every_line() {
    let bot = Bot::new();
    bot.text("/menu").await;
    bot.add("v2", "1").await;
    bot.add("f3", "4").await;

    assert_eq!(bot.press("clear").await, ConversationState::ConfirmClear);
    assert_eq!(bot.press("no").await, ConversationState::BrowsingMenu);
    assert_eq!(bot.store.count_for(CUSTOMER).await.expect("count"), 2);

    assert_eq!(bot.press("clear").await, ConversationState::ConfirmClear);
    assert_eq!(bot.press("yes").await, ConversationState::BrowsingMenu);
    assert_eq!(bot.store.count_for(CUSTOMER).await.expect("count"), 0);
}

#[tokio::test]
async fn duplicates_are_summed_and_deleted_together() {
    let bot = Bot::new();
    bot.text("/menu").await;
    bot.add("v1", "1").await;
    bot.add("v1", "2").await;

    let menu = bot.messenger.last_for(CUSTOMER).expect("menu");
    assert!(menu.text.contains("Total: 600 KZT"), "{}", menu.text);

    assert_eq!(bot.press("delete").await, ConversationState::SelectDeleteTarget);
    let targets = bot.messenger.last_for(CUSTOMER).expect("delete keyboard");
    let payloads =
        targets.keyboard.as_ref().map(|keyboard| keyboard.payloads()).unwrap_or_default();
    assert_eq!(payloads, vec!["v1", "v1", "back"]);

    assert_eq!(bot.press("v1").await, ConversationState::BrowsingMenu);
    assert_eq!(bot.store.count_for(CUSTOMER).await.expect("count"), 0);
}

#[tokio::test]
async fn bad_quantity_ends_the_conversation_without_touching_the_cart() {
    let bot = Bot::new();
    bot.text("/menu").await;
    bot.press("v1").await;

    assert_eq!(bot.text("a lot").await, ConversationState::Idle);
    assert_eq!(bot.store.count_for(CUSTOMER).await.expect("count"), 0);
    assert_eq!(
        bot.messenger.last_for(CUSTOMER).map(|message| message.text).as_deref(),
        Some(render::INVALID_QUANTITY)
    );

    assert_eq!(bot.press("v1").await, ConversationState::Idle);
    assert_eq!(
        bot.messenger.last_for(CUSTOMER).map(|message| message.text).as_deref(),
        Some(render::MENU_EXPIRED)
    );
}

#[tokio::test]
async fn users_are_isolated_from_each_other() {
    let bot = Arc::new(Bot::new());
    let other = UserId(777);

    bot.text("/menu").await;
    bot.add("v1", "1").await;

    let runtime = &bot.runtime;
    runtime.handle(InboundEvent::text(other, "/menu")).await.expect("other menu");
    runtime.handle(InboundEvent::button(other, "order")).await.expect("other order");

    assert_eq!(runtime.sessions().state_of(other).await, ConversationState::BrowsingMenu);
    assert_eq!(runtime.sessions().state_of(CUSTOMER).await, ConversationState::BrowsingMenu);
    assert_eq!(bot.store.count_for(other).await.expect("count"), 0);
}

#[tokio::test]
async fn concurrent_events_for_one_user_are_serialized() {
    let bot = Arc::new(Bot::new());
    bot.text("/menu").await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let bot = Arc::clone(&bot);
        tasks.push(tokio::spawn(async move {
            bot.runtime.handle(InboundEvent::button(CUSTOMER, "fruits")).await
        }));
    }
    for task in tasks {
        let outcome = task.await.expect("task").expect("handled");
        assert_eq!(outcome.from, ConversationState::BrowsingMenu);
        assert_eq!(outcome.to, ConversationState::BrowsingMenu);
    }
    assert_eq!(bot.runtime.sessions().active_sessions().await, 1);
}
