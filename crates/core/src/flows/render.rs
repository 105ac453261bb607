//! Reply texts and keyboards.

use chrono::{DateTime, Utc};

use crate::cart::CartSummary;
use crate::catalog::Catalog;
use crate::domain::cart::UserId;
use crate::domain::product::{CatalogItem, Category};
use crate::flows::input::{labels, payload};
use crate::flows::states::MenuNotice;
use crate::keyboard::{InlineButton, Keyboard};

pub const GREETING: &str = "Hello! I take grocery and meal orders.\n\
Press \"Menu\" to browse the catalog and fill your cart, \"Help\" to see how ordering works, \
or \"Feedback\" to write to us.";
pub const HELP: &str = "How to order:\n\
1. Press \"Menu\" and pick a category.\n\
2. Choose a product and type the quantity as a whole number.\n\
3. Press \"Send order to administrator\" and answer three questions: name, address, phone.\n\
Use \"Delete product\" or \"Clear cart\" to change the cart. Send /cancel to stop at any time.";
pub const UNKNOWN_COMMAND: &str =
    "Sorry, I don't know that command. Press \"Help\" to see what I can do.";
pub const MENU_EXPIRED: &str = "This menu has expired. Press \"Menu\" to open a new one.";
pub const STALE_BUTTON: &str =
    "That button belongs to an older message. Please use the latest menu.";
pub const INVALID_QUANTITY: &str =
    "The quantity must be a whole number greater than zero. Open the menu to try again.";
pub const ASK_NAME: &str = "What name should the order be under?";
pub const ASK_ADDRESS: &str = "Where should we deliver it? Please type the full address.";
pub const ASK_PHONE: &str =
    "What phone number can the courier call? Digits only, a leading + is fine.";
pub const INVALID_PHONE: &str =
    "That doesn't look like a phone number. Please send digits only, e.g. +77011234567.";
pub const ORDER_ACCEPTED: &str =
    "Thank you! Your order has been sent. An administrator will contact you soon.";
pub const CART_NOT_CLEARED: &str = "Your cart could not be emptied, so it still shows the products \
you just ordered. Clear it from the menu before your next order.";
pub const ASK_FEEDBACK: &str = "Write your feedback in one message and I'll pass it on.";
pub const FEEDBACK_ACCEPTED: &str = "Thank you for your feedback!";
pub const CANCELLED: &str = "Okay, I've stopped. Press \"Menu\" whenever you want to continue.";
pub const CONFIRM_CLEAR: &str = "Remove everything from your cart?";
pub const CHOOSE_DELETE_TARGET: &str = "Which product should be removed?";

pub fn command_keyboard() -> Keyboard {
    Keyboard::Reply(vec![
        vec![labels::MENU.to_owned()],
        vec![labels::HELP.to_owned()],
        vec![labels::FEEDBACK.to_owned()],
    ])
}

fn notice_text(notice: MenuNotice) -> Option<&'static str> {
    match notice {
        MenuNotice::None => None,
        MenuNotice::ItemAdded => Some("Added to your cart."),
        MenuNotice::CartCleared => Some("Your cart has been cleared."),
        MenuNotice::ClearCancelled => Some("Okay, your cart stays as it is."),
        MenuNotice::ItemRemoved => Some("The product was removed from your cart."),
        MenuNotice::EmptyCartOrder => {
            Some("Your cart is empty. Add something before sending an order.")
        }
        MenuNotice::EmptyCartDelete => Some("Your cart is empty, there is nothing to delete."),
    }
}

pub fn menu_text(summary: &CartSummary, currency: &str, notice: MenuNotice) -> String {
    let mut sections = Vec::new();
    if let Some(notice) = notice_text(notice) {
        sections.push(notice.to_owned());
    }
    if summary.is_empty() {
        sections.push("🛒 Your cart is empty.".to_owned());
    } else {
        sections.push(format!("🛒 Your cart:\n{}", summary.render(currency)));
    }
    sections.push("Choose a category:".to_owned());
    sections.join("\n\n")
}

pub fn category_keyboard(catalog: &Catalog) -> Keyboard {
    let categories = catalog
        .categories()
        .iter()
        .map(|category| InlineButton::new(category.label(), category.as_str()));
    let commands = [
        InlineButton::new("📨 Send order to administrator", payload::ORDER),
        InlineButton::new("➖ Delete product", payload::DELETE),
        InlineButton::new("🗑 Clear cart", payload::CLEAR),
    ];
    Keyboard::column(categories.chain(commands))
}

pub fn category_text(category: Category) -> String {
    format!("{}: choose a product", category.label())
}

pub fn item_keyboard(catalog: &Catalog, category: Category) -> Keyboard {
    let currency = catalog.currency();
    let items = catalog
        .codes(category)
        .map(|(code, item)| InlineButton::new(item.label(currency), code.to_string()));
    Keyboard::column(items.chain([InlineButton::new("⬅️ Back", payload::BACK)]))
}

pub fn quantity_prompt(item: &CatalogItem, currency: &str) -> String {
    format!("{}\nHow many would you like? Type a whole number.", item.label(currency))
}

/// One button per cart line; duplicates share a code, and pressing either removes both.
pub fn delete_keyboard(summary: &CartSummary, currency: &str) -> Keyboard {
    let lines = summary
        .lines
        .iter()
        .map(|line| InlineButton::new(line.describe(currency), line.code.to_string()));
    Keyboard::column(lines.chain([InlineButton::new("⬅️ Back", payload::BACK)]))
}

pub fn confirm_keyboard() -> Keyboard {
    Keyboard::Inline(vec![vec![
        InlineButton::new("Yes", payload::YES),
        InlineButton::new("No", payload::NO),
    ]])
}

fn handle(username: Option<&str>) -> String {
    match username {
        Some(username) => format!("@{username}"),
        None => "no username".to_owned(),
    }
}

pub struct OrderNotice<'a> {
    pub reference: &'a str,
    pub placed_at: DateTime<Utc>,
    pub name: &'a str,
    pub address: &'a str,
    pub phone: &'a str,
    pub username: Option<&'a str>,
    pub user_id: UserId,
    pub summary: &'a CartSummary,
    pub currency: &'a str,
}

pub fn order_notification(order: &OrderNotice<'_>) -> String {
    format!(
        "📦 New order {reference}\n\
         Placed: {placed_at}\n\
         Name: {name}\n\
         Address: {address}\n\
         Phone: {phone}\n\
         Customer: {handle} (id {user_id})\n\n\
         {cart}",
        reference = order.reference,
        placed_at = order.placed_at.format("%Y-%m-%d %H:%M UTC"),
        name = order.name,
        address = order.address,
        phone = order.phone,
        handle = handle(order.username),
        user_id = order.user_id,
        cart = order.summary.render(order.currency),
    )
}

pub fn feedback_notification(feedback: &str, username: Option<&str>, user_id: UserId) -> String {
    format!("💬 New feedback\n{feedback}\n\nFrom: {} (id {user_id})", handle(username))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{
        category_keyboard, delete_keyboard, feedback_notification, item_keyboard, menu_text,
        order_notification, OrderNotice,
    };
    use crate::cart::{CartSummary, SummaryLine};
    use crate::catalog::Catalog;
    use crate::domain::cart::UserId;
    use crate::domain::product::{Category, ProductCode};
    use crate::flows::states::MenuNotice;

    fn summary() -> CartSummary {
        CartSummary {
            lines: vec![SummaryLine {
                code: ProductCode::encode(Category::Vegetables, 1).expect("valid"),
                name: "Potatoes".to_owned(),
                quantity: 3,
                unit_price: 200,
                line_total: 600,
            }],
            total: 600,
        }
    }

    #[test]
    fn menu_text_shows_notice_then_cart() {
        let text = menu_text(&summary(), "KZT", MenuNotice::ItemAdded);
        assert_eq!(
            text,
            "Added to your cart.\n\n🛒 Your cart:\n1. Potatoes: 3 * 200 KZT = 600 KZT\nTotal: 600 KZT\n\nChoose a category:"
        );

        let empty = menu_text(&CartSummary::default(), "KZT", MenuNotice::None);
        assert!(empty.starts_with("🛒 Your cart is empty."));
    }

    #[test]
    fn category_keyboard_lists_categories_then_cart_commands() {
        let keyboard = category_keyboard(&Catalog::default());
        assert_eq!(
            keyboard.payloads(),
            vec!["vegetables", "fruits", "meals", "drinks", "order", "delete", "clear"]
        );
    }

    #[test]
    fn item_keyboard_uses_product_codes_and_ends_with_back() {
        let catalog = Catalog::default();
        let keyboard = item_keyboard(&catalog, Category::Vegetables);
        let payloads = keyboard.payloads();
        assert_eq!(payloads.first().copied(), Some("v1"));
        assert_eq!(payloads.last().copied(), Some("back"));
        assert_eq!(payloads.len(), catalog.items(Category::Vegetables).len() + 1);
        assert_eq!(keyboard.labels()[0], "Potatoes - 200 KZT per kg");
    }

    #[test]
    fn delete_keyboard_has_one_button_per_line() {
        let keyboard = delete_keyboard(&summary(), "KZT");
        assert_eq!(keyboard.payloads(), vec!["v1", "back"]);
        assert_eq!(keyboard.labels()[0], "Potatoes: 3 * 200 KZT = 600 KZT");
    }

    #[test]
    fn order_notification_carries_contact_details_and_cart() {
        let cart = summary();
        let text = order_notification(&OrderNotice {
            reference: "ord-1",
            placed_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).single().expect("valid time"),
            name: "Jane",
            address: "1 Main St",
            phone: "5551234",
            username: Some("jane"),
            user_id: UserId(42),
            summary: &cart,
            currency: "KZT",
        });
        for expected in [
            "ord-1",
            "2026-03-01 09:30 UTC",
            "Jane",
            "1 Main St",
            "5551234",
            "@jane",
            "id 42",
            "Total: 600 KZT",
        ] {
            assert!(text.contains(expected), "missing {expected} in {text}");
        }
    }

    #[test]
    fn feedback_notification_falls_back_without_username() {
        let text = feedback_notification("Tasty", None, UserId(7));
        assert!(text.contains("Tasty"));
        assert!(text.contains("no username (id 7)"));
    }
}
