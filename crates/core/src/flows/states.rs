use serde::{Deserialize, Serialize};

use crate::domain::cart::Quantity;
use crate::domain::product::{Category, ProductCode};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    BrowsingMenu,
    AwaitingQuantity,
    ConfirmClear,
    SelectDeleteTarget,
    AwaitingName,
    AwaitingAddress,
    AwaitingPhone,
    AwaitingFeedback,
}

impl ConversationState {
    /// States whose handler reads typed text. The rest are driven by button presses.
    pub fn expects_text(self) -> bool {
        matches!(
            self,
            Self::AwaitingQuantity
                | Self::AwaitingName
                | Self::AwaitingAddress
                | Self::AwaitingPhone
                | Self::AwaitingFeedback
        )
    }
}

/// Commands available from the persistent keyboard or as slash commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCommand {
    Start,
    OpenMenu,
    Help,
    LeaveFeedback,
    Cancel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    Command(EntryCommand),
    UnknownCommand(String),
    Text(String),
    CategorySelected(Category),
    ProductSelected(ProductCode),
    Back,
    Order,
    Delete,
    Clear,
    Confirm(bool),
    /// A button payload this bot could not have produced for the current catalog.
    MalformedButton { payload: String, reason: String },
}

impl FlowEvent {
    pub fn is_button(&self) -> bool {
        !matches!(self, Self::Command(_) | Self::UnknownCommand(_) | Self::Text(_))
    }

    /// Events whose transition depends on whether the cart is empty.
    pub fn needs_cart_state(&self) -> bool {
        matches!(self, Self::Order | Self::Delete)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Command(EntryCommand::Start) => "command.start",
            Self::Command(EntryCommand::OpenMenu) => "command.menu",
            Self::Command(EntryCommand::Help) => "command.help",
            Self::Command(EntryCommand::LeaveFeedback) => "command.feedback",
            Self::Command(EntryCommand::Cancel) => "command.cancel",
            Self::UnknownCommand(_) => "command.unknown",
            Self::Text(_) => "text",
            Self::CategorySelected(_) => "button.category",
            Self::ProductSelected(_) => "button.product",
            Self::Back => "button.back",
            Self::Order => "button.order",
            Self::Delete => "button.delete",
            Self::Clear => "button.clear",
            Self::Confirm(_) => "button.confirm",
            Self::MalformedButton { .. } => "button.malformed",
        }
    }
}

/// Facts the transition needs that live outside the state tag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowContext {
    /// Only computed for events where [`FlowEvent::needs_cart_state`] holds.
    pub cart_is_empty: bool,
    pub pending_selection: Option<ProductCode>,
}

/// Short line shown above the cart summary when the menu is re-rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuNotice {
    None,
    ItemAdded,
    CartCleared,
    ClearCancelled,
    ItemRemoved,
    EmptyCartOrder,
    EmptyCartDelete,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    ShowGreeting,
    ShowHelp,
    ReplyUnknownCommand,
    ReplyMenuExpired,
    ReplyStaleButton,
    ResetDraft,
    ShowMenu(MenuNotice),
    ShowCategory(Category),
    RememberSelection(ProductCode),
    PromptQuantity(ProductCode),
    AddToCart { code: ProductCode, quantity: Quantity },
    ReportInvalidQuantity,
    PromptClearConfirmation,
    ClearCart,
    ShowDeleteTargets,
    RemoveFromCart(ProductCode),
    PromptName,
    RecordName(String),
    PromptAddress,
    RecordAddress(String),
    PromptPhone,
    ReportInvalidPhone,
    SubmitOrder { phone: String },
    PromptFeedback,
    SubmitFeedback(String),
    ReportInternalError(String),
    ConfirmCancellation,
}

impl FlowAction {
    /// Actions that change stored cart rows. Once one of them has run, the event cannot be
    /// rolled back.
    pub fn writes_cart(&self) -> bool {
        matches!(
            self,
            Self::AddToCart { .. }
                | Self::ClearCart
                | Self::RemoveFromCart(_)
                | Self::SubmitOrder { .. }
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: ConversationState,
    pub to: ConversationState,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}

impl TransitionOutcome {
    /// True when the conversation was active and this transition closes it.
    pub fn ends_conversation(&self) -> bool {
        self.from != ConversationState::Idle && self.to == ConversationState::Idle
    }
}
