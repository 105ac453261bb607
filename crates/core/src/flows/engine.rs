use crate::domain::cart::Quantity;
use crate::flows::states::{
    ConversationState, EntryCommand, FlowAction, FlowContext, FlowEvent, MenuNotice,
    TransitionOutcome,
};

pub trait FlowDefinition {
    fn initial_state(&self) -> ConversationState;
    fn transition(
        &self,
        current: ConversationState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> TransitionOutcome;
}

/// Menu browsing, checkout and feedback as one conversation.
#[derive(Clone, Debug, Default)]
pub struct OrderingFlow;

impl FlowDefinition for OrderingFlow {
    fn initial_state(&self) -> ConversationState {
        ConversationState::Idle
    }

    fn transition(
        &self,
        current: ConversationState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> TransitionOutcome {
        transition_ordering(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> ConversationState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: ConversationState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> TransitionOutcome {
        self.flow.transition(current, event, context)
    }
}

impl Default for FlowEngine<OrderingFlow> {
    fn default() -> Self {
        Self::new(OrderingFlow)
    }
}

/// Digits with an optional leading `+`, after trimming.
pub fn is_phone_number(input: &str) -> bool {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

fn transition_ordering(
    current: ConversationState,
    event: &FlowEvent,
    context: &FlowContext,
) -> TransitionOutcome {
    use ConversationState::{
        AwaitingAddress, AwaitingFeedback, AwaitingName, AwaitingPhone, AwaitingQuantity,
        BrowsingMenu, ConfirmClear, Idle, SelectDeleteTarget,
    };
    use EntryCommand::{Cancel, Help, LeaveFeedback, OpenMenu, Start};
    use FlowAction::{
        AddToCart, ClearCart, ConfirmCancellation, PromptAddress, PromptClearConfirmation,
        PromptFeedback, PromptName, PromptPhone, PromptQuantity, RecordAddress, RecordName,
        RememberSelection, RemoveFromCart, ReplyMenuExpired, ReplyStaleButton,
        ReplyUnknownCommand, ReportInternalError, ReportInvalidPhone, ReportInvalidQuantity,
        ResetDraft, ShowCategory, ShowDeleteTargets, ShowGreeting, ShowHelp, ShowMenu,
        SubmitFeedback, SubmitOrder,
    };
    use FlowEvent::{
        Back, CategorySelected, Clear, Command, Confirm, Delete, MalformedButton, Order,
        ProductSelected, Text, UnknownCommand,
    };

    let (to, actions) = match (current, event) {
        // Commands win over whatever the current state expects.
        (_, Command(Cancel)) => (Idle, vec![ConfirmCancellation]),
        (state, Command(Start)) => (state, vec![ShowGreeting]),
        (state, Command(Help)) => (state, vec![ShowHelp]),
        (_, Command(OpenMenu)) => (BrowsingMenu, vec![ResetDraft, ShowMenu(MenuNotice::None)]),
        (_, Command(LeaveFeedback)) => (AwaitingFeedback, vec![ResetDraft, PromptFeedback]),
        (state, UnknownCommand(_)) => (state, vec![ReplyUnknownCommand]),

        (Idle, Text(_)) => (Idle, Vec::new()),
        (Idle, _) => (Idle, vec![ReplyMenuExpired]),

        (BrowsingMenu, CategorySelected(category)) => (BrowsingMenu, vec![ShowCategory(*category)]),
        (BrowsingMenu, ProductSelected(code)) => {
            (AwaitingQuantity, vec![RememberSelection(*code), PromptQuantity(*code)])
        }
        (BrowsingMenu, Back) => (BrowsingMenu, vec![ShowMenu(MenuNotice::None)]),
        (BrowsingMenu, Order) if context.cart_is_empty => {
            (BrowsingMenu, vec![ShowMenu(MenuNotice::EmptyCartOrder)])
        }
        (BrowsingMenu, Order) => (AwaitingName, vec![PromptName]),
        (BrowsingMenu, Delete) if context.cart_is_empty => {
            (BrowsingMenu, vec![ShowMenu(MenuNotice::EmptyCartDelete)])
        }
        (BrowsingMenu, Delete) => (SelectDeleteTarget, vec![ShowDeleteTargets]),
        (BrowsingMenu, Clear) => (ConfirmClear, vec![PromptClearConfirmation]),

        (AwaitingQuantity, Text(text)) => match (context.pending_selection, Quantity::parse(text)) {
            (_, Err(_)) => (Idle, vec![ReportInvalidQuantity]),
            (Some(code), Ok(quantity)) => {
                (BrowsingMenu, vec![AddToCart { code, quantity }, ShowMenu(MenuNotice::ItemAdded)])
            }
            (None, Ok(_)) => (
                BrowsingMenu,
                vec![
                    ReportInternalError("quantity received without a selected product".to_owned()),
                    ShowMenu(MenuNotice::None),
                ],
            ),
        },

        (ConfirmClear, Confirm(true)) => {
            (BrowsingMenu, vec![ClearCart, ShowMenu(MenuNotice::CartCleared)])
        }
        (ConfirmClear, MalformedButton { reason, .. }) => {
            (ConfirmClear, vec![ReportInternalError(reason.clone())])
        }
        (ConfirmClear, button) if button.is_button() => {
            (BrowsingMenu, vec![ShowMenu(MenuNotice::ClearCancelled)])
        }

        (SelectDeleteTarget, ProductSelected(code)) => {
            (BrowsingMenu, vec![RemoveFromCart(*code), ShowMenu(MenuNotice::ItemRemoved)])
        }
        (SelectDeleteTarget, Back) => (BrowsingMenu, vec![ShowMenu(MenuNotice::None)]),

        (state @ (BrowsingMenu | SelectDeleteTarget), MalformedButton { reason, .. }) => {
            (state, vec![ReportInternalError(reason.clone())])
        }
        (state @ (BrowsingMenu | SelectDeleteTarget), button) if button.is_button() => {
            (state, vec![ReplyStaleButton])
        }

        (AwaitingName, Text(text)) => {
            (AwaitingAddress, vec![RecordName(text.trim().to_owned()), PromptAddress])
        }
        (AwaitingAddress, Text(text)) => {
            (AwaitingPhone, vec![RecordAddress(text.trim().to_owned()), PromptPhone])
        }
        (AwaitingPhone, Text(text)) if is_phone_number(text) => {
            (Idle, vec![SubmitOrder { phone: text.trim().to_owned() }])
        }
        (AwaitingPhone, Text(_)) => (AwaitingPhone, vec![ReportInvalidPhone]),
        (AwaitingFeedback, Text(text)) => (Idle, vec![SubmitFeedback(text.trim().to_owned())]),

        // Typed text where a button is expected, or a button where text is expected.
        _ => (Idle, vec![ConfirmCancellation]),
    };

    TransitionOutcome { from: current, to, event: event.clone(), actions }
}
