//! Executes transitions: one inbound event in, cart mutations and replies out.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::cart::CartService;
use crate::domain::cart::UserId;
use crate::errors::{ApplicationError, DomainError, InterfaceError};
use crate::flows::engine::{FlowEngine, OrderingFlow};
use crate::flows::input::{classify, InboundEvent};
use crate::flows::render::{self, OrderNotice};
use crate::flows::session::{ConversationSession, SessionRegistry};
use crate::flows::states::{ConversationState, FlowAction, FlowContext, TransitionOutcome};
use crate::notify::{fan_out, Messenger, Outbound};

/// Actions of one event that ran. `late_failure` is an error raised after a cart write had
/// already succeeded.
struct Applied {
    outcome: TransitionOutcome,
    replies: Vec<Outbound>,
    late_failure: Option<ApplicationError>,
}

pub struct ConversationRuntime {
    engine: FlowEngine<OrderingFlow>,
    cart: CartService,
    messenger: Arc<dyn Messenger>,
    admins: Vec<UserId>,
    sessions: SessionRegistry,
}

impl ConversationRuntime {
    pub fn new(cart: CartService, messenger: Arc<dyn Messenger>, admins: Vec<UserId>) -> Self {
        Self {
            engine: FlowEngine::default(),
            cart,
            messenger,
            admins,
            sessions: SessionRegistry::default(),
        }
    }

    pub fn cart(&self) -> &CartService {
        &self.cart
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Handles one event while holding the user's session lock. Actions run in order on a
    /// copy of the session; the copy and the new state are kept only if every action succeeds.
    /// On failure the user gets an error reply and stays in the state they were in, unless a
    /// cart write already went through: then the transition is kept and only the failure is
    /// reported, so resending the same input cannot repeat the write.
    pub async fn handle(&self, inbound: InboundEvent) -> Result<TransitionOutcome, InterfaceError> {
        let user_id = inbound.user_id;
        let correlation_id = inbound.correlation_id.clone();

        let mut guard = self.sessions.acquire(user_id).await;
        let current = guard.session().state;
        let mut working = guard.session().clone();

        debug!(
            event_name = "conversation.event_received",
            correlation_id = %correlation_id,
            user_id = %user_id,
            state = ?current,
            kind = ?inbound.kind,
            "inbound event received"
        );

        match self.process(&inbound, current, &mut working).await {
            Ok(Applied { outcome, replies, late_failure }) => {
                for reply in replies {
                    self.deliver(reply, &correlation_id).await;
                }

                working.state = outcome.to;
                *guard.session_mut() = working;
                if outcome.to == ConversationState::Idle {
                    self.sessions.discard(guard).await;
                }

                info!(
                    event_name = "conversation.transition_applied",
                    correlation_id = %correlation_id,
                    user_id = %user_id,
                    from = ?outcome.from,
                    to = ?outcome.to,
                    event = outcome.event.name(),
                    actions = outcome.actions.len(),
                    "conversation transition applied"
                );

                match late_failure {
                    None => Ok(outcome),
                    Some(failure) => Err(self
                        .report_failure(failure, user_id, &correlation_id, outcome.to)
                        .await),
                }
            }
            Err(failure) => {
                let interface =
                    self.report_failure(failure, user_id, &correlation_id, current).await;
                if current == ConversationState::Idle {
                    self.sessions.discard(guard).await;
                }
                Err(interface)
            }
        }
    }

    async fn report_failure(
        &self,
        failure: ApplicationError,
        user_id: UserId,
        correlation_id: &str,
        state: ConversationState,
    ) -> InterfaceError {
        let interface = failure.into_interface(correlation_id);
        match &interface {
            InterfaceError::Internal { message, .. } => error!(
                event_name = "conversation.transition_failed",
                correlation_id = %correlation_id,
                user_id = %user_id,
                state = ?state,
                error = %message,
                "event aborted by an internal error"
            ),
            other => warn!(
                event_name = "conversation.transition_failed",
                correlation_id = %correlation_id,
                user_id = %user_id,
                state = ?state,
                error = %other,
                "event aborted"
            ),
        }
        self.deliver(Outbound::text(user_id, interface.reply_text()), correlation_id).await;
        interface
    }

    async fn process(
        &self,
        inbound: &InboundEvent,
        current: ConversationState,
        session: &mut ConversationSession,
    ) -> Result<Applied, ApplicationError> {
        let event = classify(inbound, self.cart.catalog());
        let cart_is_empty =
            if current == ConversationState::BrowsingMenu && event.needs_cart_state() {
                self.cart.is_empty(inbound.user_id).await?
            } else {
                false
            };
        let context = FlowContext { cart_is_empty, pending_selection: session.pending_selection };
        let outcome = self.engine.apply(current, &event, &context);

        let mut replies = Vec::new();
        let mut cart_written = false;
        for action in &outcome.actions {
            match self.apply_action(action, inbound, session).await {
                Ok(reply) => {
                    replies.extend(reply);
                    cart_written |= action.writes_cart();
                }
                Err(failure) if cart_written => {
                    return Ok(Applied { outcome, replies, late_failure: Some(failure) });
                }
                Err(failure) => return Err(failure),
            }
        }
        Ok(Applied { outcome, replies, late_failure: None })
    }

    async fn apply_action(
        &self,
        action: &FlowAction,
        inbound: &InboundEvent,
        session: &mut ConversationSession,
    ) -> Result<Option<Outbound>, ApplicationError> {
        let user_id = inbound.user_id;
        let catalog = self.cart.catalog();
        let currency = catalog.currency();
        let text = |body: &str| Some(Outbound::text(user_id, body));

        let reply = match action {
            FlowAction::ShowGreeting => Some(
                Outbound::text(user_id, render::GREETING).with_keyboard(render::command_keyboard()),
            ),
            FlowAction::ShowHelp => text(render::HELP),
            FlowAction::ReplyUnknownCommand => text(render::UNKNOWN_COMMAND),
            FlowAction::ReplyMenuExpired => text(render::MENU_EXPIRED),
            FlowAction::ReplyStaleButton => text(render::STALE_BUTTON),
            FlowAction::ResetDraft => {
                session.reset_draft();
                None
            }
            FlowAction::ShowMenu(notice) => {
                let summary = self.cart.summarize(user_id).await?;
                Some(
                    Outbound::text(user_id, render::menu_text(&summary, currency, *notice))
                        .with_keyboard(render::category_keyboard(catalog)),
                )
            }
            FlowAction::ShowCategory(category) => Some(
                Outbound::text(user_id, render::category_text(*category))
                    .with_keyboard(render::item_keyboard(catalog, *category)),
            ),
            FlowAction::RememberSelection(code) => {
                session.pending_selection = Some(*code);
                None
            }
            FlowAction::PromptQuantity(code) => {
                let item = catalog.resolve(*code).map_err(DomainError::from)?;
                Some(Outbound::text(user_id, render::quantity_prompt(item, currency)))
            }
            FlowAction::AddToCart { code, quantity } => {
                self.cart.add_quantity(user_id, *code, *quantity).await?;
                session.pending_selection = None;
                None
            }
            FlowAction::ReportInvalidQuantity => text(render::INVALID_QUANTITY),
            FlowAction::PromptClearConfirmation => Some(
                Outbound::text(user_id, render::CONFIRM_CLEAR)
                    .with_keyboard(render::confirm_keyboard()),
            ),
            FlowAction::ClearCart => {
                self.cart.clear_cart(user_id).await?;
                None
            }
            FlowAction::ShowDeleteTargets => {
                let summary = self.cart.summarize(user_id).await?;
                Some(
                    Outbound::text(user_id, render::CHOOSE_DELETE_TARGET)
                        .with_keyboard(render::delete_keyboard(&summary, currency)),
                )
            }
            FlowAction::RemoveFromCart(code) => {
                self.cart.remove_item(user_id, *code).await?;
                None
            }
            FlowAction::PromptName => text(render::ASK_NAME),
            FlowAction::RecordName(name) => {
                session.draft.name = Some(name.clone());
                None
            }
            FlowAction::PromptAddress => text(render::ASK_ADDRESS),
            FlowAction::RecordAddress(address) => {
                session.draft.address = Some(address.clone());
                None
            }
            FlowAction::PromptPhone => text(render::ASK_PHONE),
            FlowAction::ReportInvalidPhone => text(render::INVALID_PHONE),
            FlowAction::SubmitOrder { phone } => {
                Some(self.submit_order(inbound, session, phone).await?)
            }
            FlowAction::PromptFeedback => text(render::ASK_FEEDBACK),
            FlowAction::SubmitFeedback(feedback) => {
                let notice =
                    render::feedback_notification(feedback, inbound.username.as_deref(), user_id);
                fan_out(self.messenger.as_ref(), &self.admins, &notice, &inbound.correlation_id)
                    .await;
                Some(
                    Outbound::text(user_id, render::FEEDBACK_ACCEPTED)
                        .with_keyboard(render::command_keyboard()),
                )
            }
            FlowAction::ReportInternalError(reason) => {
                error!(
                    event_name = "conversation.invariant_violated",
                    correlation_id = %inbound.correlation_id,
                    user_id = %user_id,
                    reason = %reason,
                    "internal invariant violated"
                );
                let violation = DomainError::InvariantViolation(reason.clone());
                let interface = ApplicationError::from(violation)
                    .into_interface(inbound.correlation_id.clone());
                Some(Outbound::text(user_id, interface.reply_text()))
            }
            FlowAction::ConfirmCancellation => Some(
                Outbound::text(user_id, render::CANCELLED)
                    .with_keyboard(render::command_keyboard()),
            ),
        };
        Ok(reply)
    }

    /// Notifies every admin, then clears the cart whatever the delivery outcome was.
    async fn submit_order(
        &self,
        inbound: &InboundEvent,
        session: &ConversationSession,
        phone: &str,
    ) -> Result<Outbound, ApplicationError> {
        let user_id = inbound.user_id;
        let missing = |field: &str| {
            let reason = format!("checkout reached the phone step without a {field}");
            DomainError::InvariantViolation(reason)
        };
        let name = session.draft.name.as_deref().ok_or_else(|| missing("name"))?;
        let address = session.draft.address.as_deref().ok_or_else(|| missing("address"))?;

        let summary = self.cart.summarize(user_id).await?;
        let reference = order_reference();
        let notice = render::order_notification(&OrderNotice {
            reference: &reference,
            placed_at: Utc::now(),
            name,
            address,
            phone,
            username: inbound.username.as_deref(),
            user_id,
            summary: &summary,
            currency: self.cart.catalog().currency(),
        });

        let report =
            fan_out(self.messenger.as_ref(), &self.admins, &notice, &inbound.correlation_id).await;

        let mut reply = format!("{}\nOrder reference: {reference}", render::ORDER_ACCEPTED);
        if let Err(clear_error) = self.cart.clear_cart(user_id).await {
            reply.push('\n');
            reply.push_str(render::CART_NOT_CLEARED);
            error!(
                event_name = "conversation.order.clear_failed",
                correlation_id = %inbound.correlation_id,
                user_id = %user_id,
                order_reference = %reference,
                error = %clear_error,
                "order was sent but the cart could not be cleared"
            );
        }

        info!(
            event_name = "conversation.order.submitted",
            correlation_id = %inbound.correlation_id,
            user_id = %user_id,
            order_reference = %reference,
            lines = summary.lines.len(),
            total = summary.total,
            admins_notified = report.delivered.len(),
            admins_failed = report.failed.len(),
            "order submitted"
        );

        Ok(Outbound::text(user_id, reply).with_keyboard(render::command_keyboard()))
    }

    async fn deliver(&self, message: Outbound, correlation_id: &str) {
        if let Err(delivery_error) = self.messenger.deliver(&message).await {
            warn!(
                event_name = "conversation.reply.delivery_failed",
                correlation_id = %correlation_id,
                user_id = %message.target,
                error = %delivery_error,
                "reply not delivered"
            );
        }
    }
}

fn order_reference() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("ORD-{}", id[..8].to_ascii_uppercase())
}
