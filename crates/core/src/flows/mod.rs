pub mod engine;
pub mod input;
pub mod render;
pub mod runtime;
pub mod session;
pub mod states;

pub use engine::{is_phone_number, FlowDefinition, FlowEngine, OrderingFlow};
pub use input::{classify, EventKind, InboundEvent};
pub use runtime::ConversationRuntime;
pub use session::{CheckoutDraft, ConversationSession, SessionRegistry};
pub use states::{
    ConversationState, EntryCommand, FlowAction, FlowContext, FlowEvent, MenuNotice,
    TransitionOutcome,
};
