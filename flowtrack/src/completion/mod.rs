//! Completion outcomes, events, and the outstanding-work registry.
//!
//! This module is the heart of the core: it turns "a stage finished a unit of
//! work" into a single observable event stream, regardless of how the stage
//! signaled completion.

mod handle;
mod registry;

pub use handle::CompletionHandle;
pub use registry::CompletionRegistry;

use crate::message::{Message, MessageId};
use crate::stage::StageIdentity;
use serde::{Deserialize, Serialize};

/// The terminal outcome of a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// The stage finished handling the input without reporting an error.
    Success,
    /// The stage reported an error while handling the input.
    Error(String),
}

impl CompletionOutcome {
    /// Creates an error outcome with the given detail.
    #[must_use]
    pub fn error(detail: impl Into<String>) -> Self {
        Self::Error(detail.into())
    }

    /// Returns true if the outcome is success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the outcome is an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns the error detail, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Error(detail) => Some(detail),
        }
    }
}

/// The terminal, attributed signal that a stage finished handling a unit of
/// work for a specific message.
///
/// Events are transient: they exist only for the duration of dispatch to
/// observers and are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionEvent {
    /// The identity of the stage the work belonged to.
    pub source: StageIdentity,

    /// A clone of the input message that opened the cycle.
    pub message: Message,

    /// The terminal outcome.
    pub outcome: CompletionOutcome,

    /// When the counter reached zero (ISO 8601).
    pub occurred_at: String,
}

impl CompletionEvent {
    /// Creates a new completion event, timestamped now.
    #[must_use]
    pub fn new(source: StageIdentity, message: Message, outcome: CompletionOutcome) -> Self {
        Self {
            source,
            message,
            outcome,
            occurred_at: crate::utils::iso_timestamp(),
        }
    }

    /// Returns the identifier of the message the event is about.
    #[must_use]
    pub fn message_id(&self) -> &MessageId {
        self.message.id()
    }
}

/// Trait for observers of completion events.
///
/// Observers are dispatched synchronously, in subscription order, within the
/// same turn as the counter reaching zero. An observer may re-enter the
/// registry (e.g., begin new work) from its callback.
pub trait CompletionObserver: Send + Sync {
    /// Called once per completion event.
    fn on_completion(&self, event: &CompletionEvent);
}
