//! Single-shot completion handle for the explicit stage style.

use super::registry::CompletionRegistry;
use super::CompletionOutcome;
use crate::message::MessageId;
use crate::stage::StageId;
use std::sync::Arc;
use tracing::warn;

/// A capability to signal that one unit of work has finished.
///
/// Handles are consumed by value, so signaling completion twice for the same
/// unit is unrepresentable. Dropping a handle without consuming it logs a
/// warning and leaves the unit open forever; the registry never times out or
/// force-closes a unit on the stage author's behalf.
pub struct CompletionHandle {
    registry: Arc<CompletionRegistry>,
    stage: StageId,
    message: MessageId,
    consumed: bool,
}

impl CompletionHandle {
    pub(crate) fn new(
        registry: Arc<CompletionRegistry>,
        stage: StageId,
        message: MessageId,
    ) -> Self {
        Self {
            registry,
            stage,
            message,
            consumed: false,
        }
    }

    /// Adds one more unit of work to the open cycle and returns a handle
    /// for it.
    ///
    /// The cycle's completion event fires only after every forked unit (and
    /// this one) has ended.
    #[must_use]
    pub fn fork(&self) -> Self {
        self.registry.add_unit(&self.stage, &self.message);
        Self {
            registry: Arc::clone(&self.registry),
            stage: self.stage.clone(),
            message: self.message.clone(),
            consumed: false,
        }
    }

    /// Signals that this unit finished without error.
    pub fn done(mut self) {
        self.consumed = true;
        self.registry
            .end(&self.stage, &self.message, CompletionOutcome::Success);
    }

    /// Signals that this unit finished with an error.
    pub fn error(mut self, detail: impl Into<String>) {
        self.consumed = true;
        self.registry
            .end(&self.stage, &self.message, CompletionOutcome::error(detail));
    }
}

impl std::fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("stage", &self.stage)
            .field("message", &self.message)
            .field("consumed", &self.consumed)
            .finish()
    }
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        if !self.consumed {
            warn!(
                stage = %self.stage,
                message = %self.message,
                "completion handle dropped without being consumed; unit stays open"
            );
        }
    }
}
