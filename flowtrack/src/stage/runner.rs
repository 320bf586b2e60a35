//! Stage runner: the completion adapter.

use super::{StageEmitter, StageHandler, StageIdentity};
use crate::completion::{CompletionHandle, CompletionOutcome, CompletionRegistry};
use crate::forward::Forwarder;
use crate::message::Message;
use std::sync::Arc;
use tracing::debug;

/// Wraps a stage's handler so the registry observes a uniform begin/end pair
/// per input message, whichever completion style the stage author used.
///
/// For the implicit style the runner ends the unit with a success outcome
/// immediately after the handler returns; for the explicit style the unit
/// ends whenever the handler consumes its [`CompletionHandle`], which may be
/// long after `receive` has returned control to the loop.
pub struct StageRunner {
    identity: StageIdentity,
    handler: StageHandler,
    registry: Arc<CompletionRegistry>,
    forwarder: Arc<dyn Forwarder>,
}

impl StageRunner {
    /// Creates a runner for one stage instance.
    #[must_use]
    pub fn new(
        identity: StageIdentity,
        handler: StageHandler,
        registry: Arc<CompletionRegistry>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        Self {
            identity,
            handler,
            registry,
            forwarder,
        }
    }

    /// Returns the stage's identity.
    #[must_use]
    pub fn identity(&self) -> &StageIdentity {
        &self.identity
    }

    /// Processes one inbound message.
    ///
    /// Each receipt is tracked as its own unit of work, even when the same
    /// identifier arrives more than once; receipts are never deduplicated by
    /// identifier.
    pub async fn receive(&self, message: Message) {
        debug!(
            stage = %self.identity.id,
            message = %message.id(),
            "stage received message"
        );
        self.registry.begin(&self.identity, &message);

        match &self.handler {
            StageHandler::Implicit(handler) => {
                let outputs = handler.handle(&message);
                for output in outputs {
                    self.forwarder.forward(output, 0);
                }
                self.registry
                    .end(&self.identity.id, message.id(), CompletionOutcome::Success);
            }
            StageHandler::Explicit(handler) => {
                let emitter = StageEmitter::new(Arc::clone(&self.forwarder));
                let done = CompletionHandle::new(
                    Arc::clone(&self.registry),
                    self.identity.id.clone(),
                    message.id().clone(),
                );
                handler.handle(message, emitter, done).await;
            }
        }
    }
}

impl std::fmt::Debug for StageRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRunner")
            .field("identity", &self.identity)
            .field("handler", &self.handler)
            .finish()
    }
}
