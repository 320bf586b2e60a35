//! Scoped dispatch of completion events.
//!
//! A [`ScopeDispatcher`] observes the registry's completion stream and, for
//! events from stages in its configured scope, forwards a provenance-annotated
//! clone of the original input message. Success-scoped and error-scoped
//! dispatch share the mechanism and filter by outcome.

use crate::completion::{CompletionEvent, CompletionObserver, CompletionRegistry};
use crate::forward::Forwarder;
use crate::stage::StageId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Which outcomes a dispatcher forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Forward only success outcomes.
    #[default]
    Success,
    /// Forward only error outcomes, with detail attached.
    Error,
}

/// Configuration for a scope dispatcher, loadable from flow JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Display name, used in logs.
    #[serde(default)]
    pub name: String,

    /// The stage ids the dispatcher watches. Absent or empty means inert.
    #[serde(default)]
    pub scope: Vec<StageId>,

    /// The outcome filter.
    #[serde(default)]
    pub mode: DispatchMode,
}

impl DispatcherConfig {
    /// Creates a configuration with an empty (inert) scope.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Vec::new(),
            mode: DispatchMode::default(),
        }
    }

    /// Sets the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl IntoIterator<Item = impl Into<StageId>>) -> Self {
        self.scope = scope.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the outcome filter.
    #[must_use]
    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Parses a configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid configuration JSON.
    pub fn from_json(json: &str) -> Result<Self, crate::errors::FlowtrackError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Observes completion events and forwards annotated clones of the
/// originating messages for in-scope stages.
///
/// Scope membership is fixed for the dispatcher's lifetime; changing it means
/// building and subscribing a new dispatcher.
pub struct ScopeDispatcher {
    name: String,
    scope: HashSet<StageId>,
    mode: DispatchMode,
    forwarder: Arc<dyn Forwarder>,
}

impl ScopeDispatcher {
    /// Builds a dispatcher and subscribes it to the registry's completion
    /// stream.
    #[must_use]
    pub fn subscribe(
        config: DispatcherConfig,
        registry: &CompletionRegistry,
        forwarder: Arc<dyn Forwarder>,
    ) -> Arc<Self> {
        let dispatcher = Arc::new(Self {
            name: config.name,
            scope: config.scope.into_iter().collect(),
            mode: config.mode,
            forwarder,
        });
        registry.subscribe(Arc::clone(&dispatcher) as Arc<dyn CompletionObserver>);
        dispatcher
    }

    /// Returns the dispatcher's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the given stage id is in scope.
    #[must_use]
    pub fn watches(&self, stage: &StageId) -> bool {
        self.scope.contains(stage)
    }
}

impl CompletionObserver for ScopeDispatcher {
    fn on_completion(&self, event: &CompletionEvent) {
        if !self.scope.contains(&event.source.id) {
            return;
        }
        match self.mode {
            DispatchMode::Success if event.outcome.is_error() => return,
            DispatchMode::Error if event.outcome.is_success() => return,
            _ => {}
        }

        let mut message = event.message.clone();
        message.set(
            "source",
            serde_json::json!({
                "id": event.source.id,
                "name": event.source.name,
                "type": event.source.kind,
            }),
        );
        if let Some(detail) = event.outcome.detail() {
            message.set("error", serde_json::json!({ "message": detail }));
        }

        debug!(
            dispatcher = %self.name,
            stage = %event.source.id,
            message = %event.message_id(),
            "forwarding completion observation"
        );
        self.forwarder.forward(message, 0);
    }
}

impl std::fmt::Debug for ScopeDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeDispatcher")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("mode", &self.mode)
            .finish()
    }
}
