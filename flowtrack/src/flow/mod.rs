//! Flow instantiation context.
//!
//! A [`Flow`] owns the shared [`CompletionRegistry`] and hands it to the
//! stages and dispatchers built inside it, binding the registry's lifecycle
//! to the flow's. There is deliberately no global registry.

mod scenario_tests;

use crate::completion::CompletionRegistry;
use crate::dispatch::{DispatcherConfig, ScopeDispatcher};
use crate::errors::FlowValidationError;
use crate::forward::Forwarder;
use crate::stage::{StageHandler, StageId, StageIdentity, StageRunner};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// A pipeline instantiation context.
#[derive(Debug)]
pub struct Flow {
    name: String,
    registry: Arc<CompletionRegistry>,
    stages: DashMap<StageId, Arc<StageRunner>>,
}

impl Flow {
    /// Creates an empty flow.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: Arc::new(CompletionRegistry::new()),
            stages: DashMap::new(),
        }
    }

    /// Returns the flow's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the flow's completion registry.
    #[must_use]
    pub fn registry(&self) -> Arc<CompletionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Registers a stage and returns its runner.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage id is empty or already registered.
    pub fn add_stage(
        &self,
        identity: StageIdentity,
        handler: StageHandler,
        forwarder: Arc<dyn Forwarder>,
    ) -> Result<Arc<StageRunner>, FlowValidationError> {
        if identity.id.as_str().trim().is_empty() {
            return Err(FlowValidationError::new("Stage id cannot be empty"));
        }
        if self.stages.contains_key(&identity.id) {
            return Err(FlowValidationError::new(format!(
                "Duplicate stage id '{}'",
                identity.id
            ))
            .with_stages(vec![identity.id.to_string()]));
        }

        debug!(flow = %self.name, stage = %identity.id, kind = %identity.kind, "stage registered");
        let runner = Arc::new(StageRunner::new(
            identity.clone(),
            handler,
            self.registry(),
            forwarder,
        ));
        self.stages.insert(identity.id, Arc::clone(&runner));
        Ok(runner)
    }

    /// Builds a scope dispatcher subscribed to this flow's registry.
    #[must_use]
    pub fn add_dispatcher(
        &self,
        config: DispatcherConfig,
        forwarder: Arc<dyn Forwarder>,
    ) -> Arc<ScopeDispatcher> {
        ScopeDispatcher::subscribe(config, &self.registry, forwarder)
    }

    /// Looks up a registered stage by id.
    #[must_use]
    pub fn get_stage(&self, id: &StageId) -> Option<Arc<StageRunner>> {
        self.stages.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the number of registered stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}
