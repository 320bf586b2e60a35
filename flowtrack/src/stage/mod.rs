//! Stage identity, handler styles, and the output emitter.
//!
//! A stage's business logic is opaque to this core. The only contract is an
//! identity for attribution, a way to emit derived messages, and a way to
//! signal completion: either implicitly (the handler's return completes the
//! input) or explicitly (the handler consumes a [`CompletionHandle`] whenever
//! it is actually done, decoupled from emission timing). The style is chosen
//! once at registration through the [`StageHandler`] variant, never inspected
//! per message.

mod runner;

pub use runner::StageRunner;

use crate::completion::CompletionHandle;
use crate::forward::Forwarder;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Newtype stage identifier, unique within a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageId(String);

impl StageId {
    /// Creates a stage identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for StageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A stage's identity, used purely for attribution.
///
/// Immutable once the pipeline is instantiated. The kind is a free-form type
/// tag (e.g. `"function"`, `"delay"`), not a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageIdentity {
    /// Unique id within the pipeline.
    pub id: StageId,
    /// Human-readable display name.
    pub name: String,
    /// The kind/type tag.
    #[serde(rename = "type")]
    pub kind: String,
}

impl StageIdentity {
    /// Creates a new stage identity.
    #[must_use]
    pub fn new(id: impl Into<StageId>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// Handler for the implicit completion style.
///
/// The return is both the output and the completion signal: returning from
/// `handle` means "I am done with this input now", synchronously, with a
/// success outcome.
pub trait ImplicitHandler: Send + Sync {
    /// Processes one input message and returns zero or more derived messages.
    fn handle(&self, message: &Message) -> Vec<Message>;
}

/// Handler for the explicit completion style.
///
/// The handler may emit derived messages at any time through the emitter,
/// before or after consuming `done`; completion is signaled only by consuming
/// the handle, never by emission or by returning.
#[async_trait]
pub trait ExplicitHandler: Send + Sync {
    /// Processes one input message.
    async fn handle(&self, message: Message, emitter: StageEmitter, done: CompletionHandle);
}

/// The completion style of a stage, resolved once at registration.
#[derive(Clone)]
pub enum StageHandler {
    /// Completion signaled by the handler's return.
    Implicit(Arc<dyn ImplicitHandler>),
    /// Completion signaled by consuming the provided handle.
    Explicit(Arc<dyn ExplicitHandler>),
}

impl StageHandler {
    /// Wraps an implicit-style handler.
    pub fn implicit(handler: impl ImplicitHandler + 'static) -> Self {
        Self::Implicit(Arc::new(handler))
    }

    /// Wraps an explicit-style handler.
    pub fn explicit(handler: impl ExplicitHandler + 'static) -> Self {
        Self::Explicit(Arc::new(handler))
    }

    /// Wraps a plain function as an implicit-style handler.
    pub fn implicit_fn<F>(func: F) -> Self
    where
        F: Fn(&Message) -> Vec<Message> + Send + Sync + 'static,
    {
        Self::Implicit(Arc::new(ImplicitFnHandler::new(func)))
    }

    /// Wraps an async function as an explicit-style handler.
    pub fn explicit_fn<F, Fut>(func: F) -> Self
    where
        F: Fn(Message, StageEmitter, CompletionHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::Explicit(Arc::new(ExplicitFnHandler::new(func)))
    }

    /// Returns true for the implicit style.
    #[must_use]
    pub fn is_implicit(&self) -> bool {
        matches!(self, Self::Implicit(_))
    }

    /// Returns true for the explicit style.
    #[must_use]
    pub fn is_explicit(&self) -> bool {
        matches!(self, Self::Explicit(_))
    }
}

impl fmt::Debug for StageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Implicit(_) => f.write_str("StageHandler::Implicit"),
            Self::Explicit(_) => f.write_str("StageHandler::Explicit"),
        }
    }
}

/// A simple function-based implicit handler.
pub struct ImplicitFnHandler<F>
where
    F: Fn(&Message) -> Vec<Message> + Send + Sync,
{
    func: F,
}

impl<F> ImplicitFnHandler<F>
where
    F: Fn(&Message) -> Vec<Message> + Send + Sync,
{
    /// Creates a new function-based implicit handler.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> ImplicitHandler for ImplicitFnHandler<F>
where
    F: Fn(&Message) -> Vec<Message> + Send + Sync,
{
    fn handle(&self, message: &Message) -> Vec<Message> {
        (self.func)(message)
    }
}

/// An async function-based explicit handler.
pub struct ExplicitFnHandler<F, Fut>
where
    F: Fn(Message, StageEmitter, CompletionHandle) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    func: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> ExplicitFnHandler<F, Fut>
where
    F: Fn(Message, StageEmitter, CompletionHandle) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    /// Creates a new function-based explicit handler.
    pub fn new(func: F) -> Self {
        Self {
            func,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> ExplicitHandler for ExplicitFnHandler<F, Fut>
where
    F: Fn(Message, StageEmitter, CompletionHandle) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn handle(&self, message: Message, emitter: StageEmitter, done: CompletionHandle) {
        (self.func)(message, emitter, done).await;
    }
}

/// A cheaply cloneable capability for emitting a stage's derived messages.
///
/// Explicit-style handlers may move a clone into spawned tasks and keep
/// emitting after returning control to the loop.
#[derive(Clone)]
pub struct StageEmitter {
    forwarder: Arc<dyn Forwarder>,
}

impl StageEmitter {
    pub(crate) fn new(forwarder: Arc<dyn Forwarder>) -> Self {
        Self { forwarder }
    }

    /// Emits a derived message on output port 0.
    pub fn send(&self, message: Message) {
        self.forwarder.forward(message, 0);
    }

    /// Emits a derived message on a specific output port.
    pub fn send_to(&self, port: usize, message: Message) {
        self.forwarder.forward(message, port);
    }
}

impl fmt::Debug for StageEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StageEmitter")
    }
}
