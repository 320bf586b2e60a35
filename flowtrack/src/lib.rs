//! # Flowtrack
//!
//! Completion tracking and scoped dispatch for message-flow pipelines.
//!
//! Flowtrack answers one question: has this stage finished handling this
//! message? It unifies two completion-signaling conventions into a single
//! observable event stream:
//!
//! - **Implicit style**: a handler's return completes the input
//! - **Explicit style**: the handler consumes a single-shot completion
//!   handle whenever it is actually done, decoupled from emission timing
//!
//! Either way the outstanding-work registry counts units per (stage, message
//! identifier) pair and raises exactly one completion event when a pair's
//! counter returns to zero. Scope dispatchers observe that stream and forward
//! provenance-annotated clones of the originating messages.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowtrack::prelude::*;
//!
//! let flow = Flow::new("main");
//! let observed = Arc::new(CollectingForwarder::new());
//! flow.add_dispatcher(
//!     DispatcherConfig::new("success").with_scope(["func-id"]),
//!     observed.clone(),
//! );
//! let func = flow.add_stage(
//!     StageIdentity::new("func-id", "func", "function"),
//!     StageHandler::implicit_fn(|msg| vec![msg.clone()]),
//!     Arc::new(NoOpForwarder),
//! )?;
//! func.receive(Message::new().with_payload("foo")).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod completion;
pub mod dispatch;
pub mod errors;
pub mod flow;
pub mod forward;
pub mod message;
pub mod stage;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::completion::{
        CompletionEvent, CompletionHandle, CompletionObserver, CompletionOutcome,
        CompletionRegistry,
    };
    pub use crate::dispatch::{DispatchMode, DispatcherConfig, ScopeDispatcher};
    pub use crate::errors::{FlowValidationError, FlowtrackError};
    pub use crate::flow::Flow;
    pub use crate::forward::{
        ChannelForwarder, CollectingForwarder, Forwarder, NoOpForwarder,
    };
    pub use crate::message::{Message, MessageId};
    pub use crate::stage::{
        ExplicitHandler, ImplicitHandler, StageEmitter, StageHandler, StageId, StageIdentity,
        StageRunner,
    };
    pub use crate::utils::iso_timestamp;
}
