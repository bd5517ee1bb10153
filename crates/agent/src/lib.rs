//! Conversational layer of the brewline service.
//!
//! This crate turns one dialog turn into one reply through a fixed
//! pipeline of specialized responders:
//!
//! 1. **Gate** (`guard`) - safety verdict over the dialog; a veto ends the
//!    request immediately.
//! 2. **Route** (`router`) - classify the turn into one of the configured
//!    responder keys.
//! 3. **Dispatch** (`pipeline`) - invoke the responder bound to the key
//!    and return its reply verbatim.
//!
//! # Key Types
//!
//! - `Responder` - the polymorphic seam every variant implements; the sole
//!   extension point for new responder keys (see `responder` module)
//! - `AgentPipeline` / `DispatchTable` - the request/response cycle
//! - `StructuredClassifier` - bounded-context structured classification,
//!   shared by the gate, the router, and the recommendation intent step
//!
//! # Safety Principle
//!
//! The LLM is strictly a translator and phrasebook. It never decides what
//! gets recommended: ranking is deterministic and lives in
//! `brewline-core::recommend`, and an empty ranking is answered with a
//! fixed apology without asking the model to improvise.

pub mod classify;
pub mod details;
pub mod error;
pub mod guard;
pub mod llm;
pub mod order;
pub mod pipeline;
pub mod recommendation;
pub mod responder;
pub mod router;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::AgentError;
pub use pipeline::{standard_pipeline, AgentPipeline, DispatchTable};
pub use responder::{DialogMessage, Memory, Responder, ResponderReply, Role};
