//! Pluggable LLM provider trait (component E, Model Dispatcher transport
//! layer).
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/
//! [`ChatResponse`] into provider-specific SDK calls, keeping every Agent
//! Unit decoupled from any particular LLM vendor. [`super::dispatcher::ModelDispatcher`]
//! is the only caller that should hold one of these directly; agents go
//! through the dispatcher so tier routing, the per-mission semaphore, and
//! usage accounting stay centralized.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use super::message::{ChatRequest, ChatResponse};
use crate::error::AgentError;

/// Trait for LLM provider backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g. `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures, timeouts, or parse errors.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;

    /// Executes a streaming chat completion request, yielding text deltas
    /// as they arrive.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on connection or streaming failures.
    async fn chat_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<String, AgentError>> + Send>>, AgentError>;
}
