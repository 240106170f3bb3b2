//! The provider-polymorphic agent turn loop.
//!
//! One `evaluate` call drives the model until it stops, runs out of turns,
//! errors, or parks on a tool call that needs user approval. Every completed
//! turn is appended to the session log before anything else happens with it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use vo_channels::Channel;
use vo_core::{AgentToolCall, Message, PendingToolCall, StopReason};
use vo_memory::MemoryStore;
use vo_sessions::{SessionEntry, SessionStore};
use vo_tools::{parse_arguments, ApprovalCache, ApprovalDecision, ToolContext, ToolRegistry};

use crate::error::{AgentError, Result};
use crate::guard::{is_direct_ping, is_silence_token};
use crate::prompt::{build_system_prompt, memory_query, AgentSpec, PromptSections};
use crate::provider::{stream_with_retry, AgentProvider, InputGuardrail, ProviderRequest};
use crate::stream::{StreamEvent, TurnAccumulator};

/// Upper bound on model turns per evaluation, against runaway tool loops.
const MAX_TURNS: usize = 25;

/// What the user sees when the input guardrail rejects a turn.
const REFUSAL_MESSAGE: &str = "I can't help with that request.";

/// The caller's input for one evaluation.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub content: TurnContent,
    /// Extra prompt section appended last (scheduled-trigger evaluations).
    pub trigger_prompt: Option<String>,
    /// Platform-detected direct ping.
    pub mentioned: bool,
    pub user_id: Option<String>,
    pub post_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum TurnContent {
    /// A new user turn.
    Text(String),
    /// Continuation after externally executed tool calls.
    ToolResults(Vec<Message>),
}

impl TurnInput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: TurnContent::Text(content.into()),
            trigger_prompt: None,
            mentioned: false,
            user_id: None,
            post_id: None,
        }
    }

    pub fn tool_results(results: Vec<Message>) -> Self {
        Self {
            content: TurnContent::ToolResults(results),
            trigger_prompt: None,
            mentioned: false,
            user_id: None,
            post_id: None,
        }
    }
}

/// How an evaluation ended.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    Completed {
        text: String,
        stop_reason: StopReason,
    },
    /// The model requested tools that need a user decision; the calls are
    /// persisted on the session and the loop returned early.
    AwaitingApproval { pending: Vec<PendingToolCall> },
    /// The input guardrail rejected the turn.
    Refused,
}

/// The assembled agent: provider, tools, stores, and policy.
///
/// Shared across handler tasks via `Arc`; everything inside is thread-safe.
pub struct Agent {
    spec: AgentSpec,
    provider: Arc<dyn AgentProvider>,
    model: String,
    api_key: String,
    tools: Arc<ToolRegistry>,
    approvals: Arc<ApprovalCache>,
    sessions: Arc<SessionStore>,
    memory: Arc<MemoryStore>,
    guardrail: Option<Arc<dyn InputGuardrail>>,
    memory_context_limit: usize,
}

impl Agent {
    pub fn new(
        spec: AgentSpec,
        provider: Arc<dyn AgentProvider>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        tools: Arc<ToolRegistry>,
        sessions: Arc<SessionStore>,
        memory: Arc<MemoryStore>,
    ) -> Self {
        Self {
            spec,
            provider,
            model: model.into(),
            api_key: api_key.into(),
            tools,
            approvals: Arc::new(ApprovalCache::new()),
            sessions,
            memory,
            guardrail: None,
            memory_context_limit: vo_core::config::DEFAULT_MEMORY_CONTEXT_LIMIT,
        }
    }

    pub fn with_guardrail(mut self, guardrail: Arc<dyn InputGuardrail>) -> Self {
        self.guardrail = Some(guardrail);
        self
    }

    pub fn with_memory_context_limit(mut self, limit: usize) -> Self {
        self.memory_context_limit = limit;
        self
    }

    /// The in-flight approval cache; surfaces record user decisions here
    /// before calling [`resolve_pending`](Agent::resolve_pending).
    pub fn approvals(&self) -> Arc<ApprovalCache> {
        Arc::clone(&self.approvals)
    }

    /// Run the turn loop for one input.
    #[instrument(skip(self, input, channel), fields(session = %session_id, channel_id = %channel.id()))]
    pub async fn evaluate(
        &self,
        input: TurnInput,
        session_id: &str,
        channel: Arc<dyn Channel>,
    ) -> Result<TurnOutcome> {
        let mut state = self.sessions.load(session_id)?;
        let is_group = channel.is_group();
        let channel_id = channel.id();

        let original_text = match &input.content {
            TurnContent::Text(t) => t.clone(),
            TurnContent::ToolResults(_) => String::new(),
        };

        // Preamble: a plain user turn over pending approvals rejects them
        // all, so no tool_use is ever left without a matching result.
        let mut turn_messages: Vec<Message> = Vec::new();
        if !state.pending_tool_calls.is_empty() {
            if matches!(input.content, TurnContent::Text(_)) {
                info!(
                    count = state.pending_tool_calls.len(),
                    "plain input over pending approvals, auto-rejecting"
                );
                for pending in &state.pending_tool_calls {
                    turn_messages.push(Message::rejected_tool_result(&pending.call_id));
                }
            }
            state.pending_tool_calls.clear();
        }
        match input.content.clone() {
            TurnContent::Text(text) => turn_messages.push(Message::user(text)),
            TurnContent::ToolResults(results) => turn_messages.extend(results),
        }

        // Guardrail races the stream; tripping it closes the stream early.
        // The verdict is awaited before the first turn finalises, so a slow
        // guardrail can never be outrun by a fast stream.
        let cancel = CancellationToken::new();
        let mut guardrail_verdict: Option<tokio::task::JoinHandle<bool>> = None;
        if let Some(guardrail) = &self.guardrail {
            if !original_text.is_empty() {
                let guardrail = Arc::clone(guardrail);
                let text = original_text.clone();
                let cancel = cancel.clone();
                guardrail_verdict = Some(tokio::spawn(async move {
                    let allowed = guardrail.allow(&text).await;
                    if !allowed {
                        cancel.cancel();
                    }
                    allowed
                }));
            }
        }

        // One-shot: present only on the first turn after a session rotation.
        let bridge_context = self.sessions.take_bridge_context(session_id)?;

        let mut final_text = String::new();
        let mut final_stop = StopReason::Stop;

        for turn_index in 0..MAX_TURNS {
            debug!(turn_index, "agent turn");

            let memories = self.relevant_memories(&state, &turn_messages, &channel);
            let sections = PromptSections {
                memories,
                is_group,
                bridge_context: bridge_context.clone(),
                trigger_prompt: input.trigger_prompt.clone(),
            };
            let system = build_system_prompt(&self.spec, &sections);

            let mut messages = state.messages.clone();
            messages.extend(turn_messages.iter().cloned());

            let request = ProviderRequest {
                model: self.model.clone(),
                system,
                messages,
                tools: self.tools.definitions(),
                max_tokens: 4096,
                api_key: self.api_key.clone(),
            };

            let (tx, mut rx) = mpsc::channel::<StreamEvent>(64);
            let provider = Arc::clone(&self.provider);
            let driver =
                tokio::spawn(async move { stream_with_retry(provider.as_ref(), &request, tx).await });

            let mut acc = TurnAccumulator::new();
            let mut streaming_started = false;
            let mut guard_tripped = false;
            loop {
                tokio::select! {
                    maybe_event = rx.recv() => {
                        let Some(event) = maybe_event else { break };
                        if let StreamEvent::TextDelta { text } = &event {
                            // Live deltas for 1:1 channels only; group output
                            // waits for the guard after the turn.
                            if !is_group {
                                if !streaming_started {
                                    streaming_started = true;
                                    if let Err(e) = channel.start_streaming().await {
                                        warn!(channel = %channel_id, "start_streaming failed: {e}");
                                    }
                                }
                                if let Err(e) = channel.append_to_stream(text).await {
                                    warn!(channel = %channel_id, "append_to_stream failed: {e}");
                                }
                            }
                        }
                        acc.push(&event);
                    }
                    _ = cancel.cancelled() => {
                        guard_tripped = true;
                        break;
                    }
                }
            }
            drop(rx);
            let drive_result = driver
                .await
                .map_err(|e| AgentError::Delivery(format!("stream driver panicked: {e}")))?;

            if streaming_started {
                if let Err(e) = channel.finish_streaming().await {
                    warn!(channel = %channel_id, "finish_streaming failed: {e}");
                }
            }

            if let Some(handle) = guardrail_verdict.take() {
                if !handle.await.unwrap_or(true) {
                    guard_tripped = true;
                }
            }
            if guard_tripped {
                warn!(session = %session_id, "input guardrail rejected the turn");
                if let Err(e) = channel.send_message(REFUSAL_MESSAGE).await {
                    warn!(channel = %channel_id, "refusal delivery failed: {e}");
                }
                return Ok(TurnOutcome::Refused);
            }

            if let Err(e) = drive_result {
                // A failed stream with partial output still becomes a turn;
                // with no output at all there is nothing to persist.
                if acc.text.is_empty() && acc.tool_calls().is_empty() {
                    return Err(e.into());
                }
                acc.push(&StreamEvent::Error {
                    message: e.to_string(),
                });
            }

            let calls = acc.tool_calls();
            let stop_reason = acc.final_stop_reason();
            let assistant = Message::Assistant {
                content: acc.text.clone(),
                tool_calls: calls.clone(),
                response_id: acc.response_id.clone(),
            };

            // Any requires-approval call parks the whole batch: results must
            // eventually align one-to-one with the calls.
            let gated = calls.iter().any(|call| {
                self.tools
                    .get(&call.name)
                    .map(|t| t.requires_approval())
                    .unwrap_or(false)
            });

            let mut entry_messages = turn_messages.clone();
            entry_messages.push(assistant);
            let mut entry = SessionEntry::turn(session_id, entry_messages);
            entry.usage = acc.usage;
            entry.user_id = input.user_id.clone();
            entry.post_id = input.post_id.clone();
            if gated {
                entry.pending_tool_calls = calls.iter().map(PendingToolCall::from).collect();
            }
            self.sessions.append_entry(&entry)?;
            state.apply(&entry);

            if gated {
                info!(
                    count = entry.pending_tool_calls.len(),
                    "turn parked awaiting tool approval"
                );
                return Ok(TurnOutcome::AwaitingApproval {
                    pending: entry.pending_tool_calls,
                });
            }

            final_text = acc.text.clone();
            final_stop = stop_reason;

            if calls.is_empty() || stop_reason == StopReason::Error {
                break;
            }

            // Execute sequentially in declared order; result indexes align.
            let ctx = ToolContext {
                channel_id: Some(channel_id.clone()),
                channel_is_private: channel.is_private(),
                user_id: input.user_id.clone(),
                post_id: input.post_id.clone(),
            };
            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                results.push(self.execute_call(call, &ctx).await);
            }
            turn_messages = results;

            if turn_index + 1 == MAX_TURNS {
                warn!(max_turns = MAX_TURNS, "turn loop hit maximum turns");
            }
        }

        self.deliver(&channel, is_group, &original_text, input.mentioned, &final_text)
            .await;

        Ok(TurnOutcome::Completed {
            text: final_text,
            stop_reason: final_stop,
        })
    }

    /// Continue a session parked on approvals, consuming recorded decisions.
    ///
    /// Approved calls execute now; rejected or undecided calls feed the
    /// fixed rejection back to the model. The loop then resumes with the
    /// assembled tool results.
    pub async fn resolve_pending(
        &self,
        session_id: &str,
        channel: Arc<dyn Channel>,
    ) -> Result<TurnOutcome> {
        let state = self.sessions.load(session_id)?;
        if state.pending_tool_calls.is_empty() {
            return Ok(TurnOutcome::Completed {
                text: String::new(),
                stop_reason: StopReason::Stop,
            });
        }

        let ctx = ToolContext {
            channel_id: Some(channel.id()),
            channel_is_private: channel.is_private(),
            user_id: None,
            post_id: None,
        };
        let mut results = Vec::with_capacity(state.pending_tool_calls.len());
        for pending in &state.pending_tool_calls {
            match self.approvals.take(&pending.call_id) {
                Some(ApprovalDecision::Approved) => {
                    let call = AgentToolCall {
                        call_id: pending.call_id.clone(),
                        name: pending.name.clone(),
                        arguments: pending.arguments.clone(),
                    };
                    results.push(self.execute_call(&call, &ctx).await);
                }
                Some(ApprovalDecision::Rejected { reason }) => {
                    results.push(Message::tool_result(&pending.call_id, reason, true));
                }
                None => {
                    results.push(Message::rejected_tool_result(&pending.call_id));
                }
            }
        }

        self.evaluate(TurnInput::tool_results(results), session_id, channel)
            .await
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Relevance middleware: recent user text against the memory store,
    /// scoped to the calling channel. Failures degrade to no memories.
    fn relevant_memories(
        &self,
        state: &vo_sessions::AgentState,
        turn_messages: &[Message],
        channel: &Arc<dyn Channel>,
    ) -> Vec<(vo_memory::MemoryEntry, f64)> {
        let mut user_texts: Vec<&str> = state
            .messages
            .iter()
            .filter(|m| m.is_user())
            .map(Message::text)
            .collect();
        user_texts.extend(
            turn_messages
                .iter()
                .filter(|m| m.is_user())
                .map(Message::text),
        );
        let query = memory_query(&user_texts);
        if query.is_empty() {
            return Vec::new();
        }

        let channel_id = channel.id();
        match self.memory.search(
            &query,
            Some(&channel_id),
            channel.is_private(),
            self.memory_context_limit,
        ) {
            Ok(hits) => hits,
            Err(e) => {
                debug!("memory retrieval failed: {e}");
                Vec::new()
            }
        }
    }

    /// Run one tool call. Every failure mode folds into an error result the
    /// model can react to.
    async fn execute_call(&self, call: &AgentToolCall, ctx: &ToolContext) -> Message {
        let Some(tool) = self.tools.get(&call.name) else {
            return Message::tool_result(
                &call.call_id,
                format!("unknown tool: {}", call.name),
                true,
            );
        };

        let args = match parse_arguments(&tool.parameter_schema(), &call.arguments) {
            Ok(args) => args,
            Err(e) => return Message::tool_result(&call.call_id, e.to_string(), true),
        };

        debug!(tool = %call.name, "executing tool");
        let result = tool.invoke(args, ctx).await;
        Message::tool_result(&call.call_id, result.output, result.is_error)
    }

    /// Group-chat output guard; direct channels already streamed.
    async fn deliver(
        &self,
        channel: &Arc<dyn Channel>,
        is_group: bool,
        original_text: &str,
        mentioned: bool,
        response: &str,
    ) {
        if !is_group || response.is_empty() {
            return;
        }

        if is_direct_ping(original_text, &self.spec.bot_name, mentioned) {
            if let Err(e) = channel.send_message(response).await {
                warn!(channel = %channel.id(), "group delivery failed: {e}");
            }
            return;
        }

        if is_silence_token(response) {
            info!(channel = %channel.id(), "silence token, staying quiet");
            return;
        }

        if let Err(e) = channel.send_message(response).await {
            warn!(channel = %channel.id(), "group delivery failed: {e}");
        }
    }
}
