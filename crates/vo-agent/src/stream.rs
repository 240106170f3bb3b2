use std::collections::HashMap;

use vo_core::{AgentToolCall, StopReason, Usage};

/// Normalised events emitted by every provider's streaming adapter.
///
/// Wire formats differ per vendor; adapters map them onto this enum before
/// anything in the core sees them. Events for one turn arrive in order.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// The provider accepted the request and a turn is underway.
    TurnStart,

    /// An assistant message began; `response_id` when the vendor assigns one.
    MessageStart { response_id: Option<String> },

    /// Incremental visible text.
    TextDelta { text: String },

    /// Incremental internal reasoning. Never delivered to channels.
    ReasoningDelta { text: String },

    /// The model opened a tool call.
    ToolCallStart { call_id: String, name: String },

    /// A fragment of a tool call's JSON argument string.
    ToolArgDelta { call_id: String, delta: String },

    /// The tool call's argument stream is complete.
    ToolCallDone { call_id: String },

    /// Token accounting, possibly emitted more than once per turn.
    UsageReport { usage: Usage },

    /// The assistant message is complete.
    MessageEnd { stop_reason: StopReason },

    /// The stream failed; the turn ends with stop reason `error`.
    Error { message: String },
}

/// Accumulates one turn's stream into an assistant message.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    pub text: String,
    pub reasoning: String,
    pub response_id: Option<String>,
    pub usage: Usage,
    pub stop_reason: Option<StopReason>,
    pub error: Option<String>,
    /// Call ids in declared order; result indexes must align with this.
    call_order: Vec<String>,
    call_names: HashMap<String, String>,
    call_args: HashMap<String, String>,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one stream event. Events arrive in order; this only buffers.
    pub fn push(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::TurnStart => {}
            StreamEvent::MessageStart { response_id } => {
                self.response_id = response_id.clone();
            }
            StreamEvent::TextDelta { text } => self.text.push_str(text),
            StreamEvent::ReasoningDelta { text } => self.reasoning.push_str(text),
            StreamEvent::ToolCallStart { call_id, name } => {
                self.call_order.push(call_id.clone());
                self.call_names.insert(call_id.clone(), name.clone());
                self.call_args.insert(call_id.clone(), String::new());
            }
            StreamEvent::ToolArgDelta { call_id, delta } => {
                self.call_args
                    .entry(call_id.clone())
                    .or_default()
                    .push_str(delta);
            }
            StreamEvent::ToolCallDone { .. } => {}
            StreamEvent::UsageReport { usage } => self.usage.add(usage),
            StreamEvent::MessageEnd { stop_reason } => {
                self.stop_reason = Some(*stop_reason);
            }
            StreamEvent::Error { message } => {
                self.error = Some(message.clone());
                self.stop_reason = Some(StopReason::Error);
            }
        }
    }

    /// Finalise the accumulated tool calls in declared order.
    ///
    /// Empty argument buffers become `{}`; malformed buffers pass through
    /// raw; schema validation at execution fails that call, not the turn.
    pub fn tool_calls(&self) -> Vec<AgentToolCall> {
        self.call_order
            .iter()
            .map(|call_id| {
                let raw = self.call_args.get(call_id).cloned().unwrap_or_default();
                let arguments = if raw.trim().is_empty() {
                    "{}".to_string()
                } else {
                    raw
                };
                AgentToolCall {
                    call_id: call_id.clone(),
                    name: self
                        .call_names
                        .get(call_id)
                        .cloned()
                        .unwrap_or_default(),
                    arguments,
                }
            })
            .collect()
    }

    /// Stop reason with the tool-call fallback applied.
    pub fn final_stop_reason(&self) -> StopReason {
        match self.stop_reason {
            Some(reason) => reason,
            None if !self.call_order.is_empty() => StopReason::ToolCalls,
            None => StopReason::Stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaved_tool_args_accumulate_per_call() {
        let mut acc = TurnAccumulator::new();
        acc.push(&StreamEvent::ToolCallStart {
            call_id: "a".into(),
            name: "first".into(),
        });
        acc.push(&StreamEvent::ToolCallStart {
            call_id: "b".into(),
            name: "second".into(),
        });
        acc.push(&StreamEvent::ToolArgDelta {
            call_id: "b".into(),
            delta: "{\"x\":".into(),
        });
        acc.push(&StreamEvent::ToolArgDelta {
            call_id: "a".into(),
            delta: "{}".into(),
        });
        acc.push(&StreamEvent::ToolArgDelta {
            call_id: "b".into(),
            delta: "1}".into(),
        });

        let calls = acc.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "first");
        assert_eq!(calls[0].arguments, "{}");
        assert_eq!(calls[1].arguments, "{\"x\":1}");
    }

    #[test]
    fn empty_argument_buffer_becomes_empty_object() {
        let mut acc = TurnAccumulator::new();
        acc.push(&StreamEvent::ToolCallStart {
            call_id: "a".into(),
            name: "no_args".into(),
        });
        assert_eq!(acc.tool_calls()[0].arguments, "{}");
    }

    #[test]
    fn stop_reason_falls_back_to_tool_calls() {
        let mut acc = TurnAccumulator::new();
        assert_eq!(acc.final_stop_reason(), StopReason::Stop);
        acc.push(&StreamEvent::ToolCallStart {
            call_id: "a".into(),
            name: "t".into(),
        });
        assert_eq!(acc.final_stop_reason(), StopReason::ToolCalls);
        acc.push(&StreamEvent::Error {
            message: "boom".into(),
        });
        assert_eq!(acc.final_stop_reason(), StopReason::Error);
    }
}
