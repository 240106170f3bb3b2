//! Scripted provider for tests.
//!
//! Each `stream` call replays the next scripted turn as a realistic event
//! sequence (message start, split text deltas, tool call fragments, usage,
//! message end) and records the request it was given so tests can assert on
//! prompt contents.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use vo_core::{StopReason, Usage};

use crate::provider::{AgentProvider, ProviderError, ProviderRequest};
use crate::stream::StreamEvent;

/// One scripted assistant turn.
#[derive(Debug, Clone)]
pub struct MockTurn {
    pub text: String,
    /// `(tool name, raw JSON arguments)` pairs, emitted in order.
    pub tool_calls: Vec<(String, String)>,
    pub stop_reason: StopReason,
}

impl MockTurn {
    /// A plain text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
            stop_reason: StopReason::Stop,
        }
    }

    /// A turn that calls one tool.
    pub fn tool_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            tool_calls: vec![(name.into(), arguments.into())],
            stop_reason: StopReason::ToolCalls,
        }
    }
}

/// Provider that replays scripted turns and records its requests.
pub struct MockProvider {
    turns: Mutex<VecDeque<MockTurn>>,
    requests: Mutex<Vec<ProviderRequest>>,
    call_counter: Mutex<u32>,
}

impl MockProvider {
    pub fn new(turns: Vec<MockTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
            call_counter: Mutex::new(0),
        }
    }

    /// Every request this provider has received, in call order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream(
        &self,
        req: &ProviderRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        self.requests.lock().unwrap().push(req.clone());

        let Some(turn) = self.turns.lock().unwrap().pop_front() else {
            return Err(ProviderError::Unavailable("mock script exhausted".to_string()));
        };

        let response_id = format!("mock-resp-{}", self.requests.lock().unwrap().len());
        let _ = tx.send(StreamEvent::TurnStart).await;
        let _ = tx
            .send(StreamEvent::MessageStart {
                response_id: Some(response_id),
            })
            .await;

        // Split text into two deltas so accumulation is actually exercised.
        if !turn.text.is_empty() {
            let mid = turn.text.len() / 2;
            let split = turn
                .text
                .char_indices()
                .map(|(i, _)| i)
                .find(|&i| i >= mid)
                .unwrap_or(0);
            let (head, tail) = turn.text.split_at(split);
            for part in [head, tail] {
                if !part.is_empty() {
                    let _ = tx
                        .send(StreamEvent::TextDelta {
                            text: part.to_string(),
                        })
                        .await;
                }
            }
        }

        for (name, arguments) in &turn.tool_calls {
            let call_id = {
                let mut counter = self.call_counter.lock().unwrap();
                *counter += 1;
                format!("call-{counter}")
            };
            let _ = tx
                .send(StreamEvent::ToolCallStart {
                    call_id: call_id.clone(),
                    name: name.clone(),
                })
                .await;
            // Argument string arrives fragmented, like a real stream.
            let mid = arguments.len() / 2;
            let split = arguments
                .char_indices()
                .map(|(i, _)| i)
                .find(|&i| i >= mid)
                .unwrap_or(0);
            let (head, tail) = arguments.split_at(split);
            for part in [head, tail] {
                if !part.is_empty() {
                    let _ = tx
                        .send(StreamEvent::ToolArgDelta {
                            call_id: call_id.clone(),
                            delta: part.to_string(),
                        })
                        .await;
                }
            }
            let _ = tx.send(StreamEvent::ToolCallDone { call_id }).await;
        }

        let _ = tx
            .send(StreamEvent::UsageReport {
                usage: Usage {
                    input: 10,
                    output: 5,
                    ..Usage::default()
                },
            })
            .await;
        let _ = tx
            .send(StreamEvent::MessageEnd {
                stop_reason: turn.stop_reason,
            })
            .await;

        Ok(())
    }
}
