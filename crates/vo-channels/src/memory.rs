//! In-memory channel used by tests and local tooling.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::channel::Channel;
use crate::error::Result;
use crate::types::ChannelUser;

/// A channel that records everything delivered to it.
pub struct MemoryChannel {
    id: String,
    is_group: bool,
    is_private: bool,
    user: Option<ChannelUser>,
    streamed: Mutex<Vec<String>>,
    sent: Mutex<Vec<String>>,
    stream_finishes: Mutex<u32>,
}

impl MemoryChannel {
    pub fn new(id: impl Into<String>, is_group: bool, is_private: bool) -> Self {
        Self {
            id: id.into(),
            is_group,
            is_private,
            user: None,
            streamed: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            stream_finishes: Mutex::new(0),
        }
    }

    /// A 1:1 private channel (streaming path).
    pub fn direct(id: impl Into<String>) -> Self {
        Self::new(id, false, true)
    }

    /// A public multi-party channel (output-guard path).
    pub fn group(id: impl Into<String>) -> Self {
        Self::new(id, true, false)
    }

    pub fn with_user(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.user = Some(ChannelUser {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    /// All fragments streamed so far, concatenated.
    pub fn streamed_text(&self) -> String {
        self.streamed.lock().unwrap().concat()
    }

    /// Whole messages delivered via `send_message`.
    pub fn sent_messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn finish_count(&self) -> u32 {
        *self.stream_finishes.lock().unwrap()
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn type_name(&self) -> &str {
        "memory"
    }

    fn is_group(&self) -> bool {
        self.is_group
    }

    fn is_private(&self) -> bool {
        self.is_private
    }

    async fn start_streaming(&self) -> Result<()> {
        Ok(())
    }

    async fn append_to_stream(&self, delta: &str) -> Result<()> {
        self.streamed.lock().unwrap().push(delta.to_string());
        Ok(())
    }

    async fn finish_streaming(&self) -> Result<()> {
        *self.stream_finishes.lock().unwrap() += 1;
        Ok(())
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn current_user(&self) -> Option<ChannelUser> {
        self.user.clone()
    }
}
