pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod message;

pub use config::VoConfig;
pub use error::{Result, VoError};
pub use event::{EventHandler, EventType};
pub use message::{AgentToolCall, Message, PendingToolCall, StopReason, Usage};
