pub mod channel;
pub mod error;
pub mod event;
pub mod memory;
pub mod registry;
pub mod types;

pub use channel::Channel;
pub use error::ChannelError;
pub use event::{ChannelEvent, Event, ScheduledEvent, REPL_INPUT_EVENT};
pub use memory::MemoryChannel;
pub use registry::ChannelRegistry;
pub use types::{ChannelInfo, ChannelUser};
