use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChannelInfo, ChannelUser};

/// Common interface implemented by every channel adapter (chat platform,
/// REPL, webhook sink, …).
///
/// Implementations must be `Send + Sync` so they can be stored in a
/// [`ChannelRegistry`](crate::registry::ChannelRegistry) and driven from
/// multiple Tokio tasks. All delivery methods take `&self` so a connected
/// adapter can send concurrently without a mutable borrow.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable identifier, unique across all registered channels.
    fn id(&self) -> String;

    /// Adapter kind (e.g. `"mattermost"`, `"repl"`).
    fn type_name(&self) -> &str;

    /// True for multi-party channels; group channels suppress streaming and
    /// run the output guard after the turn completes.
    fn is_group(&self) -> bool;

    /// True for DMs and private channels; scopes memory visibility.
    fn is_private(&self) -> bool;

    /// Begin an incremental delivery (e.g. post a placeholder message).
    async fn start_streaming(&self) -> Result<()>;

    /// Append one fragment to the in-progress delivery.
    async fn append_to_stream(&self, delta: &str) -> Result<()>;

    /// Finalise the in-progress delivery.
    async fn finish_streaming(&self) -> Result<()>;

    /// Deliver a whole message atomically.
    async fn send_message(&self, text: &str) -> Result<()>;

    /// Release adapter resources. Registered channels live for the process,
    /// so most adapters make this a no-op.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Identity of the user the current event came from, when the adapter
    /// knows it (used for group-chat tagging and per-user scoping).
    fn current_user(&self) -> Option<ChannelUser> {
        None
    }

    /// Snapshot used for the persisted channel registry rows.
    fn info(&self) -> ChannelInfo {
        ChannelInfo {
            id: self.id(),
            type_name: self.type_name().to_string(),
            is_group: self.is_group(),
            is_private: self.is_private(),
        }
    }
}
