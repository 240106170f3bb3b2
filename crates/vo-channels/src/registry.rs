use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::channel::Channel;
use crate::types::ChannelInfo;

/// Process-lifetime map of live channels.
///
/// Mutated only while sources register at startup; read concurrently by the
/// router and tool handlers afterwards, hence the lock-free map.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, Arc<dyn Channel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel. A channel with the same id is replaced.
    pub fn register(&self, channel: Arc<dyn Channel>) {
        let id = channel.id();
        info!(channel = %id, kind = channel.type_name(), "registering channel");
        self.channels.insert(id, channel);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Channel>> {
        self.channels.get(id).map(|c| Arc::clone(c.value()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.channels.contains_key(id)
    }

    /// Snapshot of every registered channel, sorted by id for deterministic
    /// listings.
    pub fn infos(&self) -> Vec<ChannelInfo> {
        let mut infos: Vec<ChannelInfo> =
            self.channels.iter().map(|c| c.value().info()).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Ids of all non-private channels plus nothing else; used for memory
    /// visibility scoping.
    pub fn public_channel_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .channels
            .iter()
            .filter(|c| !c.value().is_private())
            .map(|c| c.key().clone())
            .collect();
        ids.sort();
        ids
    }
}
