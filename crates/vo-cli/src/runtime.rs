use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use vo_agent::{Agent, AgentProvider, AgentSpec};
use vo_channels::{ChannelRegistry, Event};
use vo_core::db::open_db;
use vo_core::VoConfig;
use vo_memory::tools::scratch_tools;
use vo_memory::MemoryStore;
use vo_registry::tools::management_tools;
use vo_registry::HandlerRegistry;
use vo_router::{EventQueue, EventSource, Router};
use vo_scheduler::tools::scheduler_tools;
use vo_scheduler::{JobStore, SchedulerEngine};
use vo_search::SearchIndex;
use vo_sessions::SessionStore;
use vo_tools::ToolRegistry;

/// Everything the runtime owns, wired but not yet running.
///
/// `init` opens the stores; `run` merges the sources, builds the agent, and
/// drives the router until every producer is gone.
pub struct Runtime {
    pub config: VoConfig,
    pub registry: Arc<HandlerRegistry>,
    pub channels: Arc<ChannelRegistry>,
    pub sessions: Arc<SessionStore>,
    pub memory: Arc<MemoryStore>,
    pub jobs: Arc<JobStore>,
    provider: Arc<dyn AgentProvider>,
    queue: EventQueue,
    rx: Option<mpsc::UnboundedReceiver<Event>>,
    shutdown: watch::Sender<bool>,
}

impl Runtime {
    /// Open every store against the single database file and prepare the
    /// event queue. Fails fast with a precise message on a bad data dir.
    pub fn init(config: VoConfig, provider: Arc<dyn AgentProvider>) -> anyhow::Result<Self> {
        let db_path = config.db_path();
        let open = || {
            open_db(&db_path)
                .with_context(|| format!("opening database at {}", db_path.display()))
        };

        let search = Arc::new(SearchIndex::new(open()?)?);
        let sessions = Arc::new(
            SessionStore::new(open()?, Arc::clone(&search))?
                .with_rotation_secs(config.session_rotation_secs),
        );
        let memory = Arc::new(MemoryStore::new(open()?, Arc::clone(&search))?);
        let registry = Arc::new(HandlerRegistry::new(open()?)?);
        let jobs = Arc::new(JobStore::new(open()?, Arc::clone(&registry))?);

        let (queue, rx) = EventQueue::unbounded();
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            registry,
            channels: Arc::new(ChannelRegistry::new()),
            sessions,
            memory,
            jobs,
            provider,
            queue,
            rx: Some(rx),
            shutdown,
        })
    }

    /// Producer handle onto the event queue.
    pub fn queue(&self) -> EventQueue {
        self.queue.clone()
    }

    /// Signal the scheduler task to stop (the router stops when the queue
    /// closes).
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown.clone()
    }

    /// Merge the sources, assemble the tool set and the agent, start the
    /// scheduler and every source, then consume the event queue forever.
    pub async fn run(mut self, sources: Vec<Arc<dyn EventSource>>) -> anyhow::Result<()> {
        // Channel rows are ephemeral mirrors; start from a clean slate.
        self.registry.reset_channels()?;

        let mut tools = ToolRegistry::new();
        tools
            .register_all(management_tools(Arc::clone(&self.registry)))
            .context("registering management tools")?;
        tools
            .register_all(scheduler_tools(Arc::clone(&self.jobs)))
            .context("registering scheduler tools")?;
        tools
            .register_all(scratch_tools(Arc::clone(&self.memory)))
            .context("registering scratch tools")?;

        for source in &sources {
            info!(source = source.name(), "registering event source");
            for channel in source.channels() {
                self.registry.upsert_channel(&channel.info())?;
                self.channels.register(channel);
            }
            for event_type in source.event_types() {
                self.registry.upsert_event_type(&event_type)?;
            }
            tools
                .register_all(source.tools())
                .with_context(|| format!("registering tools from source {}", source.name()))?;
        }
        // Default handlers merge after every event type and channel exists.
        for source in &sources {
            for handler in source.event_handlers() {
                if let Err(e) = self.registry.upsert_handler(&handler) {
                    warn!(
                        source = source.name(),
                        handler = %handler.id,
                        "default handler rejected: {e}"
                    );
                }
            }
        }

        let spec = AgentSpec {
            name: "vo".to_string(),
            prompt: self.config.system_prompt.clone(),
            bot_name: self.config.bot_name.clone(),
            skills: Vec::new(),
        };
        let agent = Arc::new(
            Agent::new(
                spec,
                Arc::clone(&self.provider),
                self.config.agent_model.clone(),
                self.config.agent_api_key.clone(),
                Arc::new(tools),
                Arc::clone(&self.sessions),
                Arc::clone(&self.memory),
            )
            .with_memory_context_limit(self.config.memory_context_limit),
        );

        // Scheduler loop in its own task.
        let engine = SchedulerEngine::new(Arc::clone(&self.jobs), self.queue.sender());
        tokio::spawn(engine.run(self.shutdown.subscribe()));

        for source in &sources {
            source
                .start(self.queue.clone())
                .await
                .map_err(|e| anyhow::anyhow!("starting source {}: {e}", source.name()))?;
        }

        let rx = self.rx.take().expect("run called twice");
        let router = Router::new(
            rx,
            Arc::clone(&self.registry),
            Arc::clone(&self.channels),
            Arc::clone(&self.sessions),
            agent,
        );
        // Drop our own producer handle so the router stops once every
        // source-held handle is gone.
        drop(self.queue);
        router.run().await;
        Ok(())
    }

    /// Remove every trace of a platform post: hard-delete matching agent
    /// data, soft-mark matching session entries.
    pub fn scrub_post(&self, post_id: &str) -> anyhow::Result<usize> {
        let data = self.memory.scrub(post_id)?;
        let entries = self.sessions.scrub(post_id)?;
        info!(post_id, data, entries, "post scrubbed");
        Ok(data + entries)
    }
}
