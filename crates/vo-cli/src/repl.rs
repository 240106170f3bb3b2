//! The interactive REPL: stdin lines become `repl_input` events; the
//! channel prints streamed output and signals completion so the prompt
//! blocks until the turn is done.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tracing::{error, info};

use vo_channels::{Channel, ChannelUser, Event, REPL_INPUT_EVENT};
use vo_core::{EventHandler, EventType};
use vo_router::{EventQueue, EventSource};

/// Stdout-backed direct channel for the local operator.
pub struct ReplChannel {
    done: Notify,
}

impl ReplChannel {
    pub fn new() -> Self {
        Self {
            done: Notify::new(),
        }
    }

    /// Block until the in-flight turn finishes delivering.
    pub async fn wait_done(&self) {
        self.done.notified().await;
    }
}

impl Default for ReplChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for ReplChannel {
    fn id(&self) -> String {
        "repl".to_string()
    }

    fn type_name(&self) -> &str {
        "repl"
    }

    fn is_group(&self) -> bool {
        false
    }

    fn is_private(&self) -> bool {
        true
    }

    async fn start_streaming(&self) -> vo_channels::error::Result<()> {
        Ok(())
    }

    async fn append_to_stream(&self, delta: &str) -> vo_channels::error::Result<()> {
        print!("{delta}");
        let _ = std::io::stdout().flush();
        Ok(())
    }

    async fn finish_streaming(&self) -> vo_channels::error::Result<()> {
        println!();
        self.done.notify_one();
        Ok(())
    }

    async fn send_message(&self, text: &str) -> vo_channels::error::Result<()> {
        println!("{text}");
        self.done.notify_one();
        Ok(())
    }

    fn current_user(&self) -> Option<ChannelUser> {
        Some(ChannelUser {
            id: "local".to_string(),
            name: whoami(),
        })
    }
}

/// Event source that turns stdin lines into `repl_input` events.
pub struct ReplEventSource {
    channel: Arc<ReplChannel>,
}

impl ReplEventSource {
    pub fn new() -> Self {
        Self {
            channel: Arc::new(ReplChannel::new()),
        }
    }

    pub fn channel(&self) -> Arc<ReplChannel> {
        Arc::clone(&self.channel)
    }
}

impl Default for ReplEventSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for ReplEventSource {
    fn name(&self) -> &str {
        "repl"
    }

    fn channels(&self) -> Vec<Arc<dyn Channel>> {
        vec![Arc::clone(&self.channel) as Arc<dyn Channel>]
    }

    fn event_types(&self) -> Vec<EventType> {
        vec![EventType::new(
            REPL_INPUT_EVENT,
            "A line typed into the local REPL",
        )]
    }

    fn event_handlers(&self) -> Vec<EventHandler> {
        // Channel-less: output goes back to the event's own channel.
        vec![EventHandler::new(
            "repl_default",
            vec![REPL_INPUT_EVENT.to_string()],
            "",
            None,
        )]
    }

    async fn start(&self, queue: EventQueue) -> vo_router::error::Result<()> {
        let channel = Arc::clone(&self.channel);
        tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            let mut lines = stdin.lines();
            prompt();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            prompt();
                            continue;
                        }
                        let event =
                            Event::repl_input(line, Arc::clone(&channel) as Arc<dyn Channel>);
                        if queue.push(event).is_err() {
                            error!("event queue closed, stopping REPL");
                            break;
                        }
                        // One turn at a time: block until delivery finished.
                        // The timeout keeps the prompt usable if a turn dies
                        // before it ever reaches the channel.
                        let _ = tokio::time::timeout(
                            std::time::Duration::from_secs(600),
                            channel.wait_done(),
                        )
                        .await;
                        prompt();
                    }
                    Ok(None) => {
                        info!("stdin closed, REPL source stopping");
                        break;
                    }
                    Err(e) => {
                        error!("stdin read failed: {e}");
                        break;
                    }
                }
            }
        });
        Ok(())
    }
}

fn prompt() {
    print!("vo> ");
    let _ = std::io::stdout().flush();
}

fn whoami() -> String {
    std::env::var("USER").unwrap_or_else(|_| "operator".to_string())
}
