//! Whole-runtime scenarios: sources, router, scheduler, and stores wired
//! the way the binary wires them, against the scripted provider.

use std::sync::Arc;
use std::time::Duration;

use vo_agent::{MockProvider, MockTurn};
use vo_channels::{Channel, Event, MemoryChannel};
use vo_cli::Runtime;
use vo_core::{EventHandler, EventType, VoConfig};
use vo_router::{EventQueue, EventSource};

struct TestSource {
    channel: Arc<MemoryChannel>,
}

#[async_trait::async_trait]
impl EventSource for TestSource {
    fn name(&self) -> &str {
        "test"
    }

    fn channels(&self) -> Vec<Arc<dyn Channel>> {
        vec![Arc::clone(&self.channel) as Arc<dyn Channel>]
    }

    fn event_types(&self) -> Vec<EventType> {
        vec![EventType::new("repl_input", "test input line")]
    }

    fn event_handlers(&self) -> Vec<EventHandler> {
        vec![EventHandler::new(
            "repl_default",
            vec!["repl_input".to_string()],
            "",
            None,
        )]
    }

    async fn start(&self, _queue: EventQueue) -> vo_router::error::Result<()> {
        Ok(())
    }
}

struct RunningWorld {
    queue: EventQueue,
    sessions: Arc<vo_sessions::SessionStore>,
    jobs: Arc<vo_scheduler::JobStore>,
    provider: Arc<MockProvider>,
    channel: Arc<MemoryChannel>,
    _data_dir: tempfile::TempDir,
}

async fn start_world(turns: Vec<MockTurn>, channel: MemoryChannel) -> RunningWorld {
    let data_dir = tempfile::tempdir().unwrap();
    let config = VoConfig {
        agent_provider: "mock".to_string(),
        agent_model: "test-model".to_string(),
        agent_api_key: "test-key".to_string(),
        data_dir: data_dir.path().to_path_buf(),
        ..VoConfig::default()
    };

    let provider = Arc::new(MockProvider::new(turns));
    let runtime = Runtime::init(config, provider.clone()).unwrap();
    let queue = runtime.queue();
    let sessions = Arc::clone(&runtime.sessions);
    let jobs = Arc::clone(&runtime.jobs);

    let channel = Arc::new(channel);
    let source = Arc::new(TestSource {
        channel: Arc::clone(&channel),
    });
    tokio::spawn(runtime.run(vec![source as Arc<dyn EventSource>]));

    // Let the runtime finish registration before tests push events.
    tokio::time::sleep(Duration::from_millis(100)).await;

    RunningWorld {
        queue,
        sessions,
        jobs,
        provider,
        channel,
        _data_dir: data_dir,
    }
}

async fn poll<F: Fn() -> bool>(what: &str, check: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn repl_echo_end_to_end() {
    let w = start_world(
        vec![MockTurn::text("assistant says hello")],
        MemoryChannel::direct("repl"),
    )
    .await;

    w.queue
        .push(Event::repl_input(
            "hello",
            Arc::clone(&w.channel) as Arc<dyn Channel>,
        ))
        .unwrap();

    poll("assistant delivery", || {
        w.channel.streamed_text() == "assistant says hello"
    })
    .await;

    let session = w.sessions.resolve("repl", false, true).unwrap();
    assert_eq!(w.sessions.entry_count(&session).unwrap(), 1);
}

#[tokio::test]
async fn scheduled_job_fires_into_its_channel() {
    // The job's channel is the test source's channel, registered at startup.
    let w = start_world(
        vec![MockTurn::text("daily summary done")],
        MemoryChannel::new("C1", false, false),
    )
    .await;

    // Six-field expression: fire every second, so the 1 s engine tick picks
    // it up almost immediately.
    w.jobs
        .add_job("pulse", "* * * * * *", "summarize yesterday", "C1", None)
        .unwrap();

    poll("scheduled dispatch", || !w.provider.requests().is_empty()).await;

    let request = &w.provider.requests()[0];
    assert_eq!(
        request.messages.last().unwrap().text(),
        "summarize yesterday"
    );

    // Session is keyed by the handler id, not a channel.
    poll("scheduled persistence", || {
        let session = w
            .sessions
            .resolve("tempus_job:pulse", false, false)
            .unwrap();
        w.sessions.entry_count(&session).unwrap() >= 1
    })
    .await;

    w.jobs.remove_job("pulse").unwrap();
    assert!(w.jobs.list_jobs().unwrap().is_empty());
}

#[tokio::test]
async fn scrub_reaches_both_stores() {
    let data_dir = tempfile::tempdir().unwrap();
    let config = VoConfig {
        agent_provider: "mock".to_string(),
        agent_model: "m".to_string(),
        agent_api_key: "k".to_string(),
        data_dir: data_dir.path().to_path_buf(),
        ..VoConfig::default()
    };
    let runtime = Runtime::init(config, Arc::new(MockProvider::new(vec![]))).unwrap();

    runtime
        .memory
        .store(vo_memory::store::NewEntry {
            key: Some("note".to_string()),
            value: "about that post".to_string(),
            post_id: Some("p-1".to_string()),
            ..vo_memory::store::NewEntry::default()
        })
        .unwrap();
    let session = runtime.sessions.resolve("ch", false, true).unwrap();
    let mut entry = vo_sessions::SessionEntry::turn(
        &session,
        vec![vo_core::Message::user("tied to the post")],
    );
    entry.post_id = Some("p-1".to_string());
    runtime.sessions.append_entry(&entry).unwrap();

    let touched = runtime.scrub_post("p-1").unwrap();
    assert_eq!(touched, 2);
    assert!(runtime.memory.get("note").unwrap().is_none());
    // Session entries survive as soft-deleted rows.
    assert_eq!(runtime.sessions.entry_count(&session).unwrap(), 1);
}
