//! Router dispatch semantics against the scripted provider.

use std::sync::Arc;
use std::time::Duration;

use vo_agent::{Agent, AgentSpec, MockProvider, MockTurn};
use vo_channels::{Channel, ChannelRegistry, Event, MemoryChannel};
use vo_core::db::open_db_in_memory;
use vo_core::{EventHandler, EventType};
use vo_memory::MemoryStore;
use vo_registry::HandlerRegistry;
use vo_router::{EventQueue, Router};
use vo_search::SearchIndex;
use vo_sessions::SessionStore;
use vo_tools::ToolRegistry;

struct World {
    queue: EventQueue,
    registry: Arc<HandlerRegistry>,
    channels: Arc<ChannelRegistry>,
    sessions: Arc<SessionStore>,
    provider: Arc<MockProvider>,
    router_done: tokio::task::JoinHandle<()>,
}

fn world(turns: Vec<MockTurn>) -> World {
    let search = Arc::new(SearchIndex::new(open_db_in_memory().unwrap()).unwrap());
    let sessions = Arc::new(
        SessionStore::new(open_db_in_memory().unwrap(), Arc::clone(&search)).unwrap(),
    );
    let memory =
        Arc::new(MemoryStore::new(open_db_in_memory().unwrap(), Arc::clone(&search)).unwrap());
    let registry = Arc::new(HandlerRegistry::new(open_db_in_memory().unwrap()).unwrap());
    let channels = Arc::new(ChannelRegistry::new());
    let provider = Arc::new(MockProvider::new(turns));

    let agent = Arc::new(Agent::new(
        AgentSpec {
            name: "main".to_string(),
            prompt: "You are a test assistant.".to_string(),
            bot_name: "vo".to_string(),
            skills: Vec::new(),
        },
        Arc::clone(&provider) as Arc<dyn vo_agent::AgentProvider>,
        "test-model",
        "test-key",
        Arc::new(ToolRegistry::new()),
        Arc::clone(&sessions),
        memory,
    ));

    let (queue, rx) = EventQueue::unbounded();
    let router = Router::new(
        rx,
        Arc::clone(&registry),
        Arc::clone(&channels),
        Arc::clone(&sessions),
        agent,
    );
    let router_done = tokio::spawn(router.run());

    World {
        queue,
        registry,
        channels,
        sessions,
        provider,
        router_done,
    }
}

/// Wait until the provider has seen `n` requests (dispatched turns race the
/// test body, so poll with a deadline).
async fn await_dispatches(provider: &MockProvider, n: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while provider.requests().len() < n {
        if tokio::time::Instant::now() > deadline {
            panic!(
                "expected {n} dispatches, saw {}",
                provider.requests().len()
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn repl_event_reaches_the_handler_and_the_channel() {
    let w = world(vec![MockTurn::text("hello from the model")]);
    let channel = Arc::new(MemoryChannel::direct("repl"));
    w.channels.register(channel.clone());
    w.registry
        .upsert_event_type(&EventType::new("repl_input", "REPL line"))
        .unwrap();
    w.registry
        .upsert_handler(&EventHandler::new(
            "repl_default",
            vec!["repl_input".to_string()],
            "",
            None,
        ))
        .unwrap();

    w.queue
        .push(Event::repl_input("hello", channel.clone()))
        .unwrap();
    await_dispatches(&w.provider, 1).await;

    // Empty handler prompt: the event content is the whole input.
    let request = &w.provider.requests()[0];
    assert_eq!(request.messages.last().unwrap().text(), "hello");

    // Wait for the spawned turn to finish delivering.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while channel.streamed_text().is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(channel.streamed_text(), "hello from the model");

    let session = w.sessions.resolve("repl", false, true).unwrap();
    assert_eq!(w.sessions.entry_count(&session).unwrap(), 1);
    w.router_done.abort();
}

#[tokio::test]
async fn firing_n_times_dispatches_n_times() {
    let n = 4;
    let turns = (0..n).map(|i| MockTurn::text(format!("reply {i}"))).collect();
    let w = world(turns);
    let channel = Arc::new(MemoryChannel::direct("ch-a"));
    w.channels.register(channel.clone());
    for name in ["type_a", "type_b"] {
        w.registry
            .upsert_event_type(&EventType::new(name, ""))
            .unwrap();
    }
    w.registry
        .upsert_handler(&EventHandler::new(
            "h",
            vec!["type_a".to_string(), "type_b".to_string()],
            "react",
            None,
        ))
        .unwrap();

    for _ in 0..n {
        w.queue
            .push(Event::Channel(vo_channels::ChannelEvent {
                name: "type_a".to_string(),
                content: "payload".to_string(),
                channel: channel.clone(),
                mentioned: false,
                user: None,
                post_id: None,
            }))
            .unwrap();
    }

    await_dispatches(&w.provider, n).await;
    assert_eq!(w.provider.requests().len(), n);
    w.router_done.abort();
}

#[tokio::test]
async fn handler_prompt_and_content_compose() {
    let w = world(vec![MockTurn::text("ok")]);
    let channel = Arc::new(MemoryChannel::direct("ch-a"));
    w.channels.register(channel.clone());
    w.registry
        .upsert_event_type(&EventType::new("type_a", ""))
        .unwrap();
    w.registry
        .upsert_handler(&EventHandler::new(
            "h",
            vec!["type_a".to_string()],
            "summarize this",
            None,
        ))
        .unwrap();

    w.queue
        .push(Event::Channel(vo_channels::ChannelEvent {
            name: "type_a".to_string(),
            content: "the day's news".to_string(),
            channel: channel.clone(),
            mentioned: false,
            user: None,
            post_id: None,
        }))
        .unwrap();

    await_dispatches(&w.provider, 1).await;
    let input = w.provider.requests()[0].messages.last().unwrap().text().to_string();
    assert_eq!(input, "summarize this\n\nEvent content:\n\nthe day's news");
    w.router_done.abort();
}

#[tokio::test]
async fn scheduled_event_uses_the_handler_channel_and_session() {
    let w = world(vec![MockTurn::text("scheduled result")]);
    let channel = Arc::new(MemoryChannel::new("C1", false, false));
    w.channels.register(channel.clone());
    w.registry
        .upsert_event_type(&EventType::new("tempus_job:daily", ""))
        .unwrap();
    w.registry
        .upsert_channel(&channel.info())
        .unwrap();
    w.registry
        .upsert_handler(&EventHandler::new(
            "tempus_job:daily",
            vec!["tempus_job:daily".to_string()],
            "summarize yesterday",
            Some("C1".to_string()),
        ))
        .unwrap();

    w.queue.push(Event::scheduled("tempus_job:daily")).unwrap();
    await_dispatches(&w.provider, 1).await;

    // Scheduled events have no session key of their own: the handler id
    // keys the session.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let session = w
            .sessions
            .resolve("tempus_job:daily", false, false)
            .unwrap();
        if w.sessions.entry_count(&session).unwrap() >= 1 {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("scheduled turn never persisted");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(
        w.provider.requests()[0].messages.last().unwrap().text(),
        "summarize yesterday"
    );
    w.router_done.abort();
}

#[tokio::test]
async fn handler_without_resolvable_channel_is_skipped() {
    let w = world(vec![MockTurn::text("never sent")]);
    w.registry
        .upsert_event_type(&EventType::new("orphan_event", ""))
        .unwrap();
    // Handler with no channel: a scheduled event for it cannot resolve one.
    w.registry
        .upsert_handler(&EventHandler::new(
            "orphan",
            vec!["orphan_event".to_string()],
            "do something",
            None,
        ))
        .unwrap();

    w.queue.push(Event::scheduled("orphan_event")).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Skipped with a warning: the provider never saw a request.
    assert!(w.provider.requests().is_empty());
    w.router_done.abort();
}
