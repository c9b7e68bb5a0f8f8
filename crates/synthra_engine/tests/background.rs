mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{
    init_logging, wait_for_state, MemoryTranscripts, ScriptedEngine, ScriptedFactory,
    watch_url,
};
use pretty_assertions::assert_eq;
use synthra_core::{EngineState, Language, TabId, Tier};
use synthra_engine::{
    Background, BackgroundConfig, EngineFactory, InferenceError, LocalStore, SummarizeError,
    SummarizeRequest, SummaryEvent, TranscriptError,
};
use tokio::sync::broadcast;

const CREATED_AT: &str = "2026-01-01T00:00:00+00:00";

fn background(
    factory: Arc<dyn EngineFactory>,
    transcripts: Arc<MemoryTranscripts>,
    auto_summarize: bool,
) -> Background {
    init_logging();
    let mut store = LocalStore::in_memory();
    store
        .update_settings(|settings| settings.auto_summarize = auto_summarize)
        .unwrap();
    let config = BackgroundConfig::with_clock(Arc::new(|| CREATED_AT.to_string()));
    Background::new(factory, transcripts, store, config)
}

fn request(tab_id: TabId) -> SummarizeRequest {
    SummarizeRequest {
        tab_id,
        language: Language::En,
        tier: Tier::Free,
        refresh: false,
    }
}

async fn next_event(rx: &mut broadcast::Receiver<SummaryEvent>) -> SummaryEvent {
    tokio::time::timeout(Duration::from_secs(3600), rx.recv())
        .await
        .expect("event in time")
        .expect("channel open")
}

async fn ready(background: &Background) {
    wait_for_state(background.lifecycle(), EngineState::is_ready).await;
}

#[tokio::test(start_paused = true)]
async fn queued_transcripts_drain_in_arrival_order_once_ready() {
    let engine = ScriptedEngine::constant("done");
    let factory = ScriptedFactory::failing(engine.clone(), 2);
    let transcripts = MemoryTranscripts::new();
    let ids = ["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"];
    for id in ids {
        transcripts.insert(id, &format!("transcript for {id}"));
    }
    let background = background(factory.clone(), transcripts, false);
    let mut events = background.subscribe();

    for (tab, id) in [1, 2, 3].into_iter().zip(ids) {
        background.navigation(tab, watch_url(id), None);
    }
    background.start();

    for tab in [2, 1, 3] {
        let result = background.summarize_tab(request(tab)).await;
        assert_eq!(result, Err(SummarizeError::EngineNotReady));
    }
    assert_eq!(background.pending_count(), 3);

    let mut completed = Vec::new();
    for _ in 0..3 {
        match next_event(&mut events).await {
            SummaryEvent::Completed { tab_id, cached, .. } => {
                assert!(!cached);
                completed.push(tab_id);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    assert_eq!(completed, vec![2, 1, 3]);
    assert_eq!(background.engine_state(), EngineState::Ready);
    assert_eq!(background.lifecycle().retry_count(), 0);
    assert_eq!(factory.created(), 3);
    assert_eq!(engine.call_count(), 3);
    assert_eq!(background.pending_count(), 0);

    let history = background.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].content_id, "ccccccccccc");
    assert_eq!(history[0].title, "Video ccccccccccc");
    assert_eq!(history[0].created_at, CREATED_AT);
    assert_eq!(
        history[0].thumbnail_ref.as_deref(),
        Some("https://i.ytimg.com/vi/ccccccccccc/hqdefault.jpg")
    );
}

#[tokio::test(start_paused = true)]
async fn drain_drops_items_whose_tab_moved_on() {
    let engine = ScriptedEngine::constant("done");
    let transcripts = MemoryTranscripts::new();
    transcripts.insert("aaaaaaaaaaa", "first video");
    transcripts.insert("ccccccccccc", "other tab video");
    let background = background(ScriptedFactory::new(engine.clone()), transcripts, false);

    background.navigation(1, watch_url("aaaaaaaaaaa"), None);
    background.navigation(2, watch_url("ccccccccccc"), None);
    assert_eq!(
        background.summarize_tab(request(1)).await,
        Err(SummarizeError::EngineNotReady)
    );
    assert_eq!(
        background.summarize_tab(request(2)).await,
        Err(SummarizeError::EngineNotReady)
    );
    background.navigation(1, watch_url("bbbbbbbbbbb"), None);

    ready(&background).await;
    assert_eq!(background.drain_pending().await, 1);

    assert_eq!(engine.call_count(), 1);
    let history = background.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content_id, "ccccccccccc");
    assert_eq!(background.drain_pending().await, 0);
}

#[tokio::test(start_paused = true)]
async fn newer_request_replaces_queued_one_for_the_same_tab() {
    let engine = ScriptedEngine::constant("done");
    let transcripts = MemoryTranscripts::new();
    transcripts.insert("aaaaaaaaaaa", "first video");
    transcripts.insert("bbbbbbbbbbb", "second video");
    let background = background(ScriptedFactory::new(engine.clone()), transcripts, false);

    background.navigation(1, watch_url("aaaaaaaaaaa"), None);
    let _ = background.summarize_tab(request(1)).await;
    background.navigation(1, watch_url("bbbbbbbbbbb"), None);
    let _ = background.summarize_tab(request(1)).await;
    assert_eq!(background.pending_count(), 1);

    ready(&background).await;
    assert_eq!(background.drain_pending().await, 1);
    assert_eq!(engine.prompts().len(), 1);
    assert!(engine.prompts()[0].ends_with("second video"));
}

#[tokio::test(start_paused = true)]
async fn closing_a_tab_drops_its_queued_transcript() {
    let engine = ScriptedEngine::constant("done");
    let transcripts = MemoryTranscripts::new();
    transcripts.insert("aaaaaaaaaaa", "first video");
    let background = background(ScriptedFactory::new(engine), transcripts, false);

    background.navigation(4, watch_url("aaaaaaaaaaa"), None);
    let _ = background.summarize_tab(request(4)).await;
    assert_eq!(background.pending_count(), 1);

    background.tab_closed(4);
    assert_eq!(background.pending_count(), 0);
    assert_eq!(
        background.summarize_tab(request(4)).await,
        Err(SummarizeError::TabGone(4))
    );
}

#[tokio::test(start_paused = true)]
async fn cached_summary_is_reused_unless_refreshed() {
    let engine = ScriptedEngine::constant("fresh summary");
    let transcripts = MemoryTranscripts::new();
    transcripts.insert("aaaaaaaaaaa", "a talk about caching");
    let background = background(
        ScriptedFactory::new(engine.clone()),
        transcripts.clone(),
        false,
    );
    background.start();
    ready(&background).await;
    background.navigation(1, watch_url("aaaaaaaaaaa"), Some("Caching".to_string()));

    let first = background.summarize_tab(request(1)).await.unwrap();
    assert_eq!(first, "fresh summary");

    let mut events = background.subscribe();
    let second = background.summarize_tab(request(1)).await.unwrap();
    assert_eq!(second, "fresh summary");
    assert_eq!(engine.call_count(), 1);
    assert_eq!(transcripts.requests(), 1);
    assert_eq!(
        next_event(&mut events).await,
        SummaryEvent::Completed {
            tab_id: 1,
            content_id: "aaaaaaaaaaa".to_string(),
            title: "Video aaaaaaaaaaa".to_string(),
            summary: "fresh summary".to_string(),
            cached: true,
        }
    );

    let korean = SummarizeRequest {
        language: Language::Ko,
        ..request(1)
    };
    background.summarize_tab(korean).await.unwrap();
    assert_eq!(engine.call_count(), 2);

    let refresh = SummarizeRequest {
        refresh: true,
        ..request(1)
    };
    background.summarize_tab(refresh).await.unwrap();
    assert_eq!(engine.call_count(), 3);
    assert_eq!(background.history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn settled_navigation_summarizes_automatically() {
    let engine = ScriptedEngine::constant("auto summary");
    let transcripts = MemoryTranscripts::new();
    transcripts.insert("aaaaaaaaaaa", "auto transcript");
    let background = background(ScriptedFactory::new(engine), transcripts, true);
    let mut events = background.subscribe();
    background.start();

    background.navigation(5, "https://www.youtube.com/", None);
    background.navigation(5, watch_url("aaaaaaaaaaa"), None);

    match next_event(&mut events).await {
        SummaryEvent::Completed {
            tab_id, summary, ..
        } => {
            assert_eq!(tab_id, 5);
            assert_eq!(summary, "auto summary");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn auto_summarize_off_ignores_settled_navigation() {
    let engine = ScriptedEngine::constant("auto summary");
    let transcripts = MemoryTranscripts::new();
    transcripts.insert("aaaaaaaaaaa", "auto transcript");
    let background = background(
        ScriptedFactory::new(engine.clone()),
        transcripts.clone(),
        false,
    );
    background.start();

    background.navigation(5, watch_url("aaaaaaaaaaa"), None);
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(transcripts.requests(), 0);
    assert_eq!(engine.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failures_are_pushed_as_localized_messages() {
    let engine = ScriptedEngine::constant("unused");
    let transcripts = MemoryTranscripts::new();
    transcripts.insert_error(
        "aaaaaaaaaaa",
        TranscriptError::PageDisconnected("frame detached".to_string()),
    );
    let background = background(ScriptedFactory::new(engine), transcripts, false);
    background.start();
    ready(&background).await;
    let mut events = background.subscribe();

    background.navigation(1, watch_url("aaaaaaaaaaa"), None);
    let err = background
        .summarize_tab(SummarizeRequest {
            language: Language::Ja,
            ..request(1)
        })
        .await
        .unwrap_err();

    assert_eq!(
        next_event(&mut events).await,
        SummaryEvent::Failed {
            tab_id: 1,
            message: err.user_message(Language::Ja),
        }
    );

    background.navigation(2, "https://www.youtube.com/feed/trending", None);
    assert_eq!(
        background.summarize_tab(request(2)).await,
        Err(SummarizeError::UnsupportedPage)
    );
}

#[tokio::test(start_paused = true)]
async fn settings_and_history_updates() {
    let engine = ScriptedEngine::constant("kept");
    let transcripts = MemoryTranscripts::new();
    transcripts.insert("aaaaaaaaaaa", "words");
    let background = background(ScriptedFactory::new(engine), transcripts, false);
    background.start();
    ready(&background).await;

    background.set_language(Language::Zh).unwrap();
    background.set_tier(Tier::Premium).unwrap();
    background.set_auto_summarize(true).unwrap();
    let settings = background.settings();
    assert_eq!(settings.language, Language::Zh);
    assert_eq!(settings.tier, Tier::Premium);
    assert!(settings.auto_summarize);

    background.navigation(1, watch_url("aaaaaaaaaaa"), None);
    background.summarize_tab(request(1)).await.unwrap();
    assert!(background.forget("aaaaaaaaaaa").unwrap());
    assert!(!background.forget("aaaaaaaaaaa").unwrap());
    assert!(background.history().is_empty());
    background.shutdown();
}

#[tokio::test(start_paused = true)]
async fn generation_failure_on_crashed_engine_triggers_rebuild() {
    let crashed = Arc::new(AtomicBool::new(false));
    let flag = crashed.clone();
    let engine = ScriptedEngine::new(move |_, _| {
        if flag.load(Ordering::SeqCst) {
            Err(InferenceError::Network("engine crashed".to_string()))
        } else {
            Ok("fine".to_string())
        }
    });
    let factory = ScriptedFactory::new(engine.clone());
    let transcripts = MemoryTranscripts::new();
    transcripts.insert("aaaaaaaaaaa", "words");
    let background = background(factory.clone(), transcripts, false);
    background.start();
    ready(&background).await;
    background.navigation(1, watch_url("aaaaaaaaaaa"), None);

    crashed.store(true, Ordering::SeqCst);
    engine.set_probe_fails(true);
    let result = background.summarize_tab(request(1)).await;
    assert_eq!(
        result,
        Err(SummarizeError::GenerationFailed(
            "network error: engine crashed".to_string()
        ))
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(background.engine_state().is_initializing());
    assert_eq!(background.lifecycle().construction_count(), 2);

    crashed.store(false, Ordering::SeqCst);
    engine.set_probe_fails(false);
    ready(&background).await;
    let refreshed = SummarizeRequest {
        refresh: true,
        ..request(1)
    };
    assert_eq!(background.summarize_tab(refreshed).await, Ok("fine".to_string()));
    assert_eq!(factory.created(), 2);
}
