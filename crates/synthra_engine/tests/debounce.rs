mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{init_logging, watch_url};
use pretty_assertions::assert_eq;
use synthra_core::TabId;
use synthra_engine::{NavigationDebouncer, NavigationSink};

const WINDOW: Duration = Duration::from_millis(1500);

#[derive(Default)]
struct RecordingSink {
    settled: Mutex<Vec<(TabId, String)>>,
}

impl NavigationSink for RecordingSink {
    fn settled(&self, tab_id: TabId, url: String) {
        self.settled.lock().unwrap().push((tab_id, url));
    }
}

impl RecordingSink {
    fn take(&self) -> Vec<(TabId, String)> {
        std::mem::take(&mut *self.settled.lock().unwrap())
    }
}

fn debouncer() -> (NavigationDebouncer, Arc<RecordingSink>) {
    init_logging();
    let sink = Arc::new(RecordingSink::default());
    (NavigationDebouncer::new(WINDOW, sink.clone()), sink)
}

#[tokio::test(start_paused = true)]
async fn burst_settles_once_on_the_last_url() {
    let (debouncer, sink) = debouncer();

    for id in ["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"] {
        debouncer.observe(7, watch_url(id));
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    assert!(sink.take().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(sink.take(), vec![(7, watch_url("ccccccccccc"))]);
    assert_eq!(debouncer.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn repeated_url_does_not_restart_the_window() {
    let (debouncer, sink) = debouncer();

    debouncer.observe(1, watch_url("aaaaaaaaaaa"));
    tokio::time::sleep(Duration::from_secs(1)).await;
    debouncer.observe(1, watch_url("aaaaaaaaaaa"));
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(sink.take(), vec![(1, watch_url("aaaaaaaaaaa"))]);
}

#[tokio::test(start_paused = true)]
async fn non_video_pages_are_dropped_silently() {
    let (debouncer, sink) = debouncer();

    debouncer.observe(1, "https://www.youtube.com/feed/subscriptions");
    debouncer.observe(2, "https://example.com/watch?v=aaaaaaaaaaa");
    assert_eq!(debouncer.pending_count(), 2);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(sink.take().is_empty());
    assert_eq!(debouncer.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_discards_the_pending_notification() {
    let (debouncer, sink) = debouncer();

    debouncer.observe(3, watch_url("aaaaaaaaaaa"));
    assert_eq!(debouncer.pending_url(3), Some(watch_url("aaaaaaaaaaa")));
    assert!(debouncer.cancel(3));
    assert!(!debouncer.cancel(3));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(sink.take().is_empty());
}

#[tokio::test(start_paused = true)]
async fn tabs_settle_independently() {
    let (debouncer, sink) = debouncer();

    debouncer.observe(1, watch_url("aaaaaaaaaaa"));
    tokio::time::sleep(Duration::from_millis(1000)).await;
    debouncer.observe(2, watch_url("bbbbbbbbbbb"));
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(sink.take(), vec![(1, watch_url("aaaaaaaaaaa"))]);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(sink.take(), vec![(2, watch_url("bbbbbbbbbbb"))]);
}
