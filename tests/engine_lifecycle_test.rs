//! Processing loop start/stop behaviour

use std::sync::Arc;
use std::time::Duration;

use scrape_relay::engine::LoopOptions;
use scrape_relay::error::{ErrorKind, ScrapeError};

mod common;
use common::{FakeEngine, PageScript, article_html, harness, unit};

fn options(concurrency: usize, idle_grace_ms: u64) -> LoopOptions {
    LoopOptions {
        concurrency,
        idle_grace: Duration::from_millis(idle_grace_ms),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ensure_running_starts_exactly_one_loop() {
    let h = harness(FakeEngine::new(), options(3, 60_000));

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let lifecycle = Arc::clone(&h.lifecycle);
        tasks.push(tokio::spawn(async move { lifecycle.ensure_running() }));
    }

    let mut started = 0;
    for task in tasks {
        if task.await.unwrap() {
            started += 1;
        }
    }

    assert_eq!(started, 1);
    assert_eq!(h.lifecycle.loops_started(), 1);
    assert!(h.lifecycle.is_running());
    h.lifecycle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unit_enqueued_before_start_is_processed_once_started() {
    let engine = FakeEngine::new();
    let h = harness(Arc::clone(&engine), options(3, 1_000));

    let mut handle = h.correlator.register("early").unwrap();
    h.lifecycle.enqueue(unit("early", "https://example.com")).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.opened(), 0);
    assert_eq!(h.lifecycle.queue_len(), 1);

    assert!(h.lifecycle.ensure_running());
    let result = h
        .correlator
        .await_result(&mut handle, Duration::from_secs(5))
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.data["title"], "Example Domain");
    assert_eq!(engine.opened(), 1);
    assert_eq!(engine.closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn loop_parks_when_idle_and_restarts_on_demand() {
    let engine = FakeEngine::new();
    let h = harness(Arc::clone(&engine), options(2, 100));

    let mut first = h.correlator.register("first").unwrap();
    h.lifecycle.enqueue(unit("first", "https://one.example")).unwrap();
    assert!(h.lifecycle.ensure_running());
    h.correlator
        .await_result(&mut first, Duration::from_secs(1))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!h.lifecycle.is_running());

    let mut second = h.correlator.register("second").unwrap();
    h.lifecycle.enqueue(unit("second", "https://two.example")).unwrap();
    assert!(h.lifecycle.ensure_running());
    let result = h
        .correlator
        .await_result(&mut second, Duration::from_secs(1))
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(h.lifecycle.loops_started(), 2);
}

#[tokio::test(start_paused = true)]
async fn loop_stays_up_while_work_keeps_arriving() {
    let h = harness(FakeEngine::new(), options(1, 300));
    assert!(h.lifecycle.ensure_running());

    for i in 0..5 {
        let id = format!("steady-{i}");
        let mut handle = h.correlator.register(id.as_str()).unwrap();
        h.lifecycle.enqueue(unit(&id, "https://example.com")).unwrap();
        assert!(!h.lifecycle.ensure_running());
        h.correlator
            .await_result(&mut handle, Duration::from_secs(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    assert_eq!(h.lifecycle.loops_started(), 1);
}

#[tokio::test(start_paused = true)]
async fn panicking_page_does_not_stop_the_loop() {
    let engine = FakeEngine::new();
    engine.script("https://panic.example", PageScript::Panic);
    let h = harness(Arc::clone(&engine), options(1, 5_000));

    let mut doomed = h.correlator.register("doomed").unwrap();
    let mut healthy = h.correlator.register("healthy").unwrap();
    h.lifecycle.enqueue(unit("doomed", "https://panic.example")).unwrap();
    h.lifecycle.enqueue(unit("healthy", "https://example.com")).unwrap();
    h.lifecycle.ensure_running();

    let failed = h
        .correlator
        .await_result(&mut doomed, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(failed.error_kind(), Some(ErrorKind::ScrapingError));
    assert_eq!(failed.meta.status, 500);

    let ok = h
        .correlator
        .await_result(&mut healthy, Duration::from_secs(1))
        .await
        .unwrap();
    assert!(ok.is_success());
    assert_eq!(h.lifecycle.loops_started(), 1);
    assert!(h.lifecycle.is_running());
}

#[tokio::test(start_paused = true)]
async fn in_flight_pages_never_exceed_concurrency() {
    let engine = FakeEngine::new();
    let h = harness(Arc::clone(&engine), options(2, 5_000));

    let mut handles = Vec::new();
    for i in 0..6 {
        let url = format!("https://slow{i}.example");
        engine.script(
            &url,
            PageScript::Slow(Duration::from_millis(200), article_html(&format!("Page {i}"), "body")),
        );
        let id = format!("slow-{i}");
        handles.push(h.correlator.register(id.as_str()).unwrap());
        h.lifecycle.enqueue(unit(&id, &url)).unwrap();
    }
    h.lifecycle.ensure_running();

    for (i, handle) in handles.iter_mut().enumerate() {
        let result = h
            .correlator
            .await_result(handle, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.data["title"], format!("Page {i}"));
    }

    assert_eq!(engine.max_in_flight(), 2);
}

#[tokio::test(start_paused = true)]
async fn pages_are_opened_in_enqueue_order() {
    let engine = FakeEngine::new();
    let h = harness(Arc::clone(&engine), options(1, 5_000));

    let urls: Vec<String> = (0..6).map(|i| format!("https://fifo{i}.example")).collect();
    let mut handles = Vec::new();
    for (i, url) in urls.iter().enumerate() {
        let id = format!("fifo-{i}");
        handles.push(h.correlator.register(id.as_str()).unwrap());
        h.lifecycle.enqueue(unit(&id, url)).unwrap();
    }
    h.lifecycle.ensure_running();

    for handle in &mut handles {
        h.correlator
            .await_result(handle, Duration::from_secs(5))
            .await
            .unwrap();
    }

    assert_eq!(engine.opened_urls(), urls);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn enqueue_racing_an_idle_park_is_never_lost() {
    let engine = FakeEngine::new();
    let h = harness(Arc::clone(&engine), options(1, 1));

    let mut expected = Vec::new();
    for round in 0..100 {
        let mut handles = Vec::new();
        for i in 0..8 {
            let id = format!("race-{round}-{i}");
            let url = format!("https://race{round}-{i}.example");
            handles.push(h.correlator.register(id.as_str()).unwrap());
            h.lifecycle.enqueue(unit(&id, &url)).unwrap();
            h.lifecycle.ensure_running();
            expected.push(url);

            // give the loop a chance to drain and park between enqueues
            if i % 2 == 0 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            } else {
                tokio::task::yield_now().await;
            }
        }

        for handle in &mut handles {
            let id = handle.id().to_string();
            let result = h
                .correlator
                .await_result(handle, Duration::from_secs(5))
                .await
                .unwrap_or_else(|e| panic!("{id} was lost: {e}"));
            assert!(result.is_success(), "{id}: {result:?}");
            h.correlator.unregister(&id);
        }
    }

    assert_eq!(engine.opened_urls(), expected);
    assert!(h.lifecycle.loops_started() > 1);
    assert_eq!(h.lifecycle.queue_len(), 0);
    h.lifecycle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_open_resolves_with_scraping_error() {
    let engine = FakeEngine::new();
    engine.script(
        "https://down.example",
        PageScript::FailOpen("net::ERR_NAME_NOT_RESOLVED".to_string()),
    );
    let h = harness(Arc::clone(&engine), options(3, 5_000));

    let mut handle = h.correlator.register("down").unwrap();
    h.lifecycle.enqueue(unit("down", "https://down.example")).unwrap();
    h.lifecycle.ensure_running();

    let result = h
        .correlator
        .await_result(&mut handle, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(result.error_kind(), Some(ErrorKind::ScrapingError));
    assert!(
        result
            .meta
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("ERR_NAME_NOT_RESOLVED")
    );
    assert!(h.store.contains("down"));
}

#[tokio::test(start_paused = true)]
async fn shutdown_resolves_everything_and_rejects_new_work() {
    let engine = FakeEngine::new();
    engine.script(
        "https://stuck.example",
        PageScript::Slow(Duration::from_secs(3_600), article_html("Never", "never")),
    );
    let h = harness(Arc::clone(&engine), options(1, 5_000));

    let mut running = h.correlator.register("running").unwrap();
    let mut queued = h.correlator.register("queued").unwrap();
    h.lifecycle.enqueue(unit("running", "https://stuck.example")).unwrap();
    h.lifecycle.enqueue(unit("queued", "https://example.com")).unwrap();
    h.lifecycle.ensure_running();
    tokio::time::sleep(Duration::from_millis(50)).await;

    h.lifecycle.shutdown().await;

    let queued = h
        .correlator
        .await_result(&mut queued, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(queued.error_kind(), Some(ErrorKind::EngineUnavailable));
    assert_eq!(queued.meta.status, 503);

    let interrupted = h
        .correlator
        .await_result(&mut running, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(interrupted.error_kind(), Some(ErrorKind::ScrapingError));

    assert!(!h.lifecycle.is_running());
    assert!(engine.is_shut_down());
    assert!(matches!(
        h.lifecycle.enqueue(unit("late", "https://example.com")),
        Err(ScrapeError::EngineFatal(_))
    ));
    assert!(!h.lifecycle.ensure_running());
}
