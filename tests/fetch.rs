mod common;

use std::{fs, time::Duration};

use common::{MockTransport, RecordingSleeper};
use icfes_dw::{
    EtlError,
    fetch::{Fetcher, RetryPolicy, cache_path_for},
};

const PAGE: &str = "https://datos.test/pagina/";

fn fetcher<'a>(
    transport: &'a MockTransport,
    sleeper: &'a RecordingSleeper,
) -> Fetcher<&'a MockTransport, &'a RecordingSleeper> {
    Fetcher::new(transport, sleeper)
}

#[test]
fn first_success_returns_body_without_sleeping() {
    let transport = MockTransport::new();
    transport.respond(PAGE, 200, "<html>ok</html>");
    let sleeper = RecordingSleeper::default();

    let body = fetcher(&transport, &sleeper).fetch(PAGE);
    assert_eq!(body.as_deref(), Some("<html>ok</html>"));
    assert_eq!(transport.request_count(), 1);
    assert!(sleeper.sleeps.borrow().is_empty());
}

#[test]
fn not_found_moves_to_the_next_variant_immediately() {
    let transport = MockTransport::new();
    transport.respond("https://datos.test/pagina", 200, "sin barra");
    let sleeper = RecordingSleeper::default();

    let body = fetcher(&transport, &sleeper).fetch(PAGE);
    assert_eq!(body.as_deref(), Some("sin barra"));
    assert_eq!(
        *transport.requests.borrow(),
        vec![PAGE.to_string(), "https://datos.test/pagina".to_string()]
    );
    assert!(sleeper.sleeps.borrow().is_empty());
}

#[test]
fn integer_retry_after_is_honoured() {
    let transport = MockTransport::new();
    transport
        .throttle(PAGE, 429, "7")
        .respond(PAGE, 200, "despues");
    let sleeper = RecordingSleeper::default();

    let body = fetcher(&transport, &sleeper).fetch(PAGE);
    assert_eq!(body.as_deref(), Some("despues"));
    assert_eq!(*sleeper.sleeps.borrow(), vec![Duration::from_secs(7)]);
}

#[test]
fn unparseable_retry_after_scales_the_throttle_base() {
    let transport = MockTransport::new();
    transport
        .throttle(PAGE, 503, "soon")
        .throttle(PAGE, 503, "Wed, 21 Oct 2026 07:28:00 GMT")
        .respond(PAGE, 200, "ok");
    let sleeper = RecordingSleeper::default();

    fetcher(&transport, &sleeper).fetch(PAGE).expect("body");
    assert_eq!(
        *sleeper.sleeps.borrow(),
        vec![Duration::from_millis(1500), Duration::from_millis(3000)]
    );
}

#[test]
fn server_errors_and_network_failures_back_off_then_recover() {
    let transport = MockTransport::new();
    transport
        .respond(PAGE, 500, "")
        .fail(PAGE, "connection reset")
        .respond(PAGE, 200, "tercera");
    let sleeper = RecordingSleeper::default();

    let body = fetcher(&transport, &sleeper).fetch(PAGE);
    assert_eq!(body.as_deref(), Some("tercera"));
    let sleeps = sleeper.sleeps.borrow();
    assert_eq!(sleeps.len(), 2);
    assert!(sleeps[0] >= Duration::from_secs(1) && sleeps[0] < Duration::from_secs(3));
    assert!(sleeps[1] >= Duration::from_secs(2) && sleeps[1] < Duration::from_secs(6));
}

#[test]
fn exhausted_attempts_yield_none_without_a_final_sleep() {
    let url = "http://datos.test/caido";
    let transport = MockTransport::new();
    for _ in 0..3 {
        transport.respond(url, 500, "");
    }
    let sleeper = RecordingSleeper::default();
    let policy = RetryPolicy {
        max_attempts: 3,
        ..RetryPolicy::default()
    };

    let body = fetcher(&transport, &sleeper).with_policy(policy).fetch(url);
    assert_eq!(body, None);
    assert_eq!(transport.request_count(), 3);
    assert_eq!(sleeper.sleeps.borrow().len(), 2);
}

#[test]
fn cached_page_is_read_without_network() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = cache_path_for(dir.path(), PAGE);
    fs::write(&path, "en disco").expect("seed cache");
    let transport = MockTransport::new();
    let sleeper = RecordingSleeper::default();

    let body = fetcher(&transport, &sleeper)
        .fetch_cached(PAGE, &path)
        .expect("cached body");
    assert_eq!(body, "en disco");
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn fetched_page_is_stored_for_the_next_run() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("html").join("pagina.html");
    let transport = MockTransport::new();
    transport.respond(PAGE, 200, "nueva");
    let sleeper = RecordingSleeper::default();
    let fetcher = fetcher(&transport, &sleeper);

    assert_eq!(fetcher.fetch_cached(PAGE, &path).expect("body"), "nueva");
    assert_eq!(fs::read_to_string(&path).expect("cache file"), "nueva");
    assert_eq!(fetcher.fetch_cached(PAGE, &path).expect("body"), "nueva");
    assert_eq!(transport.request_count(), 1);
}

#[test]
fn exhausted_cached_fetch_is_a_fetch_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("missing.html");
    let transport = MockTransport::new();
    let sleeper = RecordingSleeper::default();

    let err = fetcher(&transport, &sleeper)
        .fetch_cached(PAGE, &path)
        .unwrap_err();
    match err.downcast_ref::<EtlError>() {
        Some(EtlError::Fetch { url }) => assert_eq!(url, PAGE),
        other => panic!("expected a fetch error, got {other:?}"),
    }
    assert!(!path.exists());
}
