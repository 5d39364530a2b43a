//! End-to-end navigation scenarios through a real dispatcher thread.
//!
//! Pages are played back by the simulated engine with a short stability
//! window so the whole file runs in a few seconds.

use reliant::{
    Dialog, DialogAction, Harness, HarnessConfig, HarnessError, NavigationRequest, Outcome,
    RecordingEngine, SimulatedEngine, SslDecision,
};
use std::time::{Duration, Instant};

const WINDOW_MS: u64 = 100;

fn config() -> HarnessConfig {
    HarnessConfig::default().with_stability_delay(WINDOW_MS)
}

fn simulated() -> Harness {
    Harness::spawn(config(), |sink| Ok(SimulatedEngine::new(sink))).unwrap()
}

// ============================================================================
// Page outcomes
// ============================================================================

#[test]
fn fast_page_completes_one_window_after_finish() {
    let harness = simulated();
    harness.reset().unwrap();
    harness.navigate("sim://fast?latency=20", 5_000).unwrap();

    let report = harness.wait_for_report().unwrap().unwrap();
    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.load_starts, 1);
    assert!(report.elapsed_ms >= 20 + WINDOW_MS);
    assert!(report.elapsed_ms < 5_000);
}

#[test]
fn hanging_page_times_out_with_progress() {
    let harness = simulated();
    harness.reset().unwrap();
    let start = Instant::now();
    harness.navigate("sim://stuck?latency=10&hang=1", 400).unwrap();

    assert!(harness.wait_until_done().unwrap());
    assert!(start.elapsed() >= Duration::from_millis(400));
}

#[test]
fn hanging_page_report_carries_progress() {
    let harness = simulated();
    harness.navigate("sim://stuck?latency=10&hang=1", 300).unwrap();
    let report = harness.wait_for_report().unwrap().unwrap();
    assert_eq!(report.outcome, Outcome::TimedOut);
    assert_eq!(report.progress_at_timeout, Some(60));
}

#[test]
fn redirect_chain_waits_for_last_hop() {
    let harness = simulated();
    let url = "sim://chain?latency=30&redirects=3&title=Landing";
    harness.navigate(url, 5_000).unwrap();

    let report = harness.wait_for_report().unwrap().unwrap();
    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.load_starts, 4);
    assert_eq!(report.final_url.as_deref(), Some(url));
    assert_eq!(report.title.as_deref(), Some("Landing"));
    // four hops of 30ms each before the window can even start
    assert!(report.elapsed_ms >= 4 * 30 + WINDOW_MS);
}

#[test]
fn script_timeouts_are_counted() {
    let harness = simulated();
    harness
        .navigate("sim://busy?latency=10&script_timeouts=3", 5_000)
        .unwrap();
    let report = harness.wait_for_report().unwrap().unwrap();
    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.script_timeouts, 3);
}

#[test]
fn settle_delay_extends_completion() {
    let harness = simulated();
    harness
        .navigate_with(NavigationRequest::new("sim://fast?latency=10", 5_000).with_settle(200))
        .unwrap();
    let report = harness.wait_for_report().unwrap().unwrap();
    assert_eq!(report.outcome, Outcome::Completed);
    assert!(report.elapsed_ms >= 10 + WINDOW_MS + 200);
}

// ============================================================================
// Sequencing
// ============================================================================

#[test]
fn url_sequence_with_reset_between() {
    let harness = simulated();
    let urls = [
        ("sim://a?latency=10", 2_000, false),
        ("sim://b?latency=10&hang=1", 200, true),
        ("sim://c?latency=10&redirects=1", 2_000, false),
    ];
    for (epoch, (url, timeout, expect_timeout)) in urls.iter().enumerate() {
        harness.reset().unwrap();
        harness.navigate(*url, *timeout).unwrap();
        let report = harness.wait_for_report().unwrap().unwrap();
        assert_eq!(report.timed_out(), *expect_timeout, "{url}");
        assert_eq!(report.epoch, epoch as u64 + 1);
        assert_eq!(report.url, *url);
    }
    harness.navigate("", 0).unwrap();
    harness.join();
    assert!(harness.is_shut_down());
}

#[test]
fn second_navigation_before_wait_is_rejected() {
    let harness = simulated();
    harness.navigate("sim://slow?latency=300", 5_000).unwrap();
    assert!(matches!(
        harness.navigate("sim://other", 5_000),
        Err(HarnessError::NavigationInFlight { .. })
    ));
    assert!(!harness.wait_until_done().unwrap());
    harness.reset().unwrap();
    harness.navigate("sim://other?latency=10", 5_000).unwrap();
    assert!(!harness.wait_until_done().unwrap());
}

#[test]
fn empty_url_shuts_down_without_loading() {
    let engine = RecordingEngine::new();
    let observed = engine.clone();
    let harness = Harness::spawn(config(), move |_| Ok(engine)).unwrap();

    harness.navigate("", 1_000).unwrap();
    harness.join();
    assert!(observed.loaded_urls().is_empty());
    assert!(matches!(harness.wait_until_done(), Err(HarnessError::ShutDown)));
}

// ============================================================================
// Callback policies
// ============================================================================

#[test]
fn script_timeout_answers_debounce() {
    let harness = Harness::spawn(config(), |_| Ok(RecordingEngine::new())).unwrap();
    let sink = harness.event_sink();
    harness.reset().unwrap();
    harness.navigate("http://example/busy", 0).unwrap();

    let answers: Vec<bool> = (0..3)
        .map(|_| sink.script_timeout().blocking_recv().unwrap())
        .collect();
    assert_eq!(answers, vec![false, false, true]);
}

#[test]
fn certificate_and_auth_answered_from_policy() {
    let url = "sim://bank?latency=10&certificate_error&auth";

    let harness = simulated();
    harness.navigate(url, 5_000).unwrap();
    let report = harness.wait_for_report().unwrap().unwrap();
    assert_eq!(report.outcome, Outcome::Completed);
    // certificate ignored, auth cancelled
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].description.contains("authentication"));

    let strict = config().with_ssl_errors(SslDecision::Cancel);
    let harness = Harness::spawn(strict, |sink| Ok(SimulatedEngine::new(sink))).unwrap();
    harness.navigate(url, 5_000).unwrap();
    let report = harness.wait_for_report().unwrap().unwrap();
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors[0].description.contains("certificate"));
}

#[test]
fn prompt_dialog_accepts_default_value() {
    let harness = Harness::spawn(config(), |_| Ok(RecordingEngine::new())).unwrap();
    let sink = harness.event_sink();
    let action = sink
        .dialog(Dialog::prompt("Your name?", Some("guest".to_string())))
        .blocking_recv()
        .unwrap();
    assert_eq!(action, DialogAction::AcceptWith("guest".to_string()));
}

#[test]
fn wait_returns_false_when_idle() {
    let harness = simulated();
    assert!(!harness.wait_until_done().unwrap());
    assert!(harness
        .wait_until_done_timeout(Duration::from_millis(10))
        .unwrap()
        .is_none());
}
