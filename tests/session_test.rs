//! Integration tests for the session surface the console drives.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use chess_core::UserColor;
use common::{config, drain, FakeEngine, ScriptedSource};
use pawnstar::config::interval_from_secs;
use pawnstar::error::AssistantError;
use pawnstar::events::{self, SessionEvent};
use pawnstar::session::Session;

#[tokio::test]
async fn test_suggest_requires_color() {
    let (tx, _rx) = events::channel();
    let session = Session::new(ScriptedSource::new(), FakeEngine::default(), config(&[]), tx);

    assert!(matches!(
        session.suggest().await,
        Err(AssistantError::ColorNotSet)
    ));
}

#[tokio::test]
async fn test_suggest_reads_board_first() {
    let source = ScriptedSource::new();
    source.push_moves(&["1.", "e4", "c5", "2.", "Nf3"]);
    let engine = FakeEngine::default();
    let (tx, _rx) = events::channel();
    let session = Session::new(source.clone(), engine.clone(), config(&["--color", "black"]), tx);

    let suggestion = session.suggest().await.unwrap();
    assert!(!suggestion.move_san.is_empty());
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);

    let board = session.current().await.unwrap();
    assert_eq!(board.applied().len(), 3);
    assert_eq!(board.side_to_move(), UserColor::Black);
}

#[tokio::test]
async fn test_suggest_on_finished_game_reports_result() {
    let source = ScriptedSource::new();
    source.push_moves(&["f3", "e5", "g4", "Qh4#"]);
    let (tx, _rx) = events::channel();
    let session = Session::new(source, FakeEngine::default(), config(&["--color", "white"]), tx);

    session.update_board().await.unwrap();
    match session.suggest().await {
        Err(AssistantError::GameOver(result)) => assert_eq!(result, "0-1"),
        other => panic!("expected game over, got {other:?}"),
    }
}

#[tokio::test]
async fn test_update_with_empty_page_keeps_board() {
    let source = ScriptedSource::new();
    source.push_moves(&["e4"]);
    source.push_moves(&[]);
    let (tx, _rx) = events::channel();
    let session = Session::new(source, FakeEngine::default(), config(&[]), tx);

    session.update_board().await.unwrap();
    let again = session.update_board().await.unwrap();
    assert_eq!(again.applied().tokens(), ["e4"]);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_a_no_op() {
    let source = ScriptedSource::new();
    source.push_moves(&["e4"]);
    let (tx, mut rx) = events::channel();
    let mut session = Session::new(source.clone(), FakeEngine::default(), config(&[]), tx);

    assert!(session.start_polling());
    assert!(!session.start_polling());
    assert!(session.is_polling());

    tokio::time::sleep(Duration::from_millis(100)).await;
    session.stop_polling().await;
    assert!(!session.is_polling());

    let events = drain(&mut rx);
    assert_eq!(common::board_updates(&events), 1);
    assert!(matches!(events.last(), Some(SessionEvent::PollerStopped)));

    // a stopped poller can be started again
    assert!(session.start_polling());
    session.stop_polling().await;
}

#[tokio::test(start_paused = true)]
async fn test_color_change_reaches_running_poller() {
    let source = ScriptedSource::new();
    let engine = FakeEngine::default();
    let (tx, mut rx) = events::channel();
    let mut session = Session::new(source.clone(), engine.clone(), config(&["--suggest"]), tx);

    session.start_polling();
    tokio::time::sleep(Duration::from_millis(100)).await;

    session.set_user_color(UserColor::Black);
    source.push_moves(&["d4"]);
    tokio::time::sleep(Duration::from_secs(3)).await;

    session.stop_polling().await;
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::Suggestion { color: UserColor::Black, .. })));
}

#[tokio::test]
async fn test_analysis_time_is_clamped() {
    let (tx, _rx) = events::channel();
    let mut session = Session::new(ScriptedSource::new(), FakeEngine::default(), config(&[]), tx);

    assert_eq!(session.set_analysis_time(0.01), Duration::from_millis(100));
    assert_eq!(session.set_analysis_time(25.0), Duration::from_secs(10));
    assert_eq!(session.config().analysis_time, Duration::from_secs(10));
}

#[tokio::test]
async fn test_poll_interval_keeps_spacing_consistent() {
    let (tx, _rx) = events::channel();
    let mut session = Session::new(ScriptedSource::new(), FakeEngine::default(), config(&[]), tx);

    session.set_poll_interval(Duration::from_millis(500));
    assert_eq!(session.config().poll_interval, Duration::from_millis(500));
    assert!(session.config().min_update_interval <= session.config().poll_interval);
}

#[tokio::test]
async fn test_huge_interval_command_is_capped() {
    let (tx, _rx) = events::channel();
    let mut session = Session::new(ScriptedSource::new(), FakeEngine::default(), config(&[]), tx);

    session.set_poll_interval(interval_from_secs(1e20));
    assert_eq!(session.config().poll_interval, Duration::from_secs(3600));
    assert_eq!(session.config().max_backoff, Duration::from_secs(3 * 3600));

    session.set_poll_interval(interval_from_secs(f64::NAN));
    assert_eq!(session.config().poll_interval, Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_close_tears_everything_down() {
    let source = ScriptedSource::new();
    let engine = FakeEngine::default();
    let (tx, _rx) = events::channel();
    let mut session = Session::new(source.clone(), engine.clone(), config(&[]), tx);

    session.start_polling();
    session.check_engine().await.unwrap();
    session.close().await;

    assert_eq!(engine.restarts.load(Ordering::SeqCst), 1);
    assert_eq!(engine.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(source.closes.load(Ordering::SeqCst), 1);
}
