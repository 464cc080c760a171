#![allow(dead_code)]

#[cfg(unix)]
pub mod uci;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pawnstar::config::AssistantConfig;
use pawnstar::engine::{build_suggestion, ensure_playable, Analyzer, Suggestion};
use pawnstar::error::AssistantError;
use pawnstar::events::{EventReceiver, SessionEvent};
use pawnstar::scraper::{MoveSource, ScrapeError};
use pawnstar::stockfish::SearchInfo;
use shakmaty::Chess;

pub fn moves(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|s| s.to_string()).collect()
}

/// A move source that plays back queued responses, then keeps returning the
/// last successful one like a page that stopped changing.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    script: Arc<Mutex<VecDeque<Result<Vec<String>, ScrapeError>>>>,
    steady: Arc<Mutex<Vec<String>>>,
    pub scrapes: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_moves(&self, tokens: &[&str]) {
        self.push(Ok(moves(tokens)));
    }

    pub fn push(&self, response: Result<Vec<String>, ScrapeError>) {
        self.script.lock().unwrap().push_back(response);
    }
}

impl MoveSource for ScriptedSource {
    async fn scrape(&mut self) -> Result<Vec<String>, ScrapeError> {
        self.scrapes.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(tokens)) => {
                *self.steady.lock().unwrap() = tokens.clone();
                Ok(tokens)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.steady.lock().unwrap().clone()),
        }
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// An analyzer that answers instantly with the first legal move.
#[derive(Clone, Default)]
pub struct FakeEngine {
    pub calls: Arc<AtomicUsize>,
    pub restarts: Arc<AtomicUsize>,
    pub shutdowns: Arc<AtomicUsize>,
}

impl Analyzer for FakeEngine {
    async fn analyse(
        &mut self,
        position: &Chess,
        _budget: Duration,
    ) -> Result<Suggestion, AssistantError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ensure_playable(position)?;
        build_suggestion(position, &SearchInfo::default())
    }

    async fn restart(&mut self) -> Result<(), AssistantError> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Configuration with a placeholder engine path and optional flags.
pub fn config(args: &[&str]) -> AssistantConfig {
    config_with_engine("/usr/bin/stockfish", args)
}

pub fn config_with_engine(engine: &str, args: &[&str]) -> AssistantConfig {
    let vars: HashMap<&str, &str> = HashMap::from([("STOCKFISH_PATH", engine)]);
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    AssistantConfig::from_vars(|key| vars.get(key).map(|v| v.to_string()), &args)
        .expect("test config")
}

/// Everything currently queued on the event channel.
pub fn drain(rx: &mut EventReceiver) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn board_updates(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SessionEvent::BoardUpdated(_)))
        .count()
}
