//! Polling and reconciliation loop.
//!
//! Every tick scrapes the move list and compares it with the last accepted
//! sequence by length and fingerprint. A change is reconciled (replayed from
//! the start) only once the minimum update spacing has passed, and it is
//! committed only if the *applied* moves differ from what was accepted
//! before, so scrape jitter that replays identically stays silent.
//!
//! ```text
//! Idle -> Polling -> (Unchanged | Reconciling) -> Polling -> ... -> Stopped
//! ```

use std::sync::Arc;
use std::time::Duration;

use chess_core::{replay, Fingerprint, MoveSequence, Reconstruction, ReplayMode, UserColor};
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::engine::{suggest_for, Analyzer};
use crate::events::{EventSender, SessionEvent};
use crate::scraper::{MoveSource, ScrapeError};

/// Backed-off interval = poll interval times this, capped at `max_backoff`
const BACKOFF_FACTOR: u32 = 3;

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub poll_interval: Duration,
    /// Minimum spacing between accepted updates; never above `poll_interval`
    pub min_update_interval: Duration,
    pub max_backoff: Duration,
    /// Consecutive failures before the interval is stretched
    pub backoff_threshold: u32,
    pub auto_suggest: bool,
    pub user_color: Option<UserColor>,
    /// Engine budget for auto-suggestions
    pub suggest_budget: Duration,
    pub replay_mode: ReplayMode,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            min_update_interval: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            backoff_threshold: 5,
            auto_suggest: false,
            user_color: None,
            suggest_budget: Duration::from_millis(1500),
            replay_mode: ReplayMode::Strict,
        }
    }
}

/// Handles shared by the session and its poller.
pub struct SessionContext<S, E> {
    pub source: Arc<Mutex<S>>,
    pub engine: Arc<Mutex<E>>,
    /// Last reconstructed position; `None` until the first update
    pub board: Arc<Mutex<Option<Reconstruction>>>,
}

impl<S, E> SessionContext<S, E> {
    pub fn new(source: S, engine: E) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            engine: Arc::new(Mutex::new(engine)),
            board: Arc::new(Mutex::new(None)),
        }
    }
}

impl<S, E> Clone for SessionContext<S, E> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            engine: Arc::clone(&self.engine),
            board: Arc::clone(&self.board),
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Scrape came back empty
    NoSignal,
    /// Same length and fingerprint as the accepted sequence
    Unchanged,
    /// Changed, but the minimum update spacing has not passed
    Throttled,
    /// Replayed to the same applied moves as before; nothing published
    ReplayedIdentical,
    /// New position accepted and published
    Committed,
}

/// Change detection state: what was last accepted, when, and how many
/// failures happened since.
#[derive(Debug, Default)]
pub struct Reconciler {
    last_count: usize,
    last_fingerprint: Option<Fingerprint>,
    last_update: Option<Instant>,
    error_count: u32,
    /// Scraped sequence known to replay to the accepted moves
    noise: Option<Fingerprint>,
}

impl Reconciler {
    pub fn last_count(&self) -> usize {
        self.last_count
    }

    pub fn last_fingerprint(&self) -> Option<Fingerprint> {
        self.last_fingerprint
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Length or content differs from the accepted sequence.
    pub fn is_change(&self, moves: &MoveSequence) -> bool {
        moves.len() != self.last_count || moves.fingerprint() != self.last_fingerprint
    }

    /// The first update is never throttled.
    pub fn spacing_elapsed(&self, now: Instant, min_update_interval: Duration) -> bool {
        self.last_update
            .map_or(true, |at| now.saturating_duration_since(at) >= min_update_interval)
    }

    pub fn should_reconcile(
        &self,
        scraped: &MoveSequence,
        now: Instant,
        min_update_interval: Duration,
    ) -> bool {
        !scraped.is_empty()
            && self.is_change(scraped)
            && self.spacing_elapsed(now, min_update_interval)
    }

    /// Accept `applied` if it differs from the accepted sequence. Returns
    /// whether anything was committed.
    pub fn commit(&mut self, applied: &MoveSequence, now: Instant) -> bool {
        if !self.is_change(applied) {
            return false;
        }
        self.last_count = applied.len();
        self.last_fingerprint = applied.fingerprint();
        self.last_update = Some(now);
        self.error_count = 0;
        self.noise = None;
        true
    }

    /// Remember a scrape that replayed to the accepted moves.
    pub fn mark_noise(&mut self, scraped: &MoveSequence) {
        self.noise = scraped.fingerprint();
    }

    pub fn is_noise(&self, scraped: &MoveSequence) -> bool {
        self.noise.is_some() && scraped.fingerprint() == self.noise
    }

    pub fn record_failure(&mut self) -> u32 {
        self.error_count += 1;
        self.error_count
    }

    pub fn record_success(&mut self) {
        self.error_count = 0;
    }

    /// Wait before the next tick, stretched after repeated failures.
    pub fn next_wait(&self, settings: &PollerSettings) -> Duration {
        if self.error_count >= settings.backoff_threshold {
            settings
                .poll_interval
                .saturating_mul(BACKOFF_FACTOR)
                .min(settings.max_backoff)
        } else {
            settings.poll_interval
        }
    }
}

pub struct Poller<S, E> {
    ctx: SessionContext<S, E>,
    settings: watch::Receiver<PollerSettings>,
    stop: watch::Receiver<bool>,
    events: EventSender,
    reconciler: Reconciler,
}

impl<S, E> Poller<S, E>
where
    S: MoveSource + 'static,
    E: Analyzer + 'static,
{
    pub fn new(
        ctx: SessionContext<S, E>,
        settings: watch::Receiver<PollerSettings>,
        stop: watch::Receiver<bool>,
        events: EventSender,
    ) -> Self {
        Self {
            ctx,
            settings,
            stop,
            events,
            reconciler: Reconciler::default(),
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn next_wait(&self) -> Duration {
        self.reconciler.next_wait(&self.settings.borrow())
    }

    /// One scrape-compare-reconcile step.
    pub async fn tick(&mut self, now: Instant) -> Result<TickOutcome, ScrapeError> {
        let settings = self.settings.borrow().clone();

        let scraped = {
            let mut source = self.ctx.source.lock().await;
            source.scrape().await
        };
        let scraped = match scraped {
            Ok(tokens) => MoveSequence::new(tokens),
            Err(e) => {
                let errors = self.reconciler.record_failure();
                warn!(error = %e, errors, "Auto-update worker error");
                if errors == settings.backoff_threshold {
                    warn!(errors, "Too many auto-update errors, slowing down");
                }
                return Err(e);
            }
        };

        if scraped.is_empty() {
            return Ok(TickOutcome::NoSignal);
        }
        self.reconciler.record_success();

        if !self
            .reconciler
            .should_reconcile(&scraped, now, settings.min_update_interval)
        {
            if !self.reconciler.is_change(&scraped) {
                return Ok(TickOutcome::Unchanged);
            }
            debug!(count = scraped.len(), "Change seen inside update spacing, deferring");
            return Ok(TickOutcome::Throttled);
        }
        if self.reconciler.is_noise(&scraped) {
            return Ok(TickOutcome::ReplayedIdentical);
        }

        let reconstruction = replay(scraped.tokens(), settings.replay_mode);
        for skipped in reconstruction.skipped() {
            warn!(
                index = skipped.index,
                token = %skipped.token,
                error = %skipped.error,
                "Could not parse move"
            );
        }

        let previous = self.reconciler.last_count();
        if !self.reconciler.commit(reconstruction.applied(), now) {
            debug!(
                scraped = scraped.len(),
                applied = reconstruction.applied().len(),
                "Scrape differed but replayed to the accepted moves"
            );
            self.reconciler.mark_noise(&scraped);
            return Ok(TickOutcome::ReplayedIdentical);
        }
        info!(
            from = previous,
            to = reconstruction.applied().len(),
            "Auto-detected move change"
        );

        *self.ctx.board.lock().await = Some(reconstruction.clone());
        let _ = self
            .events
            .send(SessionEvent::BoardUpdated(reconstruction.clone()));

        self.auto_suggest(&reconstruction, &settings).await;

        Ok(TickOutcome::Committed)
    }

    /// Ask the engine once if it is now the user's turn.
    async fn auto_suggest(&self, reconstruction: &Reconstruction, settings: &PollerSettings) {
        if !settings.auto_suggest {
            return;
        }
        let Some(color) = settings.user_color else {
            return;
        };
        if reconstruction.side_to_move() != color {
            return;
        }

        info!(%color, "It's your turn, getting auto-suggestion");
        let mut engine = self.ctx.engine.lock().await;
        match suggest_for(
            &mut *engine,
            reconstruction.position(),
            color,
            settings.suggest_budget,
        )
        .await
        {
            Ok(suggestion) => {
                info!(best_move = %suggestion.move_san, "Auto-suggestion");
                let _ = self.events.send(SessionEvent::Suggestion { color, suggestion });
            }
            Err(e) => {
                warn!(error = %e, "Auto-suggestion error");
                let _ = self
                    .events
                    .send(SessionEvent::Error(format!("Auto-suggestion error: {e}")));
            }
        }
    }

    /// Poll until stopped or the browser session is lost.
    pub async fn run(mut self) {
        info!(interval = ?self.settings.borrow().poll_interval, "Auto-update worker started");

        // An in-flight tick is dropped as soon as stop is signalled
        let mut stop = self.stop.clone();
        loop {
            if *stop.borrow() {
                break;
            }

            let outcome = tokio::select! {
                outcome = self.tick(Instant::now()) => outcome,
                _ = stop.changed() => break,
            };
            match outcome {
                Ok(_) | Err(ScrapeError::Transient(_)) => {}
                Err(ScrapeError::SessionLost(msg)) => {
                    error!(error = %msg, "Browser session lost, stopping auto-update");
                    let _ = self
                        .events
                        .send(SessionEvent::Error(format!("Browser session lost: {msg}")));
                    break;
                }
            }

            let wait = self.next_wait();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Auto-update worker stopped");
        let _ = self.events.send(SessionEvent::PollerStopped);
    }
}
