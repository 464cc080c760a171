//! Assistant session: owns the browser source, the engine and the poller,
//! and serves the user's commands.

use std::time::Duration;

use chess_core::{replay, MoveSequence, Reconstruction, UserColor};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{clamp_analysis_time, AssistantConfig};
use crate::engine::{suggest_for, Analyzer, Suggestion};
use crate::error::AssistantError;
use crate::events::EventSender;
use crate::poller::{Poller, PollerSettings, SessionContext};
use crate::scraper::MoveSource;

/// How long `stop_polling` waits for the poller before aborting it
const STOP_GRACE: Duration = Duration::from_secs(1);

struct PollerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct Session<S, E> {
    ctx: SessionContext<S, E>,
    config: AssistantConfig,
    settings: watch::Sender<PollerSettings>,
    events: EventSender,
    poller: Option<PollerHandle>,
}

impl<S, E> Session<S, E>
where
    S: MoveSource + 'static,
    E: Analyzer + 'static,
{
    pub fn new(source: S, engine: E, config: AssistantConfig, events: EventSender) -> Self {
        let (settings, _) = watch::channel(config.poller_settings());
        Self {
            ctx: SessionContext::new(source, engine),
            config,
            settings,
            events,
            poller: None,
        }
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn user_color(&self) -> Option<UserColor> {
        self.config.user_color
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }

    /// Spawn the poller. Returns `false` if one is already running.
    pub fn start_polling(&mut self) -> bool {
        if self.is_polling() {
            warn!("Auto-update already running");
            return false;
        }

        let (stop, stop_rx) = watch::channel(false);
        let poller = Poller::new(
            self.ctx.clone(),
            self.settings.subscribe(),
            stop_rx,
            self.events.clone(),
        );
        let task = tokio::spawn(poller.run());
        self.poller = Some(PollerHandle { stop, task });
        info!(interval = ?self.config.poll_interval, "Auto-update started");
        true
    }

    /// Signal the poller and wait briefly; abort it if it does not exit.
    ///
    /// A search cut short by the stop is settled by the engine's next call.
    /// After an abort the engine is shut down instead, so nothing the
    /// aborted task started can answer a later request.
    pub async fn stop_polling(&mut self) {
        let Some(handle) = self.poller.take() else {
            return;
        };
        let _ = handle.stop.send(true);

        let mut task = handle.task;
        if tokio::time::timeout(STOP_GRACE, &mut task).await.is_err() {
            warn!("Auto-update worker did not stop in time, aborting");
            task.abort();
            let _ = task.await;
            self.ctx.engine.lock().await.shutdown().await;
        }
    }

    pub fn set_user_color(&mut self, color: UserColor) {
        self.config.user_color = Some(color);
        self.publish_settings();
        info!(%color, "User color set");
    }

    pub fn set_auto_suggest(&mut self, enabled: bool) {
        self.config.auto_suggest = enabled;
        self.publish_settings();
        info!(enabled, "Auto-suggest toggled");
    }

    /// Takes effect on the poller's next wait.
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.config.set_poll_interval(interval);
        self.publish_settings();
        info!(interval = ?self.config.poll_interval, "Update interval changed");
    }

    /// Set the budget for user-requested analysis, clamped to the allowed range.
    pub fn set_analysis_time(&mut self, secs: f64) -> Duration {
        self.config.analysis_time = clamp_analysis_time(secs);
        self.config.analysis_time
    }

    fn publish_settings(&self) {
        self.settings.send_replace(self.config.poller_settings());
    }

    /// The last accepted position, if any update has happened yet.
    pub async fn current(&self) -> Option<Reconstruction> {
        self.ctx.board.lock().await.clone()
    }

    /// Scrape and replay right now, outside the poller.
    pub async fn update_board(&self) -> Result<Reconstruction, AssistantError> {
        let tokens = {
            let mut source = self.ctx.source.lock().await;
            source.scrape().await?
        };

        let mut board = self.ctx.board.lock().await;
        if tokens.is_empty() {
            warn!("No moves found, keeping current board");
            return Ok(board.clone().unwrap_or_default());
        }

        let moves = MoveSequence::new(tokens);
        let reconstruction = replay(moves.tokens(), self.config.replay_mode);
        for skipped in reconstruction.skipped() {
            warn!(index = skipped.index, token = %skipped.token, error = %skipped.error, "Could not parse move");
        }
        info!(
            scraped = moves.len(),
            applied = reconstruction.applied().len(),
            "Board updated"
        );
        *board = Some(reconstruction.clone());
        Ok(reconstruction)
    }

    /// Best move for the user's color in the current position.
    pub async fn suggest(&self) -> Result<Suggestion, AssistantError> {
        let color = self.config.user_color.ok_or(AssistantError::ColorNotSet)?;

        let reconstruction = match self.current().await {
            Some(r) => r,
            None => match self.update_board().await {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "Could not read the board, using the starting position");
                    Reconstruction::default()
                }
            },
        };

        let mut engine = self.ctx.engine.lock().await;
        let suggestion = suggest_for(
            &mut *engine,
            reconstruction.position(),
            color,
            self.config.analysis_time,
        )
        .await?;
        info!(%color, best_move = %suggestion.move_san, "Suggestion ready");
        Ok(suggestion)
    }

    /// Restart the engine to confirm it is responsive.
    pub async fn check_engine(&self) -> Result<(), AssistantError> {
        let mut engine = self.ctx.engine.lock().await;
        engine.restart().await?;
        info!("Engine restarted and responding");
        Ok(())
    }

    /// Tear down in order: poller, engine, browser.
    pub async fn close(mut self) {
        self.stop_polling().await;
        self.ctx.engine.lock().await.shutdown().await;
        self.ctx.source.lock().await.close().await;
        info!("Session closed");
    }
}
