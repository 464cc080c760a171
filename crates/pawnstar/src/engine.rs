//! Engine adapter: turns a position into a move suggestion.
//!
//! [`EngineAdapter`] owns at most one Stockfish process, starts it lazily and
//! restarts it once when it is found dead. Callers bound every call with
//! [`analyse_with_watchdog`], which tears the process down when the engine
//! stops answering.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chess_core::notation::{move_to_uci, uci_line_to_san, uci_to_san};
use chess_core::replay::{game_result, hand_move_to, position_fen};
use chess_core::UserColor;
use shakmaty::san::San;
use shakmaty::{Chess, Position};
use tracing::{info, warn};

use crate::config::EngineSettings;
use crate::error::AssistantError;
use crate::stockfish::{SearchInfo, StockfishEngine};

/// Depth limit sent with every search
pub const SEARCH_DEPTH: u32 = 15;

/// Longest movetime ever sent to the engine
pub const MAX_MOVETIME: Duration = Duration::from_secs(3);

/// Budget for the retry after an engine restart
pub const RETRY_BUDGET: Duration = Duration::from_secs(1);

/// Slack the watchdog grants on top of the search budget
pub const WATCHDOG_GRACE: Duration = Duration::from_secs(5);

/// Moves kept in a suggestion's principal variation
pub const PV_LENGTH: usize = 3;

/// Engine evaluation from the side to move's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    Mate(i32),
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Score::Centipawns(cp) => write!(f, "{:+.2}", cp as f64 / 100.0),
            Score::Mate(n) if n > 0 => write!(f, "Mate in {n}"),
            Score::Mate(n) => write!(f, "Mate in {} (opponent)", n.abs()),
        }
    }
}

/// Best move plus whatever metadata the engine reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub move_san: String,
    pub move_uci: String,
    pub score: Option<Score>,
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
    pub elapsed: Option<Duration>,
    /// Short principal variation in SAN, starting with the suggested move
    pub pv: Vec<String>,
}

impl Suggestion {
    /// Source and target squares, e.g. `("E2", "E4")`.
    pub fn squares(&self) -> Option<(String, String)> {
        let uci = self.move_uci.get(..4)?;
        Some((uci[..2].to_uppercase(), uci[2..].to_uppercase()))
    }
}

/// Anything that can analyse a position. Calls are exclusive: the caller
/// holds `&mut self` for the whole evaluation.
pub trait Analyzer: Send {
    fn analyse(
        &mut self,
        position: &Chess,
        budget: Duration,
    ) -> impl Future<Output = Result<Suggestion, AssistantError>> + Send;

    /// Replace the engine process with a fresh one.
    fn restart(&mut self) -> impl Future<Output = Result<(), AssistantError>> + Send;

    /// Stop the engine process; the next call starts a new one.
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}

/// Stockfish-backed [`Analyzer`]
pub struct EngineAdapter {
    settings: EngineSettings,
    engine: Option<StockfishEngine>,
}

impl EngineAdapter {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            engine: None,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The running engine, spawning one if there is none or it has died.
    async fn running(&mut self) -> Result<&mut StockfishEngine, AssistantError> {
        let alive = self.engine.as_mut().map(|e| e.is_alive()).unwrap_or(false);
        if !alive {
            if self.engine.take().is_some() {
                warn!("Stockfish process exited, restarting");
            }
            info!(path = %self.settings.path.display(), "Starting Stockfish engine");
            self.engine = Some(StockfishEngine::new(&self.settings).await?);
        }
        self.engine
            .as_mut()
            .ok_or_else(|| AssistantError::Stockfish("engine not running".into()))
    }

    async fn search(&mut self, fen: &str, budget: Duration) -> Result<SearchInfo, AssistantError> {
        let engine = self.running().await?;
        engine.search(fen, budget.min(MAX_MOVETIME), SEARCH_DEPTH).await
    }
}

impl Analyzer for EngineAdapter {
    async fn analyse(
        &mut self,
        position: &Chess,
        budget: Duration,
    ) -> Result<Suggestion, AssistantError> {
        ensure_playable(position)?;
        let fen = position_fen(position);

        let info = match self.search(&fen, budget).await {
            Ok(info) => info,
            Err(e) if e.is_engine_dead() => {
                warn!(error = %e, "Engine terminated, attempting restart");
                self.engine = None;
                self.search(&fen, budget.min(RETRY_BUDGET)).await?
            }
            Err(e) => return Err(e),
        };

        build_suggestion(position, &info)
    }

    async fn restart(&mut self) -> Result<(), AssistantError> {
        self.shutdown().await;
        self.running().await.map(|_| ())
    }

    async fn shutdown(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            info!("Stopping Stockfish engine");
            engine.quit().await;
        }
    }
}

/// Reject finished games before bothering the engine.
pub fn ensure_playable(position: &Chess) -> Result<(), AssistantError> {
    if let Some(result) = game_result(position) {
        return Err(AssistantError::GameOver(result.to_string()));
    }
    if position.legal_moves().is_empty() {
        return Err(AssistantError::NoLegalMoves);
    }
    Ok(())
}

/// Turn raw search output into a [`Suggestion`]. When the engine did not
/// name a legal move, the first legal move is suggested without metadata.
pub fn build_suggestion(position: &Chess, info: &SearchInfo) -> Result<Suggestion, AssistantError> {
    let best = info
        .best_move
        .as_deref()
        .or_else(|| info.pv.first().map(String::as_str));

    if let Some((mv, san)) = best.and_then(|uci| uci_to_san(position, uci).ok()) {
        let move_uci = move_to_uci(&mv);
        let pv = if info.pv.first().map(String::as_str) == best {
            uci_line_to_san(position, &info.pv, PV_LENGTH)
        } else {
            vec![san.clone()]
        };

        return Ok(Suggestion {
            move_san: san,
            move_uci,
            score: info
                .mate
                .map(Score::Mate)
                .or(info.cp.map(Score::Centipawns)),
            depth: info.depth,
            nodes: info.nodes,
            elapsed: info.time_ms.map(Duration::from_millis),
            pv,
        });
    }

    warn!(best_move = ?best, "Engine gave no usable move, falling back to first legal move");
    let legal = position.legal_moves();
    let mv = legal.first().ok_or(AssistantError::NoLegalMoves)?;
    let san = San::from_move(position, mv.clone()).to_string();

    Ok(Suggestion {
        move_san: san.clone(),
        move_uci: move_to_uci(mv),
        score: None,
        depth: None,
        nodes: None,
        elapsed: None,
        pv: vec![san],
    })
}

/// Run one analysis bounded by `budget + WATCHDOG_GRACE`. On expiry the
/// engine is shut down so the next call gets a fresh process.
pub async fn analyse_with_watchdog<E: Analyzer>(
    engine: &mut E,
    position: &Chess,
    budget: Duration,
) -> Result<Suggestion, AssistantError> {
    let limit = budget + WATCHDOG_GRACE;
    match tokio::time::timeout(limit, engine.analyse(position, budget)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(?limit, "Analysis timeout, restarting engine");
            engine.shutdown().await;
            Err(AssistantError::EngineTimeout(limit))
        }
    }
}

/// Analyse `position` on behalf of `color`, handing it the move if needed.
pub async fn suggest_for<E: Analyzer>(
    engine: &mut E,
    position: &Chess,
    color: UserColor,
    budget: Duration,
) -> Result<Suggestion, AssistantError> {
    let position = hand_move_to(position, color)?;
    analyse_with_watchdog(engine, &position, budget).await
}
