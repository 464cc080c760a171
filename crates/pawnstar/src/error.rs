//! Assistant error types

use std::time::Duration;

use thiserror::Error;

use crate::scraper::ScrapeError;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error("Stockfish error: {0}")]
    Stockfish(String),

    #[error("Engine terminated: {0}")]
    EngineTerminated(String),

    #[error("Analysis timed out after {0:?}. Engine has been restarted. Try again.")]
    EngineTimeout(Duration),

    #[error("Game is over. Result: {0}")]
    GameOver(String),

    #[error("No legal moves available")]
    NoLegalMoves,

    #[error("User color not set. Please select your color first.")]
    ColorNotSet,

    #[error(transparent)]
    Chess(#[from] chess_core::CoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AssistantError {
    /// Errors after which the engine process should be considered gone.
    pub fn is_engine_dead(&self) -> bool {
        matches!(self, AssistantError::EngineTerminated(_))
    }
}
