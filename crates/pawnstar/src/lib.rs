//! PawnStar: watches a live chess game in a browser, rebuilds the position
//! from the move list and asks Stockfish for the best move.

pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod events;
pub mod poller;
pub mod scraper;
pub mod session;
pub mod stockfish;

#[cfg(all(test, unix))]
mod testing;
