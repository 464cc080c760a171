//! Position reconstruction: replay a scraped move list from the start.
//!
//! The board is never edited incrementally. Every observation is replayed
//! from the standard initial position, so the result is a pure function of
//! the token list and the [`ReplayMode`].

use std::fmt;
use std::str::FromStr;

use shakmaty::fen::Fen;
use shakmaty::{
    CastlingMode, Chess, EnPassantMode, File, FromSetup, Position, Rank, Square,
};

use crate::error::CoreError;
use crate::notation::{clean_token, san_to_move};
use crate::sequence::MoveSequence;
use crate::side::{side_for_ply_count, UserColor};

/// What to do with a token that does not parse or is illegal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayMode {
    /// Stop at the first bad token; the result is always a prefix of the game.
    #[default]
    Strict,
    /// Skip bad tokens and keep applying whatever still parses.
    Lenient,
}

impl fmt::Display for ReplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayMode::Strict => f.write_str("strict"),
            ReplayMode::Lenient => f.write_str("lenient"),
        }
    }
}

impl FromStr for ReplayMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ReplayMode::Strict),
            "lenient" => Ok(ReplayMode::Lenient),
            _ => Err(CoreError::InvalidReplayMode(s.to_string())),
        }
    }
}

/// A scraped token that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedToken {
    /// Index into the scraped token list
    pub index: usize,
    pub token: String,
    pub error: CoreError,
}

/// Board state derived from a move sequence.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    position: Chess,
    applied: MoveSequence,
    skipped: Vec<SkippedToken>,
}

impl Default for Reconstruction {
    fn default() -> Self {
        Self {
            position: Chess::default(),
            applied: MoveSequence::default(),
            skipped: Vec::new(),
        }
    }
}

impl Reconstruction {
    pub fn position(&self) -> &Chess {
        &self.position
    }

    /// The tokens that were actually played, in order.
    pub fn applied(&self) -> &MoveSequence {
        &self.applied
    }

    pub fn skipped(&self) -> &[SkippedToken] {
        &self.skipped
    }

    /// Side to move, inferred from the parity of the applied-move count.
    pub fn side_to_move(&self) -> UserColor {
        side_for_ply_count(self.applied.len())
    }

    pub fn fen(&self) -> String {
        position_fen(&self.position)
    }

    pub fn board_ascii(&self) -> String {
        board_ascii(&self.position)
    }

    /// `Some("1-0")` etc. once the game is over.
    pub fn result(&self) -> Option<&'static str> {
        game_result(&self.position)
    }
}

/// Replay `tokens` from the initial position.
///
/// Tokens that carry no move (move numbers, results) are ignored. Tokens
/// that fail to parse or are illegal are recorded in
/// [`Reconstruction::skipped`]; in [`ReplayMode::Strict`] replay stops there.
pub fn replay(tokens: &[String], mode: ReplayMode) -> Reconstruction {
    let mut pos = Chess::default();
    let mut applied = Vec::with_capacity(tokens.len());
    let mut skipped = Vec::new();

    for (index, raw) in tokens.iter().enumerate() {
        let Some(token) = clean_token(raw) else {
            continue;
        };

        match san_to_move(&pos, &token) {
            Ok(mv) => {
                pos.play_unchecked(mv);
                applied.push(token);
            }
            Err(error) => {
                skipped.push(SkippedToken {
                    index,
                    token: raw.clone(),
                    error,
                });
                if mode == ReplayMode::Strict {
                    break;
                }
            }
        }
    }

    Reconstruction {
        position: pos,
        applied: MoveSequence::new(applied),
        skipped,
    }
}

/// Return `pos` with `color` to move, for analysing on the user's behalf
/// regardless of whose turn the move list implies. The en passant square is
/// dropped when the turn is handed over.
pub fn hand_move_to(pos: &Chess, color: UserColor) -> Result<Chess, CoreError> {
    if pos.turn() == color.color() {
        return Ok(pos.clone());
    }

    let mut setup = pos.to_setup(EnPassantMode::Legal);
    setup.turn = color.color();
    setup.ep_square = None;

    Chess::from_setup(setup, CastlingMode::Standard).map_err(|e| CoreError::SideToMove {
        color: color.to_string(),
        reason: e.to_string(),
    })
}

pub fn position_fen(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

/// Result string for a finished game, `None` while play continues.
pub fn game_result(pos: &Chess) -> Option<&'static str> {
    if pos.is_checkmate() {
        // The side to move is the side that got mated
        return Some(match UserColor::from(pos.turn()) {
            UserColor::White => "0-1",
            UserColor::Black => "1-0",
        });
    }
    if pos.is_game_over() {
        return Some("1/2-1/2");
    }
    None
}

/// Eight lines of piece letters, rank 8 first, `.` for empty squares.
pub fn board_ascii(pos: &Chess) -> String {
    let board = pos.board();
    let mut lines = Vec::with_capacity(8);

    for rank in (0..8u32).rev() {
        let row: Vec<String> = (0..8u32)
            .map(|file| {
                let sq = Square::from_coords(File::new(file), Rank::new(rank));
                board
                    .piece_at(sq)
                    .map(|p| p.char())
                    .unwrap_or('.')
                    .to_string()
            })
            .collect();
        lines.push(row.join(" "));
    }

    lines.join("\n")
}
