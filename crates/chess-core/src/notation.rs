//! Move-token cleaning for scraped move lists, plus SAN/UCI conversions.

use std::sync::LazyLock;

use regex::Regex;
use shakmaty::{san::San, uci::UciMove, CastlingMode, Chess, Move, Position};

use crate::error::CoreError;

const RESULTS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

/// A SAN move inside free text.
static SAN_MOVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?[+#]?|O-O-O|O-O")
        .expect("SAN pattern is valid")
});

/// True for bare move numbers such as `1.`, `12.` or `12...`.
pub fn is_move_number(token: &str) -> bool {
    let digits = token.trim_end_matches('.');
    digits.len() < token.len() && !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// True for game-result markers that show up at the end of move lists.
pub fn is_result(token: &str) -> bool {
    RESULTS.contains(&token) || token == "½-½"
}

/// Normalise one scraped token into something the SAN parser accepts.
///
/// Returns `None` for tokens that carry no move at all (move numbers,
/// results, annotation-only glyphs).
pub fn clean_token(raw: &str) -> Option<String> {
    let token = raw.trim();
    if token.is_empty() || is_move_number(token) || is_result(token) {
        return None;
    }

    let token = strip_move_number_prefix(token);
    let token = token.trim_end_matches(|c: char| c == '!' || c == '?');
    if token.is_empty() {
        return None;
    }

    // Some sites render castling with zeros
    if token.starts_with("0-0") {
        return Some(token.replace('0', "O"));
    }

    Some(token.to_string())
}

/// `12.e4` -> `e4`, `12...e5` -> `e5`; anything else is returned unchanged.
fn strip_move_number_prefix(token: &str) -> &str {
    let rest = token.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() < token.len() && rest.starts_with('.') {
        rest.trim_start_matches('.')
    } else {
        token
    }
}

/// Split the text of one move-list element into clean move tokens.
pub fn tokenize_move_text(text: &str) -> Vec<String> {
    text.split_whitespace().filter_map(clean_token).collect()
}

/// Pull SAN moves out of arbitrary text (e.g. a whole move-list container).
pub fn extract_san_moves(text: &str) -> Vec<String> {
    SAN_MOVE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Parse a SAN token and resolve it against `pos`.
pub fn san_to_move(pos: &Chess, token: &str) -> Result<Move, CoreError> {
    let san: San = token.parse().map_err(|e| CoreError::InvalidSan {
        token: token.to_string(),
        reason: format!("{e}"),
    })?;

    san.to_move(pos).map_err(|e| CoreError::IllegalMove {
        token: token.to_string(),
        reason: format!("{e}"),
    })
}

/// UCI notation of a legal move (`e2e4`, `e1g1`, `e7e8q`).
pub fn move_to_uci(mv: &Move) -> String {
    mv.to_uci(CastlingMode::Standard).to_string()
}

/// Convert a single UCI move to SAN at a given position.
pub fn uci_to_san(pos: &Chess, uci_str: &str) -> Result<(Move, String), CoreError> {
    let uci_move: UciMove = uci_str
        .parse()
        .map_err(|_| CoreError::InvalidUci(uci_str.to_string()))?;
    let legal_move = uci_move
        .to_move(pos)
        .map_err(|_| CoreError::InvalidUci(uci_str.to_string()))?;
    let san = San::from_move(pos, legal_move.clone()).to_string();
    Ok((legal_move, san))
}

/// Convert up to `limit` moves of a UCI line to SAN, stopping at the first
/// move that is not legal in the running position.
pub fn uci_line_to_san(start: &Chess, uci_moves: &[String], limit: usize) -> Vec<String> {
    let mut pos = start.clone();
    let mut moves = Vec::new();

    for uci_str in uci_moves.iter().take(limit) {
        let Ok((legal_move, san)) = uci_to_san(&pos, uci_str) else {
            break;
        };
        moves.push(san);
        pos.play_unchecked(legal_move);
    }

    moves
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_numbers() {
        assert!(is_move_number("1."));
        assert!(is_move_number("12..."));
        assert!(!is_move_number("12"));
        assert!(!is_move_number("."));
        assert!(!is_move_number("e4"));
    }

    #[test]
    fn test_tokenize_move_text() {
        let moves = tokenize_move_text("1. e4 e5 2. Nf3  Nc6 ");
        assert_eq!(moves, vec!["e4", "e5", "Nf3", "Nc6"]);
    }

    #[test]
    fn test_clean_token_variants() {
        assert_eq!(clean_token("12.Qxd5!?").as_deref(), Some("Qxd5"));
        assert_eq!(clean_token("12...Bb4+").as_deref(), Some("Bb4+"));
        assert_eq!(clean_token("0-0-0").as_deref(), Some("O-O-O"));
        assert_eq!(clean_token("0-0+").as_deref(), Some("O-O+"));
        assert_eq!(clean_token("1-0"), None);
        assert_eq!(clean_token("1/2-1/2"), None);
        assert_eq!(clean_token("!!"), None);
        assert_eq!(clean_token("   "), None);
    }

    #[test]
    fn test_extract_san_moves_from_container() {
        let text = "1.e4 e5\n2.Nf3 Nc6\n3.Bb5 a6\n4.O-O Nf6\n5.d4 exd4";
        let moves = extract_san_moves(text);
        assert_eq!(
            moves,
            vec!["e4", "e5", "Nf3", "Nc6", "Bb5", "a6", "O-O", "Nf6", "d4", "exd4"]
        );
    }

    #[test]
    fn test_extract_san_moves_is_reusable() {
        let text = "41. e8=Q+ Kxe8 42. O-O-O";
        for _ in 0..3 {
            assert_eq!(extract_san_moves(text), vec!["e8=Q+", "Kxe8", "O-O-O"]);
        }
        assert!(extract_san_moves("Game aborted").is_empty());
    }

    #[test]
    fn test_san_to_move_rejects_illegal() {
        let pos = Chess::default();
        assert!(san_to_move(&pos, "e4").is_ok());
        assert!(matches!(
            san_to_move(&pos, "e5"),
            Err(CoreError::IllegalMove { .. })
        ));
        assert!(matches!(
            san_to_move(&pos, "hello"),
            Err(CoreError::InvalidSan { .. })
        ));
    }

    #[test]
    fn test_uci_line_to_san() {
        let pos = Chess::default();
        let line: Vec<String> = ["e2e4", "e7e5", "g1f3", "b8c6"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(uci_line_to_san(&pos, &line, 3), vec!["e4", "e5", "Nf3"]);
    }

    #[test]
    fn test_uci_line_stops_at_illegal_move() {
        let pos = Chess::default();
        let line: Vec<String> = ["e2e4", "e2e4", "g1f3"].iter().map(|s| s.to_string()).collect();
        assert_eq!(uci_line_to_san(&pos, &line, 3), vec!["e4"]);
    }

    #[test]
    fn test_move_to_uci_castling() {
        let mut pos = Chess::default();
        for san in ["e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5"] {
            let mv = san_to_move(&pos, san).unwrap();
            pos.play_unchecked(mv);
        }
        let castle = san_to_move(&pos, "O-O").unwrap();
        assert_eq!(move_to_uci(&castle), "e1g1");
    }
}
