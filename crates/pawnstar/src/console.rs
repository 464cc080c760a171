//! Terminal front end: command parsing and text rendering of session output.

use std::str::FromStr;
use std::time::Duration;

use chess_core::{Reconstruction, UserColor};

use crate::engine::Suggestion;
use crate::events::SessionEvent;

pub const HELP: &str = "\
Commands:
  white | black      set the color you play
  update             read the board now
  suggest            ask the engine for your best move
  start | stop       start or stop auto-update
  auto on|off        suggest automatically when it is your turn
  interval <secs>    auto-update interval
  time <secs>        analysis time (0.1 - 10)
  board | fen | moves
  engine             restart the engine
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetColor(UserColor),
    Update,
    Suggest,
    Start,
    Stop,
    AutoSuggest(bool),
    Interval(f64),
    AnalysisTime(f64),
    Board,
    Fen,
    Moves,
    Engine,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or_default().to_ascii_lowercase();
        let arg = words.next();

        let command = match name.as_str() {
            "white" | "w" => Command::SetColor(UserColor::White),
            "black" | "b" => Command::SetColor(UserColor::Black),
            "update" | "u" => Command::Update,
            "suggest" | "s" => Command::Suggest,
            "start" => Command::Start,
            "stop" => Command::Stop,
            "auto" => match arg.map(str::to_ascii_lowercase).as_deref() {
                Some("on") => Command::AutoSuggest(true),
                Some("off") => Command::AutoSuggest(false),
                _ => return Err("Usage: auto on|off".to_string()),
            },
            "interval" => Command::Interval(positive_secs(arg, "interval")?),
            "time" => Command::AnalysisTime(positive_secs(arg, "time")?),
            "board" => Command::Board,
            "fen" => Command::Fen,
            "moves" => Command::Moves,
            "engine" => Command::Engine,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(format!("Unknown command '{other}'. Type 'help'.")),
        };
        Ok(command)
    }
}

fn positive_secs(arg: Option<&str>, name: &str) -> Result<f64, String> {
    arg.and_then(|a| a.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| format!("Usage: {name} <seconds>"))
}

/// Seconds with one decimal, e.g. `1.5s`.
pub fn format_time(d: Duration) -> String {
    format!("{:.1}s", d.as_secs_f64())
}

/// Board diagram with rank and file labels, from the user's side.
pub fn render_board(position: &Reconstruction, user: Option<UserColor>) -> String {
    let flipped = user == Some(UserColor::Black);
    let mut rows: Vec<(char, Vec<String>)> = position
        .board_ascii()
        .lines()
        .zip(('1'..='8').rev())
        .map(|(line, rank)| (rank, line.split(' ').map(String::from).collect()))
        .collect();
    let mut files: Vec<char> = ('a'..='h').collect();
    if flipped {
        rows.reverse();
        for (_, squares) in &mut rows {
            squares.reverse();
        }
        files.reverse();
    }

    let border = format!("  +{}+", "-".repeat(17));
    let mut out = vec![border.clone()];
    for (rank, squares) in rows {
        out.push(format!("{rank} | {} |", squares.join(" ")));
    }
    out.push(border);
    let labels: Vec<String> = files.iter().map(char::to_string).collect();
    out.push(format!("    {}", labels.join(" ")));
    out.join("\n")
}

/// Board plus its summary lines.
pub fn render_update(position: &Reconstruction, user: Option<UserColor>) -> String {
    let applied = position.applied();
    let mut out = vec![render_board(position, user)];
    out.push(format!("Moves: {}", applied.len()));
    out.push(format!("To move: {}", position.side_to_move().title()));
    if let Some(color) = user {
        let note = if position.side_to_move() == color {
            " (your turn)"
        } else {
            ""
        };
        out.push(format!("You play: {}{note}", color.title()));
    }
    if !applied.is_empty() {
        out.push(format!("Last moves: {}", applied.last(4).join(" ")));
    }
    if let Some(result) = position.result() {
        out.push(format!("Game over: {result}"));
    }
    if !position.skipped().is_empty() {
        let tokens: Vec<&str> = position
            .skipped()
            .iter()
            .map(|s| s.token.as_str())
            .collect();
        out.push(format!("Unparsed moves: {}", tokens.join(", ")));
    }
    out.push(format!("FEN: {}", position.fen()));
    out.join("\n")
}

pub fn render_suggestion(color: UserColor, suggestion: &Suggestion) -> String {
    let unknown = || "Unknown".to_string();
    let mut out = vec![format!(
        "Best move for {}: {}",
        color.title(),
        suggestion.move_san
    )];
    if let Some((from, to)) = suggestion.squares() {
        out.push(format!("  Squares: {from} → {to}"));
    }
    out.push(format!("  UCI: {}", suggestion.move_uci));
    out.push(format!(
        "  Evaluation: {}",
        suggestion.score.map(|s| s.to_string()).unwrap_or_else(unknown)
    ));
    out.push(format!(
        "  Depth: {}",
        suggestion.depth.map(|d| d.to_string()).unwrap_or_else(unknown)
    ));
    out.push(format!(
        "  Nodes: {}",
        suggestion.nodes.map(|n| n.to_string()).unwrap_or_else(unknown)
    ));
    if let Some(elapsed) = suggestion.elapsed {
        out.push(format!("  Time: {}", format_time(elapsed)));
    }
    if suggestion.pv.len() > 1 {
        out.push(format!("  Line: {}", suggestion.pv.join(" → ")));
    }
    out.join("\n")
}

pub fn render_event(event: &SessionEvent, user: Option<UserColor>) -> String {
    match event {
        SessionEvent::BoardUpdated(position) => render_update(position, user),
        SessionEvent::Suggestion { color, suggestion } => render_suggestion(*color, suggestion),
        SessionEvent::Error(msg) => format!("Error: {msg}"),
        SessionEvent::PollerStopped => "Auto-update stopped".to_string(),
    }
}
