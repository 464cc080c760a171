//! One Stockfish child process spoken to over UCI.

use std::str::FromStr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use tracing::debug;

use crate::config::EngineSettings;
use crate::error::AssistantError;

/// Everything the engine reported for one search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchInfo {
    /// Centipawns for the side to move
    pub cp: Option<i32>,
    /// Mate in N moves (positive = side to move mates)
    pub mate: Option<i32>,
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
    /// Search time reported by the engine, in milliseconds
    pub time_ms: Option<u64>,
    /// Principal variation in UCI notation
    pub pv: Vec<String>,
    /// Best move in UCI notation; `None` for `bestmove (none)`
    pub best_move: Option<String>,
}

/// A running engine with its pipes
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    /// A `go` was sent whose `bestmove` has not been read yet
    pending: bool,
}

impl StockfishEngine {
    /// Spawn the engine, apply `settings` and wait until it is ready.
    pub async fn new(settings: &EngineSettings) -> Result<Self, AssistantError> {
        let mut process = Command::new(&settings.path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AssistantError::Stockfish(format!("Failed to spawn Stockfish: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| AssistantError::Stockfish("Stockfish stdin unavailable".into()))?;
        let stdout = process
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| AssistantError::Stockfish("Stockfish stdout unavailable".into()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout,
            pending: false,
        };

        engine.send("uci").await?;
        engine.wait_for("uciok").await?;

        engine
            .send(&format!("setoption name Threads value {}", settings.threads))
            .await?;
        engine
            .send(&format!("setoption name Hash value {}", settings.hash_mb))
            .await?;
        engine
            .send(&format!("setoption name Skill Level value {}", settings.skill_level))
            .await?;
        engine.send("setoption name MultiPV value 1").await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;

        Ok(engine)
    }

    /// Write one command line.
    async fn send(&mut self, cmd: &str) -> Result<(), AssistantError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| AssistantError::EngineTerminated(format!("write failed: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| AssistantError::EngineTerminated(format!("flush failed: {e}")))?;
        Ok(())
    }

    /// Read one line; EOF means the process is gone.
    async fn read_line(&mut self, line: &mut String) -> Result<(), AssistantError> {
        line.clear();
        let read = self
            .stdout
            .read_line(line)
            .await
            .map_err(|e| AssistantError::EngineTerminated(format!("read failed: {e}")))?;
        if read == 0 {
            return Err(AssistantError::EngineTerminated(
                "Stockfish closed its output".into(),
            ));
        }
        Ok(())
    }

    /// Read until the engine prints `expected`.
    async fn wait_for(&mut self, expected: &str) -> Result<(), AssistantError> {
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();
            debug!(line = trimmed, "SF >");
            if trimmed == expected {
                return Ok(());
            }
        }
    }

    /// Finish a search whose caller went away, discarding its output up to
    /// the engine's `readyok`.
    async fn settle(&mut self) -> Result<(), AssistantError> {
        debug!("Discarding output of an abandoned search");
        self.send("stop").await?;
        self.send("isready").await?;
        self.wait_for("readyok").await?;
        self.pending = false;
        Ok(())
    }

    /// Search a position for at most `movetime` or `depth`, whichever ends first.
    ///
    /// Dropping the returned future mid-search is allowed: the next call
    /// stops the old search and skips its `bestmove` before starting.
    pub async fn search(
        &mut self,
        fen: &str,
        movetime: Duration,
        depth: u32,
    ) -> Result<SearchInfo, AssistantError> {
        if self.pending {
            self.settle().await?;
        }
        self.send("ucinewgame").await?;
        self.send(&format!("position fen {fen}")).await?;
        self.pending = true;
        self.send(&format!(
            "go movetime {} depth {depth}",
            movetime.as_millis().max(1)
        ))
        .await?;

        let mut info = SearchInfo::default();
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();

            if trimmed.starts_with("bestmove") {
                debug!(line = trimmed, "SF >");
                info.best_move = parse_bestmove(trimmed);
                self.pending = false;
                break;
            }
            apply_info_line(&mut info, trimmed);
        }

        Ok(info)
    }

    /// True while the child process has not exited.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.process.try_wait(), Ok(None))
    }

    /// Ask the engine to exit, killing it if it lingers.
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        if tokio::time::timeout(Duration::from_secs(2), self.process.wait())
            .await
            .is_err()
        {
            let _ = self.process.start_kill();
        }
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        let _ = self.process.start_kill();
    }
}

/// Fold one `info ... pv ...` line into the running search info.
fn apply_info_line(info: &mut SearchInfo, line: &str) {
    if !line.starts_with("info") || line.starts_with("info string") || !line.contains(" pv ") {
        return;
    }

    if let Some(cp) = parse_field::<i32>(line, "cp") {
        info.cp = Some(cp);
        info.mate = None;
    }
    if let Some(mate) = parse_field::<i32>(line, "mate") {
        info.mate = Some(mate);
        info.cp = None;
    }
    if let Some(depth) = parse_field(line, "depth") {
        info.depth = Some(depth);
    }
    if let Some(nodes) = parse_field(line, "nodes") {
        info.nodes = Some(nodes);
    }
    if let Some(time) = parse_field(line, "time") {
        info.time_ms = Some(time);
    }
    let pv = parse_pv(line);
    if !pv.is_empty() {
        info.pv = pv;
    }
}

/// Parse the value following `key` in an info line
fn parse_field<T: FromStr>(line: &str, key: &str) -> Option<T> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "pv" {
            break;
        }
        if *part == key && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// Moves after the `pv` keyword
fn parse_pv(line: &str) -> Vec<String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut in_pv = false;
    let mut moves = Vec::new();

    for part in parts {
        if part == "pv" {
            in_pv = true;
            continue;
        }
        if in_pv {
            if part.starts_with("bmc") || part == "string" {
                break;
            }
            moves.push(part.to_string());
        }
    }

    moves
}

fn parse_bestmove(line: &str) -> Option<String> {
    line.split_whitespace()
        .nth(1)
        .filter(|mv| *mv != "(none)")
        .map(str::to_string)
}
