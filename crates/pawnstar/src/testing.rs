//! Scripted UCI engines for unit tests.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use crate::config::EngineSettings;

/// A shell script that speaks just enough UCI. `on_go` runs for every `go`;
/// `$side` holds the side to move of the last `position fen`.
pub struct FakeUci {
    _dir: TempDir,
    path: PathBuf,
}

impl FakeUci {
    pub fn new(on_go: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fakefish");
        let script = format!(
            r#"#!/bin/sh
side=w
while IFS= read -r line; do
  case "$line" in
    uci) echo "id name FakeFish"; echo "uciok" ;;
    isready) echo "readyok" ;;
    "position fen "*) set -- $line; side=$4 ;;
    go*) {on_go} ;;
    quit) exit 0 ;;
  esac
done
"#
        );
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        Self { _dir: dir, path }
    }

    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            path: self.path.clone(),
            threads: 1,
            hash_mb: 16,
            skill_level: 20,
        }
    }
}

/// Sleep for `delay`, then answer Nf3 for white and Nc6 for black.
pub fn answer_after(delay: Duration) -> String {
    format!(
        r#"sleep {secs}; if [ "$side" = w ]; then echo "info depth 12 score cp 25 nodes 4000 time 40 pv g1f3 g8f6"; echo "bestmove g1f3"; else echo "info depth 12 score cp -10 nodes 4000 time 40 pv b8c6"; echo "bestmove b8c6"; fi"#,
        secs = delay.as_secs_f64()
    )
}

/// Exit on the first `go` ever, answer normally afterwards.
pub fn crash_once() -> String {
    format!(
        r#"if [ -e "$(dirname "$0")/crashed" ]; then {answer}; else touch "$(dirname "$0")/crashed"; exit 1; fi"#,
        answer = answer_after(Duration::ZERO)
    )
}
