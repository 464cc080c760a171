//! A shell script standing in for Stockfish.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Answers `go` after `delay_secs`: Nf3 for white, Nc6 for black.
pub struct FakeUci {
    _dir: TempDir,
    path: PathBuf,
}

impl FakeUci {
    pub fn answering_after(delay_secs: f64) -> Self {
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
    go*)
      sleep {delay_secs}
      if [ "$side" = w ]; then
        echo "info depth 12 score cp 25 nodes 4000 time 40 pv g1f3"
        echo "bestmove g1f3"
      else
        echo "info depth 12 score cp -10 nodes 4000 time 40 pv b8c6"
        echo "bestmove b8c6"
      fi
      ;;
    quit) exit 0 ;;
  esac
done
"#
        );
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
