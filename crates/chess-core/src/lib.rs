//! Chess-side building blocks for PawnStar: move-token cleaning, move
//! sequences with cheap fingerprints, and position reconstruction on top of
//! `shakmaty`.

pub mod error;
pub mod notation;
pub mod replay;
pub mod sequence;
pub mod side;

pub use error::CoreError;
pub use replay::{replay, Reconstruction, ReplayMode, SkippedToken};
pub use sequence::{Fingerprint, MoveSequence};
pub use side::{side_for_ply_count, UserColor};
