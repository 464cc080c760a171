use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid SAN '{token}': {reason}")]
    InvalidSan { token: String, reason: String },

    #[error("Illegal move '{token}': {reason}")]
    IllegalMove { token: String, reason: String },

    #[error("Invalid UCI move '{0}'")]
    InvalidUci(String),

    #[error("Cannot hand the move to {color}: {reason}")]
    SideToMove { color: String, reason: String },

    #[error("Color must be 'white' or 'black', got '{0}'")]
    InvalidColor(String),

    #[error("Replay mode must be 'strict' or 'lenient', got '{0}'")]
    InvalidReplayMode(String),
}
