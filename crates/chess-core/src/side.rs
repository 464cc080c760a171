use std::fmt;
use std::str::FromStr;

use shakmaty::Color;

use crate::error::CoreError;

/// The side the user is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserColor {
    White,
    Black,
}

impl UserColor {
    pub fn color(self) -> Color {
        match self {
            UserColor::White => Color::White,
            UserColor::Black => Color::Black,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserColor::White => "white",
            UserColor::Black => "black",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            UserColor::White => "White",
            UserColor::Black => "Black",
        }
    }
}

impl From<Color> for UserColor {
    fn from(color: Color) -> Self {
        match color {
            Color::White => UserColor::White,
            Color::Black => UserColor::Black,
        }
    }
}

impl fmt::Display for UserColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserColor {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(UserColor::White),
            "black" | "b" => Ok(UserColor::Black),
            _ => Err(CoreError::InvalidColor(s.to_string())),
        }
    }
}

/// Side to move after `plies` moves from the standard start: even ⇒ white.
pub fn side_for_ply_count(plies: usize) -> UserColor {
    if plies % 2 == 0 {
        UserColor::White
    } else {
        UserColor::Black
    }
}
