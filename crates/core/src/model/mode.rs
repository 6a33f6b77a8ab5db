use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModeError {
    #[error("unknown run mode: {0}")]
    Unknown(String),
}

/// Closed set of run styles understood by the scoring authority.
///
/// Serialized with the canonical lowercase names the server expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Difficulty follows the player; response time is measured, never enforced.
    Adaptive,
    /// Per-question countdown that shrinks with difficulty; one wrong answer ends the run.
    Challenger,
    /// One global countdown chosen by the player up front.
    MinuteRush,
    /// Sudden death: one wrong answer ends the run.
    FirstStrike,
    /// Open-ended practice over the mixed question pool.
    LevelInfinity,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Adaptive,
        Mode::Challenger,
        Mode::MinuteRush,
        Mode::FirstStrike,
        Mode::LevelInfinity,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Adaptive => "adaptive",
            Mode::Challenger => "challenger",
            Mode::MinuteRush => "minuterush",
            Mode::FirstStrike => "firststrike",
            Mode::LevelInfinity => "levelinfinity",
        }
    }

    /// Human-facing label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Mode::Adaptive => "Adaptive",
            Mode::Challenger => "Challenger",
            Mode::MinuteRush => "Minute Rush",
            Mode::FirstStrike => "First Strike",
            Mode::LevelInfinity => "Level Infinity",
        }
    }
}

impl FromStr for Mode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        match normalized.as_str() {
            "adaptive" => Ok(Mode::Adaptive),
            "challenger" => Ok(Mode::Challenger),
            "minuterush" => Ok(Mode::MinuteRush),
            "firststrike" => Ok(Mode::FirstStrike),
            "levelinfinity" => Ok(Mode::LevelInfinity),
            _ => Err(ModeError::Unknown(s.to_owned())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_loose_names() {
        assert_eq!("adaptive".parse::<Mode>().unwrap(), Mode::Adaptive);
        assert_eq!("Minute-Rush".parse::<Mode>().unwrap(), Mode::MinuteRush);
        assert_eq!("first_strike".parse::<Mode>().unwrap(), Mode::FirstStrike);
        let err = "blitz".parse::<Mode>().unwrap_err();
        assert!(matches!(err, ModeError::Unknown(raw) if raw == "blitz"));
    }

    #[test]
    fn serializes_with_server_names() {
        for mode in Mode::ALL {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.as_str()));
        }
    }
}
