use serde::{Deserialize, Serialize};

use super::error::LeaderboardError;
use crate::fmt;

/// Other clients read scores as 32-bit integers.
pub const MAX_SCORE: i64 = i32::MAX as i64;

/// One leaderboard entry. Replaced, never edited.
///
/// Field names on the wire are `userName` and `score`; documents already
/// persisted by other clients use them, so they must not change. Parsed
/// records go through [`ScoreRecord::new`] like any other input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireScoreRecord")]
pub struct ScoreRecord {
    #[serde(rename = "userName")]
    name: String,
    score: i64,
}

#[derive(Deserialize)]
struct WireScoreRecord {
    #[serde(rename = "userName")]
    name: String,
    score: i64,
}

impl TryFrom<WireScoreRecord> for ScoreRecord {
    type Error = LeaderboardError;

    fn try_from(wire: WireScoreRecord) -> Result<Self, Self::Error> {
        Self::new(wire.name, wire.score)
    }
}

impl ScoreRecord {
    pub fn new(name: impl Into<String>, score: i64) -> Result<Self, LeaderboardError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LeaderboardError::validation(
                "name must contain at least one character",
            ));
        }
        if score < 0 {
            return Err(LeaderboardError::validation(fmt!(
                "score {score} is negative, only values >= 0 are allowed"
            )));
        }
        if score > MAX_SCORE {
            return Err(LeaderboardError::validation(fmt!(
                "score {score} is above the maximum of {MAX_SCORE}"
            )));
        }
        Ok(Self { name, score })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn score(&self) -> i64 {
        self.score
    }
}

/// The whole leaderboard as stored under the document key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardDocument {
    #[serde(rename = "playerScoreDataList", default)]
    records: Vec<ScoreRecord>,
}

impl LeaderboardDocument {
    pub fn new(records: Vec<ScoreRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ScoreRecord] {
        &self.records
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a raw payload. Blank payloads are reported as errors so callers
    /// can tell "nothing stored" apart from "stored an empty list".
    pub fn from_json(raw: &str) -> Result<Self, LeaderboardError> {
        if raw.trim().is_empty() {
            return Err(LeaderboardError::Deserialization {
                reason: "payload is empty".to_string(),
            });
        }
        serde_json::from_str(raw).map_err(|e| LeaderboardError::Deserialization {
            reason: e.to_string(),
        })
    }
}
