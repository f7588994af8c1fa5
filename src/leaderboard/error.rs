use crate::store::StoreError;

#[derive(Debug)]
pub enum LeaderboardError {
    /// Rejected before any state change or I/O.
    Validation { reason: String },
    NotReady,
    Busy,
    StoreRead(StoreError),
    StoreWrite(StoreError),
    /// Only raised on the change-notification path, where it is logged and dropped.
    Deserialization { reason: String },
    Stopped,
}

impl LeaderboardError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for LeaderboardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { reason } => write!(f, "invalid score: {reason}"),
            Self::NotReady => write!(f, "leaderboard backend is not ready yet"),
            Self::Busy => write!(f, "another leaderboard update is still in flight"),
            Self::StoreRead(e) => write!(f, "could not read leaderboard: {e}"),
            Self::StoreWrite(e) => write!(f, "could not write leaderboard: {e}"),
            Self::Deserialization { reason } => {
                write!(f, "malformed leaderboard document: {reason}")
            }
            Self::Stopped => write!(f, "leaderboard manager has been shut down"),
        }
    }
}

impl std::error::Error for LeaderboardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::StoreRead(e) | Self::StoreWrite(e) => Some(e),
            _ => None,
        }
    }
}
