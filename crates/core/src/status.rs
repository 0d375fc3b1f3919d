//! Job status state machine.
//!
//! The persisted status mirrors the task queue's execution states and adds
//! the two locally-owned terminal states `CANCELED` and `EXPIRED`. Once a
//! job reaches any terminal state it never leaves it; the first terminal
//! write wins.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Started,
    Success,
    Failure,
    Canceled,
    Expired,
}

/// Status strings for the terminal set, as stored in the `status` column.
/// Guarded SQL updates use this set to make "first terminal write wins"
/// atomic at the row level.
pub const TERMINAL_STATUSES: [&str; 4] = ["SUCCESS", "FAILURE", "CANCELED", "EXPIRED"];

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Started => "STARTED",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Canceled => "CANCELED",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "STARTED" => Ok(Self::Started),
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            "CANCELED" => Ok(Self::Canceled),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(CoreError::Internal(format!("unknown job status '{other}'"))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failure | Self::Canceled | Self::Expired
        )
    }

    /// Cancellation is only permitted from the two non-terminal states.
    pub fn is_cancelable(self) -> bool {
        matches!(self, Self::Pending | Self::Started)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
