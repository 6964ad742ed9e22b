// src/error_handling.rs
use std::fmt;

#[derive(Debug)]
pub enum RemoverError {
    Validation(Vec<String>),
    ElevationDenied(String),
}

impl fmt::Display for RemoverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoverError::Validation(messages) => {
                write!(f, "Invalid Arguments:")?;
                for message in messages {
                    write!(f, "\n  - {}", message)?;
                }
                Ok(())
            }
            RemoverError::ElevationDenied(msg) => write!(
                f,
                "Elevation Denied: {}\nSuggestion: Accept the UAC prompt or start the tool from an elevated console.",
                msg
            ),
        }
    }
}

impl std::error::Error for RemoverError {}

/// The four distinguishable ends of a run, mapped onto process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Arguments were valid and every attempted target succeeded or was already gone.
    /// Also used when the work was handed to an elevated relaunch.
    Completed,
    /// At least one target ended in `AccessDenied` or `OtherFailure`.
    TargetsFailed,
    InvalidArguments,
    ElevationDenied,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::TargetsFailed => 1,
            RunStatus::InvalidArguments => 2,
            RunStatus::ElevationDenied => 3,
        }
    }
}

impl From<&RemoverError> for RunStatus {
    fn from(err: &RemoverError) -> Self {
        match err {
            RemoverError::Validation(_) => RunStatus::InvalidArguments,
            RemoverError::ElevationDenied(_) => RunStatus::ElevationDenied,
        }
    }
}

pub use anyhow::{Context, Result, Error};
