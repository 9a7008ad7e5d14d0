//! Run status and the health record snapshot.

use std::str::FromStr;
use std::sync::RwLock;

use crate::error::CoreError;

/// Status of an application run.
///
/// The discriminants are the status codes posted to the reporting sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Only ever seen as `last_execution` before the first run.
    Never = 0,
    Running = 1,
    Waiting = 2,
    Error = 3,
    Success = 4,
}

impl Status {
    pub fn code(self) -> i64 {
        self as i64
    }

    /// `Success` and `Error` end a run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Success | Status::Error)
    }

    /// Whether the value may be stored as the current status of an application.
    pub fn is_assignable(self) -> bool {
        !matches!(self, Status::Never)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Never => write!(f, "NEVER"),
            Status::Running => write!(f, "RUNNING"),
            Status::Waiting => write!(f, "WAITING"),
            Status::Error => write!(f, "ERROR"),
            Status::Success => write!(f, "SUCCESS"),
        }
    }
}

impl FromStr for Status {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEVER" => Ok(Status::Never),
            "RUNNING" => Ok(Status::Running),
            "WAITING" => Ok(Status::Waiting),
            "ERROR" => Ok(Status::Error),
            "SUCCESS" => Ok(Status::Success),
            _ => Err(CoreError::InvalidStatus(s.to_string())),
        }
    }
}

impl TryFrom<i64> for Status {
    type Error = CoreError;

    fn try_from(code: i64) -> Result<Self, CoreError> {
        match code {
            0 => Ok(Status::Never),
            1 => Ok(Status::Running),
            2 => Ok(Status::Waiting),
            3 => Ok(Status::Error),
            4 => Ok(Status::Success),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Immutable snapshot of an application's health.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthRecord {
    pub status: Status,
    pub message: String,
    pub last_execution: Status,
    /// Bumped on every run; 0 until the first one.
    pub run_id: u64,
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self {
            status: Status::Waiting,
            message: String::new(),
            last_execution: Status::Never,
            run_id: 0,
        }
    }
}

/// Holds the current [`HealthRecord`]. Every write swaps in a whole new snapshot.
#[derive(Debug, Default)]
pub(crate) struct HealthCell {
    record: RwLock<HealthRecord>,
}

impl HealthCell {
    pub(crate) fn snapshot(&self) -> HealthRecord {
        self.record
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the record with the one built by `f` from the current snapshot.
    pub(crate) fn replace<F>(&self, f: F) -> HealthRecord
    where
        F: FnOnce(&HealthRecord) -> HealthRecord,
    {
        let mut guard = self
            .record
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = f(&guard);
        *guard = next.clone();
        next
    }

    pub(crate) fn set_status(&self, status: Status) -> Result<(), CoreError> {
        if !status.is_assignable() {
            return Err(CoreError::InvalidStatus(status.to_string()));
        }
        self.replace(|r| HealthRecord {
            status,
            ..r.clone()
        });
        Ok(())
    }

    pub(crate) fn set_message(&self, message: String) {
        self.replace(|r| HealthRecord {
            message,
            ..r.clone()
        });
    }

    /// Enter `Running` with a fresh run id and an empty message.
    pub(crate) fn begin(&self) -> u64 {
        self.replace(|r| HealthRecord {
            status: Status::Running,
            message: String::new(),
            last_execution: r.last_execution,
            run_id: r.run_id.wrapping_add(1),
        })
        .run_id
    }

    pub(crate) fn fail(&self, message: String) {
        self.replace(|r| HealthRecord {
            status: Status::Error,
            message,
            ..r.clone()
        });
    }

    /// Record the status reached by the run as `last_execution` and go back to `Waiting`.
    pub(crate) fn finish(&self) -> HealthRecord {
        self.replace(|r| HealthRecord {
            status: Status::Waiting,
            last_execution: r.status,
            ..r.clone()
        })
    }
}
