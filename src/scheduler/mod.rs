//! Recurring execution of applications.
//!
//! The [`Scheduler`] keeps one entry per application with its next due time.
//! [`engine::run_scheduler_loop`] drives it: every tick, due applications run one
//! at a time on the loop's own task, in the order they became due.

pub mod engine;
pub mod recurrence;

pub use self::engine::run_scheduler_loop;
pub use self::recurrence::Recurrence;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::application::AppHandle;
use crate::error::CoreError;

struct Entry {
    app: Arc<AppHandle>,
    /// `None` once the recurrence has no further occurrence.
    next_run: Option<DateTime<Utc>>,
}

/// Schedule entries for the loaded applications. Nothing is persisted.
#[derive(Default)]
pub struct Scheduler {
    entries: Vec<Entry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `app` with its own recurrence, first due one period from now.
    pub fn register(&mut self, app: Arc<AppHandle>) {
        self.register_at(app, Utc::now());
    }

    pub fn register_at(&mut self, app: Arc<AppHandle>, now: DateTime<Utc>) {
        let next_run = app.recurrence().next_after(now);
        match next_run {
            Some(at) => debug!(
                app = %app.name(),
                recurrence = %app.recurrence(),
                next_run = %at.to_rfc3339(),
                "Application scheduled"
            ),
            None => warn!(app = %app.name(), recurrence = %app.recurrence(), "Recurrence has no upcoming run"),
        }
        self.entries.push(Entry { app, next_run });
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            debug!(count = self.entries.len(), "Clearing schedule");
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_run(&self, name: &str) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .find(|e| e.app.name() == name)
            .and_then(|e| e.next_run)
    }

    /// Indices of entries due at `now`, earliest due first.
    fn due(&self, now: DateTime<Utc>) -> Vec<usize> {
        let mut due: Vec<(DateTime<Utc>, usize)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.next_run.filter(|at| *at <= now).map(|at| (at, i)))
            .collect();
        due.sort();
        due.into_iter().map(|(_, i)| i).collect()
    }

    /// Upcoming runs within `hours` of `from`, sorted by time. Nothing is executed.
    ///
    /// Fails with [`CoreError::Horizon`] when `from + hours` is not a representable time.
    pub fn preview(&self, from: DateTime<Utc>, hours: u64) -> Result<Vec<(DateTime<Utc>, String)>, CoreError> {
        let end = i64::try_from(hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .and_then(|span| from.checked_add_signed(span))
            .ok_or(CoreError::Horizon(hours))?;
        Ok(self.preview_until(end))
    }

    fn preview_until(&self, end: DateTime<Utc>) -> Vec<(DateTime<Utc>, String)> {
        let mut preview = Vec::new();

        for entry in &self.entries {
            let recurrence = entry.app.recurrence();
            let mut next = entry.next_run;
            while let Some(at) = next {
                if at > end {
                    break;
                }
                preview.push((at, entry.app.name().to_string()));
                // A recurrence that does not move forward would repeat `at` forever.
                next = recurrence.next_after(at).filter(|n| *n > at);
            }
        }

        preview.sort();
        preview
    }
}
