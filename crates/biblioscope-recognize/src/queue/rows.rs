use std::collections::VecDeque;
use std::fmt;

use biblioscope_core::ItemId;
use serde::{Deserialize, Serialize};

use super::observer::{RowEvent, RowSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Queued,
    Processing,
    Failed,
    Succeeded,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Failed => "failed",
            Self::Succeeded => "succeeded",
        }
    }

    /// Failed and succeeded rows are done; re-adding their id starts over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Succeeded)
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Observable state of one queued attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRow {
    pub id: ItemId,
    pub status: RowStatus,
    /// Attachment title when it was queued.
    pub file_name: String,
    pub message: String,
}

impl JobRow {
    fn queued(id: ItemId, file_name: String) -> Self {
        Self {
            id,
            status: RowStatus::Queued,
            file_name,
            message: String::new(),
        }
    }

    pub fn snapshot(&self) -> RowSnapshot {
        RowSnapshot {
            id: self.id,
            status: self.status,
            message: self.message.clone(),
        }
    }
}

/// Rows, pending ids and the worker flag. Every mutation appends the
/// notifications it causes to `events`; the caller fires them once the
/// state lock is released.
#[derive(Debug, Default)]
pub struct JobQueue {
    /// Newest first, matching processing order.
    rows: Vec<JobRow>,
    pending: VecDeque<ItemId>,
    running: bool,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, id: ItemId) -> Option<usize> {
        self.rows.iter().position(|row| row.id == id)
    }

    pub fn rows(&self) -> &[JobRow] {
        &self.rows
    }

    pub fn row(&self, id: ItemId) -> Option<&JobRow> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn pending(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.pending.iter().copied()
    }

    pub fn total_count(&self) -> usize {
        self.rows.len()
    }

    pub fn processed_count(&self) -> usize {
        self.rows.iter().filter(|row| row.status.is_terminal()).count()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Queue `id` at the front. Returns `false` when a row for it is still
    /// queued or processing.
    pub fn enqueue(&mut self, id: ItemId, file_name: &str, events: &mut Vec<RowEvent>) -> bool {
        let was_empty = self.rows.is_empty();
        if let Some(idx) = self.position(id) {
            if !self.rows[idx].status.is_terminal() {
                return false;
            }
            let old = self.rows.remove(idx);
            events.push(RowEvent::Deleted(old.snapshot()));
        }

        let row = JobRow::queued(id, file_name.to_string());
        events.push(RowEvent::Added(row.snapshot()));
        self.rows.insert(0, row);
        if was_empty {
            events.push(RowEvent::NonEmpty);
        }

        // A failed row may still be waiting for its retry.
        self.pending.retain(|pending| *pending != id);
        self.pending.push_front(id);
        true
    }

    /// Set status and message of an existing row. Missing rows are ignored.
    pub fn update_row(
        &mut self,
        id: ItemId,
        status: RowStatus,
        message: impl Into<String>,
        events: &mut Vec<RowEvent>,
    ) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        let row = &mut self.rows[idx];
        row.status = status;
        row.message = message.into();
        events.push(RowEvent::Updated(row.snapshot()));
        true
    }

    /// Remove a row and its pending entry.
    pub fn delete_row(&mut self, id: ItemId, events: &mut Vec<RowEvent>) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        let row = self.rows.remove(idx);
        self.pending.retain(|pending| *pending != id);
        events.push(RowEvent::Deleted(row.snapshot()));
        if self.rows.is_empty() {
            events.push(RowEvent::Empty);
        }
        true
    }

    /// Drop every row and pending id. Work already in flight finishes, but
    /// its row updates find nothing to change.
    pub fn cancel_all(&mut self, events: &mut Vec<RowEvent>) {
        self.rows.clear();
        self.pending.clear();
        events.push(RowEvent::Empty);
    }

    /// Put `id` back at the end of the queue for another attempt, if its row
    /// still exists.
    pub fn requeue(&mut self, id: ItemId) -> bool {
        if self.position(id).is_none() || self.pending.contains(&id) {
            return false;
        }
        self.pending.push_back(id);
        true
    }

    /// Claim the worker slot. `false` when a worker is already running.
    pub fn try_start(&mut self) -> bool {
        !std::mem::replace(&mut self.running, true)
    }

    /// Release the worker slot when nothing is pending. Returns whether the
    /// worker should stop.
    pub fn stop_if_empty(&mut self) -> bool {
        if self.pending.is_empty() {
            self.running = false;
            return true;
        }
        false
    }

    /// Take the next id, releasing the worker slot when there is none.
    pub fn next_job(&mut self) -> Option<ItemId> {
        let next = self.pending.pop_front();
        if next.is_none() {
            self.running = false;
        }
        next
    }
}
