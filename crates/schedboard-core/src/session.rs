//! Editing sessions with undo/redo
//!
//! A [`Session`] owns the mutable copy of an ingested workbook. The parsed
//! snapshot is kept as an immutable baseline for "reset to original". Every
//! committed edit pushes a full [`ScheduleData`] snapshot onto a bounded
//! history; the oldest entries fall off once the depth cap is reached.
//!
//! [`SessionStore`] maps session keys to sessions so one process can serve
//! several independent editors without shared mutable state.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validate::{validate_edit, ValidationErrors};
use crate::{ProjectInfo, ScheduleData, Task, TaskId};

/// Default number of snapshots kept per session
pub const DEFAULT_HISTORY_DEPTH: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Snapshots kept for undo/redo, including the current one
    pub history_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_HISTORY_DEPTH,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no task with id {0}")]
    UnknownTask(TaskId),

    #[error("edit rejected: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("no session with key '{0}'")]
    UnknownSession(String),
}

// ============================================================================
// Edit History
// ============================================================================

/// Bounded list of committed snapshots with a cursor
#[derive(Clone, Debug)]
pub struct EditHistory {
    entries: VecDeque<ScheduleData>,
    cursor: usize,
    depth: usize,
}

impl EditHistory {
    /// Start a history whose only entry is `initial`
    pub fn new(initial: ScheduleData, depth: usize) -> Self {
        let mut entries = VecDeque::with_capacity(depth.max(1));
        entries.push_back(initial);
        Self {
            entries,
            cursor: 0,
            depth: depth.max(1),
        }
    }

    pub fn current(&self) -> &ScheduleData {
        &self.entries[self.cursor]
    }

    /// Record a new snapshot. Anything redoable is discarded first.
    pub fn push(&mut self, snapshot: ScheduleData) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(snapshot);
        while self.entries.len() > self.depth {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn undo(&mut self) -> Option<&ScheduleData> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.current())
    }

    pub fn redo(&mut self) -> Option<&ScheduleData> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.current())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Clone, Debug)]
pub struct Session {
    baseline: ScheduleData,
    history: EditHistory,
}

impl Session {
    pub fn new(baseline: ScheduleData, config: &SessionConfig) -> Self {
        let history = EditHistory::new(baseline.clone(), config.history_depth);
        Self { baseline, history }
    }

    /// The ingested snapshot, never mutated
    pub fn baseline(&self) -> &ScheduleData {
        &self.baseline
    }

    pub fn current(&self) -> &ScheduleData {
        self.history.current()
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    /// Validate the rows that differ from the current snapshot and record
    /// the whole edited snapshot. Task ids are renumbered before it is stored.
    pub fn commit(&mut self, mut data: ScheduleData) -> Result<(), SessionError> {
        validate_edit(self.current(), &data)?;
        data.renumber();
        self.history.push(data);
        Ok(())
    }

    /// Apply `change` to a copy of the current snapshot and commit it
    pub fn edit<F>(&mut self, change: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut ScheduleData) -> Result<(), SessionError>,
    {
        let mut next = self.current().clone();
        change(&mut next)?;
        self.commit(next)
    }

    /// Append a task; returns its id
    pub fn add_task(&mut self, task: Task) -> Result<TaskId, SessionError> {
        self.edit(|data| {
            data.tasks.push(task);
            Ok(())
        })?;
        Ok(self.current().tasks.len() as TaskId)
    }

    /// Remove a task and renumber the rest
    pub fn delete_task(&mut self, id: TaskId) -> Result<Task, SessionError> {
        let mut removed = None;
        self.edit(|data| {
            let index = data
                .tasks
                .iter()
                .position(|t| t.id == id)
                .ok_or(SessionError::UnknownTask(id))?;
            removed = Some(data.tasks.remove(index));
            Ok(())
        })?;
        removed.ok_or(SessionError::UnknownTask(id))
    }

    /// Replace one task's fields, keeping its id
    pub fn update_task<F>(&mut self, id: TaskId, change: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut Task),
    {
        self.edit(|data| {
            let task = data.task_mut(id).ok_or(SessionError::UnknownTask(id))?;
            change(task);
            Ok(())
        })
    }

    pub fn edit_project(&mut self, project: ProjectInfo) -> Result<(), SessionError> {
        self.edit(|data| {
            data.project = project;
            Ok(())
        })
    }

    pub fn undo(&mut self) -> Option<&ScheduleData> {
        self.history.undo()
    }

    pub fn redo(&mut self) -> Option<&ScheduleData> {
        self.history.redo()
    }

    /// Return to the ingested snapshot. The reset is itself undoable.
    pub fn reset(&mut self) {
        self.history.push(self.baseline.clone());
    }
}

// ============================================================================
// Session Store
// ============================================================================

/// Sessions keyed by caller-chosen identifiers
#[derive(Debug, Default)]
pub struct SessionStore {
    config: SessionConfig,
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
        }
    }

    /// Open (or replace) the session under `key` with a fresh baseline
    pub fn open(&mut self, key: impl Into<String>, baseline: ScheduleData) -> &mut Session {
        let session = Session::new(baseline, &self.config);
        match self.sessions.entry(key.into()) {
            Entry::Occupied(mut entry) => {
                entry.insert(session);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(session),
        }
    }

    pub fn get(&self, key: &str) -> Result<&Session, SessionError> {
        self.sessions
            .get(key)
            .ok_or_else(|| SessionError::UnknownSession(key.to_string()))
    }

    pub fn get_mut(&mut self, key: &str) -> Result<&mut Session, SessionError> {
        self.sessions
            .get_mut(key)
            .ok_or_else(|| SessionError::UnknownSession(key.to_string()))
    }

    pub fn close(&mut self, key: &str) -> Option<Session> {
        self.sessions.remove(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
