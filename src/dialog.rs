//! Add/edit dialog coordination.
//!
//! At most one dialog is open at a time. The coordinator remembers whether it
//! was opened for a new task or for editing an existing one, and turns the
//! dialog's submission into a [`DialogResult`] for the task list.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::model::TaskList;
use crate::store::TaskPersistence;
use crate::types::{TaskDraft, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DialogState {
    #[default]
    Closed,
    Create,
    Edit(TaskId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened,
    /// A dialog was already open; it should be focused instead.
    Refocused,
}

/// What the dialog window sends back on confirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogSubmission {
    Save(TaskDraft),
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogResult {
    Create(TaskDraft),
    Update { id: TaskId, draft: TaskDraft },
    Delete(TaskId),
}

impl DialogResult {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update { .. } => "update",
            Self::Delete(_) => "delete",
        }
    }
}

#[derive(Debug, Default)]
pub struct DialogCoordinator {
    state: DialogState,
}

impl DialogCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DialogState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != DialogState::Closed
    }

    pub fn editing_id(&self) -> Option<&TaskId> {
        match &self.state {
            DialogState::Edit(id) => Some(id),
            _ => None,
        }
    }

    pub fn open_create(&mut self) -> OpenOutcome {
        self.open(DialogState::Create)
    }

    pub fn open_edit(&mut self, id: TaskId) -> OpenOutcome {
        self.open(DialogState::Edit(id))
    }

    fn open(&mut self, next: DialogState) -> OpenOutcome {
        if self.is_open() {
            debug!(current = ?self.state, requested = ?next, "dialog already open; refocusing");
            return OpenOutcome::Refocused;
        }
        debug!(state = ?next, "dialog opened");
        self.state = next;
        OpenOutcome::Opened
    }

    pub fn cancel(&mut self) {
        if self.is_open() {
            debug!(state = ?self.state, "dialog cancelled");
        }
        self.state = DialogState::Closed;
    }

    /// Resolves a submission against the current state and closes the
    /// dialog. An invalid draft is rejected and the dialog stays open.
    pub fn submit(&mut self, submission: DialogSubmission) -> anyhow::Result<Option<DialogResult>> {
        if let DialogSubmission::Save(draft) = &submission
            && self.is_open()
        {
            draft.validate()?;
        }

        let state = std::mem::take(&mut self.state);
        let result = match (state, submission) {
            (DialogState::Closed, _) => {
                debug!("submission ignored; no dialog open");
                None
            }
            (DialogState::Create, DialogSubmission::Save(draft)) => {
                Some(DialogResult::Create(draft.normalized()))
            }
            (DialogState::Create, DialogSubmission::Delete) => None,
            (DialogState::Edit(id), DialogSubmission::Save(draft)) => Some(DialogResult::Update {
                id,
                draft: draft.normalized(),
            }),
            (DialogState::Edit(id), DialogSubmission::Delete) => Some(DialogResult::Delete(id)),
        };

        Ok(result)
    }
}

/// Applies a dialog result to the task list. Returns whether the
/// resulting save succeeded; misses on unknown ids count as success.
pub fn apply_dialog_result<P: TaskPersistence>(
    tasks: &mut TaskList<P>,
    result: DialogResult,
    now: DateTime<Utc>,
) -> anyhow::Result<bool> {
    debug!(action = result.action(), "applying dialog result");
    let saved = match result {
        DialogResult::Create(draft) => {
            draft.validate()?;
            tasks.add(draft.normalized().into_task(TaskId::generate(), now))
        }
        DialogResult::Update { id, draft } => {
            draft.validate()?;
            tasks.update(&id, draft.normalized())
        }
        DialogResult::Delete(id) => tasks.delete(&id),
    };
    Ok(saved)
}
