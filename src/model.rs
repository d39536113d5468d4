//! In-memory task collection. Every effective mutation is persisted before
//! the call returns.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::store::{TaskPersistence, TaskStore};
use crate::types::{Task, TaskDraft, TaskId, merge_update};

pub type SharedTaskList<P = TaskStore> = Arc<Mutex<TaskList<P>>>;

#[derive(Debug)]
pub struct TaskList<P: TaskPersistence = TaskStore> {
    tasks: Vec<Task>,
    persistence: P,
}

impl<P: TaskPersistence> TaskList<P> {
    pub fn load(persistence: P) -> Self {
        let tasks = persistence.load();
        debug!(task_count = tasks.len(), "loaded task list");
        Self { tasks, persistence }
    }

    pub fn with_tasks(tasks: Vec<Task>, persistence: P) -> Self {
        Self { tasks, persistence }
    }

    /// Discards in-memory state and re-reads the persisted collection.
    pub fn reload(&mut self) {
        self.tasks = self.persistence.load();
        debug!(task_count = self.tasks.len(), "reloaded task list");
    }

    pub fn into_shared(self) -> SharedTaskList<P> {
        Arc::new(Mutex::new(self))
    }

    /// Stored (insertion) order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Appends `task`. The caller guarantees its id is not already present.
    pub fn add(&mut self, task: Task) -> bool {
        debug!(task_id = %task.id, "adding task");
        self.tasks.push(task);
        self.persist()
    }

    /// Replaces the editable fields of `id`. Unknown ids are ignored.
    pub fn update(&mut self, id: &TaskId, draft: TaskDraft) -> bool {
        let Some(slot) = self.tasks.iter_mut().find(|task| &task.id == id) else {
            debug!(task_id = %id, "update ignored for unknown task");
            return true;
        };
        *slot = merge_update(slot, draft);
        debug!(task_id = %id, "updated task");
        self.persist()
    }

    pub fn toggle_completed(&mut self, id: &TaskId) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|task| &task.id == id) else {
            debug!(task_id = %id, "toggle ignored for unknown task");
            return true;
        };
        task.completed = !task.completed;
        debug!(task_id = %id, completed = task.completed, "toggled task");
        self.persist()
    }

    pub fn delete(&mut self, id: &TaskId) -> bool {
        let Some(index) = self.tasks.iter().position(|task| &task.id == id) else {
            debug!(task_id = %id, "delete ignored for unknown task");
            return true;
        };
        self.tasks.remove(index);
        debug!(task_id = %id, "deleted task");
        self.persist()
    }

    /// Incomplete tasks first, then by descending priority. Stable, and
    /// leaves the stored order untouched.
    pub fn ordered_view(&self) -> Vec<&Task> {
        let mut view = self.tasks.iter().collect::<Vec<_>>();
        view.sort_by_key(|task| (task.completed, std::cmp::Reverse(task.priority.rank())));
        view
    }

    fn persist(&self) -> bool {
        self.persistence.save(&self.tasks)
    }
}
