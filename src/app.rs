//! The widget core as seen by the window layer.
//!
//! `App` owns the task list, the settings and the dialog coordinator for one
//! widget instance. It is created with [`App::open`], optionally starts the
//! reminder loop, and is torn down with [`App::shutdown`].

use std::sync::{Arc, MutexGuard};
use std::time::Duration;

use anyhow::anyhow;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::dialog::{
    DialogCoordinator, DialogResult, DialogSubmission, OpenOutcome, apply_dialog_result,
};
use crate::model::{SharedTaskList, TaskList};
use crate::paths::AppPaths;
use crate::reminder::{Notifier, ReminderScheduler};
use crate::settings::Settings;
use crate::store::{SettingsStore, TaskStore};
use crate::types::{Task, TaskDraft, TaskId};

pub struct App {
    paths: AppPaths,
    task_store: TaskStore,
    settings_store: SettingsStore,
    settings: Settings,
    tasks: SharedTaskList,
    dialog: DialogCoordinator,
    reminders: Option<ReminderScheduler>,
}

impl App {
    pub fn open(paths: AppPaths) -> Self {
        let task_store = TaskStore::new(paths.tasks_file());
        let settings_store = SettingsStore::new(paths.settings_file());
        let settings = settings_store.load();
        let tasks = TaskList::load(task_store.clone()).into_shared();

        info!(data_dir = %paths.data_dir().display(), "widget core opened");

        Self {
            paths,
            task_store,
            settings_store,
            settings,
            tasks,
            dialog: DialogCoordinator::new(),
            reminders: None,
        }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn shared_tasks(&self) -> SharedTaskList {
        Arc::clone(&self.tasks)
    }

    fn lock_tasks(&self) -> anyhow::Result<MutexGuard<'_, TaskList>> {
        self.tasks
            .lock()
            .map_err(|_| anyhow!("task list lock poisoned"))
    }

    /// Snapshot of the display order.
    pub fn ordered_tasks(&self) -> anyhow::Result<Vec<Task>> {
        let tasks = self.lock_tasks()?;
        Ok(tasks.ordered_view().into_iter().cloned().collect())
    }

    pub fn task(&self, id: &TaskId) -> anyhow::Result<Option<Task>> {
        Ok(self.lock_tasks()?.get(id).cloned())
    }

    /// Most recently added task in storage order.
    pub fn newest_task(&self) -> anyhow::Result<Option<Task>> {
        Ok(self.lock_tasks()?.tasks().last().cloned())
    }

    pub fn load_tasks(&self) -> Vec<Task> {
        self.task_store.load()
    }

    pub fn save_tasks(&self, tasks: &[Task]) -> bool {
        self.task_store.save(tasks)
    }

    /// Re-reads `todos.json` into the live task list.
    pub fn reload_tasks(&self) -> anyhow::Result<()> {
        self.lock_tasks()?.reload();
        Ok(())
    }

    pub fn load_settings(&self) -> Settings {
        self.settings_store.load()
    }

    pub fn save_settings(&self, settings: &Settings) -> bool {
        self.settings_store.save(settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Edits the live settings and persists them. The closure's error
    /// leaves both the live and the stored settings untouched.
    pub fn update_settings(
        &mut self,
        edit: impl FnOnce(&mut Settings) -> anyhow::Result<()>,
    ) -> anyhow::Result<bool> {
        let mut next = self.settings.clone();
        edit(&mut next)?;
        self.settings = next;
        Ok(self.settings_store.save(&self.settings))
    }

    pub fn toggle_completed(&self, id: &TaskId) -> anyhow::Result<bool> {
        Ok(self.lock_tasks()?.toggle_completed(id))
    }

    pub fn apply_dialog_result(&self, result: DialogResult) -> anyhow::Result<bool> {
        let mut tasks = self.lock_tasks()?;
        let saved = apply_dialog_result(&mut *tasks, result, Utc::now())?;
        if !saved {
            warn!("task changes were applied but could not be saved");
        }
        Ok(saved)
    }

    pub fn dialog(&self) -> &DialogCoordinator {
        &self.dialog
    }

    pub fn open_create_dialog(&mut self) -> OpenOutcome {
        self.dialog.open_create()
    }

    pub fn open_edit_dialog(&mut self, id: TaskId) -> OpenOutcome {
        self.dialog.open_edit(id)
    }

    /// Field values to pre-populate an edit dialog with.
    pub fn dialog_prefill(&self) -> anyhow::Result<Option<TaskDraft>> {
        let Some(id) = self.dialog.editing_id() else {
            return Ok(None);
        };
        Ok(self.lock_tasks()?.get(id).map(TaskDraft::from_task))
    }

    pub fn cancel_dialog(&mut self) {
        self.dialog.cancel();
    }

    /// Routes a dialog submission to the task list. Returns whether the
    /// resulting save succeeded.
    pub fn submit_dialog(&mut self, submission: DialogSubmission) -> anyhow::Result<bool> {
        match self.dialog.submit(submission)? {
            Some(result) => self.apply_dialog_result(result),
            None => Ok(true),
        }
    }

    /// Starts the reminder loop. Must be called from within a tokio runtime.
    pub fn start_reminders(&mut self, notifier: Arc<dyn Notifier>, interval: Duration) {
        if self.reminders.is_some() {
            debug!("reminder scheduler already running");
            return;
        }
        self.reminders = Some(ReminderScheduler::spawn(
            Arc::clone(&self.tasks),
            notifier,
            interval,
        ));
    }

    pub fn reminders_running(&self) -> bool {
        self.reminders
            .as_ref()
            .is_some_and(|scheduler| !scheduler.is_stopped())
    }

    pub async fn shutdown(mut self) {
        self.dialog.cancel();
        if let Some(scheduler) = self.reminders.take() {
            scheduler.shutdown().await;
        }
        info!("widget core shut down");
    }
}
