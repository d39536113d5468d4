//! Due-date reminders.
//!
//! A scan notifies once for every task inside the reminder window. Scans are
//! not de-duplicated: a task that stays inside the window is announced again
//! on every tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::model::SharedTaskList;
use crate::store::TaskPersistence;
use crate::types::Task;

pub const REMINDER_INTERVAL: Duration = Duration::from_secs(60);
pub const REMINDER_WINDOW_MINUTES: i64 = 30;
pub const NOTIFICATION_SUMMARY: &str = "To-do reminder";
const DEFAULT_NOTIFICATION_TIMEOUT_MS: u32 = 10_000;

/// Receives reminder notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, summary: &str, body: &str);
}

/// Desktop notifications via notify-rust.
#[derive(Debug, Clone, Copy)]
pub struct SystemNotifier {
    timeout_ms: u32,
}

impl Default for SystemNotifier {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_NOTIFICATION_TIMEOUT_MS,
        }
    }
}

impl Notifier for SystemNotifier {
    fn notify(&self, summary: &str, body: &str) {
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            debug!(summary, body, timeout_ms = self.timeout_ms, "sending system notification");

            let result = notify_rust::Notification::new()
                .summary(summary)
                .body(body)
                .icon("dialog-information")
                .timeout(notify_rust::Timeout::Milliseconds(self.timeout_ms))
                .show();

            if let Err(err) = result {
                warn!(error = %err, "failed to send system notification");
            }
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            debug!(
                summary,
                body,
                timeout_ms = self.timeout_ms,
                "system notifications not supported on this OS"
            );
        }
    }
}

pub fn reminder_message(title: &str) -> String {
    format!("{title} is due soon")
}

pub fn is_reminder_due(task: &Task, now: DateTime<Utc>) -> bool {
    if !task.reminder || task.completed {
        return false;
    }
    let Some(due) = task.due_date else {
        return false;
    };

    let remaining = due - now;
    remaining > TimeDelta::zero() && remaining <= TimeDelta::minutes(REMINDER_WINDOW_MINUTES)
}

pub fn due_reminders(tasks: &[Task], now: DateTime<Utc>) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|task| is_reminder_due(task, now))
        .collect()
}

/// Runs one scan and returns how many notifications were emitted.
pub fn scan(tasks: &[Task], now: DateTime<Utc>, notifier: &dyn Notifier) -> usize {
    let due = due_reminders(tasks, now);
    for task in &due {
        debug!(task_id = %task.id, due_date = ?task.due_date, "task inside reminder window");
        notifier.notify(NOTIFICATION_SUMMARY, &reminder_message(&task.title));
    }
    due.len()
}

/// Background reminder loop. Scans once immediately, then every `interval`
/// until stopped or dropped.
pub struct ReminderScheduler {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReminderScheduler {
    /// Must be called from within a tokio runtime.
    pub fn spawn<P>(
        tasks: SharedTaskList<P>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
    ) -> Self
    where
        P: TaskPersistence + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let loop_stop = Arc::clone(&stop);

        let handle = tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "reminder scheduler started");

            while !loop_stop.load(Ordering::Relaxed) {
                let now = Utc::now();
                let due = snapshot_due_tasks(&tasks, now);
                if loop_stop.load(Ordering::Relaxed) {
                    break;
                }
                let notified = scan(&due, now, notifier.as_ref());
                debug!(notified, "reminder scan finished");

                interruptible_sleep(interval, &loop_stop).await;
            }

            info!("reminder scheduler stopped");
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take()
            && let Err(err) = handle.await
        {
            warn!(error = %err, "reminder scheduler task ended abnormally");
        }
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

// Clones the due tasks so the lock is released before notifying.
fn snapshot_due_tasks<P: TaskPersistence>(
    tasks: &SharedTaskList<P>,
    now: DateTime<Utc>,
) -> Vec<Task> {
    match tasks.lock() {
        Ok(list) => due_reminders(list.tasks(), now)
            .into_iter()
            .cloned()
            .collect(),
        Err(_) => {
            warn!("task list lock poisoned; skipping reminder scan");
            Vec::new()
        }
    }
}

async fn interruptible_sleep(duration: Duration, stop: &AtomicBool) {
    let chunk = Duration::from_millis(100);
    let mut remaining = duration;
    while remaining > Duration::ZERO && !stop.load(Ordering::Relaxed) {
        let sleep_duration = remaining.min(chunk);
        tokio::time::sleep(sleep_duration).await;
        remaining = remaining.saturating_sub(sleep_duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskList;
    use crate::store::TaskStore;
    use crate::types::{Priority, TaskId};
    use chrono::TimeZone;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingNotifier {
        fn count(&self) -> usize {
            self.sent.lock().expect("recorder lock").len()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, summary: &str, body: &str) {
            self.sent
                .lock()
                .expect("recorder lock")
                .push((summary.to_string(), body.to_string()));
        }
    }

    fn reminder_task(id: &str, due_date: Option<DateTime<Utc>>) -> Task {
        Task {
            id: TaskId::from(id),
            title: format!("task {id}"),
            description: None,
            priority: Priority::Medium,
            due_date,
            reminder: true,
            completed: false,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    async fn wait_for(notifier: &RecordingNotifier, expected: usize) {
        for _ in 0..300 {
            if notifier.count() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected at least {expected} notifications, got {}", notifier.count());
    }

    #[test]
    fn test_reminder_window_boundaries() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let inside = reminder_task("inside", Some(now + TimeDelta::minutes(29)));
        let edge = reminder_task("edge", Some(now + TimeDelta::minutes(30)));
        let outside = reminder_task("outside", Some(now + TimeDelta::minutes(31)));
        let past = reminder_task("past", Some(now - TimeDelta::minutes(1)));
        let exactly_now = reminder_task("now", Some(now));

        assert!(is_reminder_due(&inside, now));
        assert!(is_reminder_due(&edge, now));
        assert!(!is_reminder_due(&outside, now));
        assert!(!is_reminder_due(&past, now));
        assert!(!is_reminder_due(&exactly_now, now));
    }

    #[test]
    fn test_reminder_requires_flag_and_incomplete() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let due = Some(now + TimeDelta::minutes(29));

        let completed = Task {
            completed: true,
            ..reminder_task("done", due)
        };
        let no_reminder = Task {
            reminder: false,
            ..reminder_task("quiet", due)
        };
        let no_due = reminder_task("undated", None);

        assert!(!is_reminder_due(&completed, now));
        assert!(!is_reminder_due(&no_reminder, now));
        assert!(!is_reminder_due(&no_due, now));
    }

    #[test]
    fn test_scan_notifies_each_due_task() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let tasks = vec![
            reminder_task("a", Some(now + TimeDelta::minutes(5))),
            reminder_task("b", Some(now + TimeDelta::minutes(45))),
            reminder_task("c", Some(now + TimeDelta::minutes(20))),
        ];
        let notifier = RecordingNotifier::default();

        assert_eq!(scan(&tasks, now, &notifier), 2);
        assert_eq!(scan(&tasks, now, &notifier), 2);

        let sent = notifier.sent.lock().expect("recorder lock");
        assert_eq!(sent.len(), 4);
        assert_eq!(
            sent[0],
            (NOTIFICATION_SUMMARY.to_string(), "task a is due soon".to_string())
        );
        assert_eq!(sent[1].1, "task c is due soon");
    }

    #[test]
    fn test_snapshot_keeps_only_due_tasks() {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let now = Utc::now();
        let shared = shared_list(
            &temp_dir,
            vec![
                reminder_task("soon", Some(now + TimeDelta::minutes(10))),
                reminder_task("later", Some(now + TimeDelta::hours(3))),
            ],
        );

        let due = snapshot_due_tasks(&shared, now);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, TaskId::from("soon"));
    }

    fn shared_list(temp_dir: &TempDir, tasks: Vec<Task>) -> SharedTaskList {
        TaskList::with_tasks(tasks, TaskStore::new(temp_dir.path().join("todos.json")))
            .into_shared()
    }

    #[tokio::test]
    async fn test_scheduler_scans_immediately_on_start() {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let tasks = shared_list(
            &temp_dir,
            vec![reminder_task("soon", Some(Utc::now() + TimeDelta::minutes(10)))],
        );
        let notifier = Arc::new(RecordingNotifier::default());

        let scheduler = ReminderScheduler::spawn(
            tasks,
            notifier.clone() as Arc<dyn Notifier>,
            REMINDER_INTERVAL,
        );
        wait_for(&notifier, 1).await;
        scheduler.shutdown().await;

        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn test_scheduler_renotifies_every_tick() {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let tasks = shared_list(
            &temp_dir,
            vec![reminder_task("soon", Some(Utc::now() + TimeDelta::minutes(10)))],
        );
        let notifier = Arc::new(RecordingNotifier::default());

        let scheduler = ReminderScheduler::spawn(
            tasks,
            notifier.clone() as Arc<dyn Notifier>,
            Duration::from_millis(20),
        );
        wait_for(&notifier, 3).await;
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_scheduler_sees_model_changes() {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let tasks = shared_list(&temp_dir, Vec::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let scheduler = ReminderScheduler::spawn(
            Arc::clone(&tasks),
            notifier.clone() as Arc<dyn Notifier>,
            Duration::from_millis(20),
        );
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(notifier.count(), 0);

        tasks
            .lock()
            .expect("task list lock")
            .add(reminder_task("late", Some(Utc::now() + TimeDelta::minutes(3))));
        wait_for(&notifier, 1).await;
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_stopped_scheduler_stays_silent() {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let tasks = shared_list(
            &temp_dir,
            vec![reminder_task("soon", Some(Utc::now() + TimeDelta::minutes(10)))],
        );
        let notifier = Arc::new(RecordingNotifier::default());

        let scheduler = ReminderScheduler::spawn(
            tasks,
            notifier.clone() as Arc<dyn Notifier>,
            Duration::from_millis(20),
        );
        wait_for(&notifier, 1).await;
        scheduler.stop();
        assert!(scheduler.is_stopped());
        scheduler.shutdown().await;

        let after_shutdown = notifier.count();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(notifier.count(), after_shutdown);
    }
}
