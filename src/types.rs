use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const NAIVE_DUE_DATE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Opaque task identifier. Assigned once at creation and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// Older widget builds wrote millisecond timestamps as numeric ids.
impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(value) => Self(value),
            RawId::Number(value) => Self(value.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(()),
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .and_then(|value| Self::from_str(&value).ok())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_due_date"
    )]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminder: bool,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < now)
    }

    /// Whole days until the due date, rounded up. Negative once overdue.
    pub fn days_until_due(&self, now: DateTime<Utc>) -> Option<i64> {
        let due = self.due_date?;
        let remaining_ms = (due - now).num_milliseconds();
        Some(-(-remaining_ms).div_euclid(DAY_MS))
    }

    pub fn due_label(&self, now: DateTime<Utc>) -> Option<String> {
        let days = self.days_until_due(now)?;
        let label = match days {
            d if d < 0 => {
                let overdue = d.unsigned_abs();
                if overdue == 1 {
                    "overdue by 1 day".to_string()
                } else {
                    format!("overdue by {overdue} days")
                }
            }
            0 => "due today".to_string(),
            1 => "due tomorrow".to_string(),
            d if d <= 7 => format!("due in {d} days"),
            _ => self
                .due_date?
                .with_timezone(&Local)
                .format("%Y-%m-%d")
                .to_string(),
        };
        Some(label)
    }
}

/// The user-editable part of a task, as submitted by the add/edit dialog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub reminder: bool,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            due_date: task.due_date,
            reminder: task.reminder,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.title.trim().is_empty() {
            bail!("task title cannot be empty");
        }
        Ok(())
    }

    /// Trims the title and drops a blank description.
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            description: self
                .description
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            ..self
        }
    }

    pub fn into_task(self, id: TaskId, created_at: DateTime<Utc>) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            priority: self.priority,
            due_date: self.due_date,
            reminder: self.reminder,
            completed: false,
            created_at,
        }
    }
}

/// Applies an edit to an existing task. Identity, completion state and
/// creation time always come from `existing`.
pub fn merge_update(existing: &Task, draft: TaskDraft) -> Task {
    Task {
        id: existing.id.clone(),
        title: draft.title,
        description: draft.description,
        priority: draft.priority,
        due_date: draft.due_date,
        reminder: draft.reminder,
        completed: existing.completed,
        created_at: existing.created_at,
    }
}

/// Accepts RFC 3339 timestamps and naive local `YYYY-MM-DDTHH:MM[:SS]`.
///
/// chrono's own format is tried first so that anything `Serialize` writes,
/// including years past 9999, reads back unchanged.
pub fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = raw.parse::<DateTime<Utc>>() {
        return Some(parsed);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    NAIVE_DUE_DATE_FORMATS.iter().find_map(|format| {
        let naive = NaiveDateTime::parse_from_str(raw, format).ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    })
}

fn deserialize_due_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }

    parse_due_date(&raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid due date '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn sample_task() -> Task {
        Task {
            id: TaskId::from("task-1"),
            title: "Write report".to_string(),
            description: Some("quarterly numbers".to_string()),
            priority: Priority::High,
            due_date: Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()),
            reminder: true,
            completed: true,
            created_at: Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_priority_rank_order() {
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!(Priority::from_str("HIGH"), Ok(Priority::High));
        assert_eq!(Priority::from_str("  low "), Ok(Priority::Low));
        assert_eq!(Priority::from_str("urgent"), Err(()));
    }

    #[test]
    fn test_unknown_priority_deserializes_as_medium() {
        let priority: Priority = serde_json::from_str("\"urgent\"").expect("should deserialize");
        assert_eq!(priority, Priority::Medium);

        let priority: Priority = serde_json::from_str("null").expect("should deserialize");
        assert_eq!(priority, Priority::Medium);
    }

    #[test]
    fn test_task_json_uses_camel_case_keys_in_declaration_order() {
        let json = serde_json::to_string(&sample_task()).expect("task should serialize");
        let keys = [
            "\"id\"",
            "\"title\"",
            "\"description\"",
            "\"priority\"",
            "\"dueDate\"",
            "\"reminder\"",
            "\"completed\"",
            "\"createdAt\"",
        ];
        let positions = keys
            .iter()
            .map(|key| json.find(key).expect("key should be present"))
            .collect::<Vec<_>>();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_task_omits_absent_optional_fields() {
        let task = Task {
            description: None,
            due_date: None,
            ..sample_task()
        };
        let json = serde_json::to_string(&task).expect("task should serialize");
        assert!(!json.contains("description"));
        assert!(!json.contains("dueDate"));
    }

    #[test]
    fn test_task_deserializes_legacy_widget_record() {
        let raw = r#"{
            "id": 1714550000000,
            "title": "Call dentist",
            "description": "",
            "priority": "low",
            "dueDate": "",
            "reminder": false,
            "completed": false,
            "createdAt": "2024-05-01T08:00:00.000Z"
        }"#;

        let task: Task = serde_json::from_str(raw).expect("legacy record should load");
        assert_eq!(task.id.as_str(), "1714550000000");
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.due_date, None);
        assert_eq!(task.description, Some(String::new()));
    }

    #[test]
    fn test_task_rejects_unparseable_due_date() {
        let raw = r#"{"id":"a","title":"t","dueDate":"next week","createdAt":"2024-05-01T08:00:00Z"}"#;
        assert!(serde_json::from_str::<Task>(raw).is_err());
    }

    #[test]
    fn test_parse_due_date_formats() {
        assert_eq!(
            parse_due_date("2024-05-01T09:30:00Z"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap())
        );
        assert!(parse_due_date("2024-05-01T09:30").is_some());
        assert!(parse_due_date("2024-05-01 09:30:15").is_some());
        assert_eq!(parse_due_date("tomorrow"), None);
    }

    #[test]
    fn test_parse_due_date_reads_back_serialized_extended_years() {
        let far = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        let written = serde_json::to_value(far).expect("timestamp should serialize");
        let written = written.as_str().expect("timestamp should be a string");

        assert!(written.starts_with("+10000-"));
        assert_eq!(parse_due_date(written), Some(far));
    }

    #[test]
    fn test_merge_update_preserves_completed_and_created_at() {
        let existing = sample_task();
        let draft = TaskDraft {
            title: "X".to_string(),
            ..TaskDraft::from_task(&existing)
        };

        let merged = merge_update(&existing, draft);

        assert_eq!(merged.title, "X");
        assert!(merged.completed);
        assert_eq!(merged.created_at, existing.created_at);
        assert_eq!(merged.id, existing.id);
    }

    #[test]
    fn test_draft_validation_and_normalization() {
        assert!(TaskDraft::new("   ").validate().is_err());
        assert!(TaskDraft::new("ok").validate().is_ok());

        let draft = TaskDraft {
            title: "  Buy milk  ".to_string(),
            description: Some("   ".to_string()),
            ..TaskDraft::default()
        }
        .normalized();
        assert_eq!(draft.title, "Buy milk");
        assert_eq!(draft.description, None);
    }

    #[test]
    fn test_due_label_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let with_due = |offset: TimeDelta| Task {
            due_date: Some(now + offset),
            completed: false,
            ..sample_task()
        };

        assert_eq!(
            with_due(TimeDelta::hours(2)).due_label(now).as_deref(),
            Some("due tomorrow")
        );
        assert_eq!(
            with_due(TimeDelta::hours(-2)).due_label(now).as_deref(),
            Some("due today")
        );
        assert_eq!(
            with_due(TimeDelta::hours(-30)).due_label(now).as_deref(),
            Some("overdue by 1 day")
        );
        assert_eq!(
            with_due(TimeDelta::days(5)).due_label(now).as_deref(),
            Some("due in 5 days")
        );
        assert_eq!(
            with_due(TimeDelta::days(-3)).due_label(now).as_deref(),
            Some("overdue by 3 days")
        );
        let far = with_due(TimeDelta::days(30));
        assert_eq!(far.due_label(now).map(|label| label.len()), Some(10));
    }

    #[test]
    fn test_is_overdue() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut task = sample_task();
        task.completed = false;
        assert!(task.is_overdue(now));

        task.completed = true;
        assert!(!task.is_overdue(now));

        task.completed = false;
        task.due_date = None;
        assert!(!task.is_overdue(now));
    }
}
