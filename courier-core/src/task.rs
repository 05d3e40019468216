//! Schedulable notification tasks.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a task.
///
/// Transitions are monotonic (`Created → Processing → Completed | Failed`);
/// a failed task only re-enters `Processing` through an explicit manual
/// retry of its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Created,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of notification a task produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Document,
    Request,
    Task,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Document => "document",
            NotificationType::Request => "request",
            NotificationType::Task => "task",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Calendar unit of a recurrence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceUnit {
    #[serde(alias = "days")]
    Day,
    #[serde(alias = "weeks")]
    Week,
    #[serde(alias = "months")]
    Month,
}

impl RecurrenceUnit {
    /// Parse a unit name, accepting singular and plural forms.
    ///
    /// Unrecognized strings yield `None`; callers treat that as "no
    /// recurrence", which keeps unknown units firing rather than silently
    /// suppressed.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" | "days" => Some(RecurrenceUnit::Day),
            "week" | "weeks" => Some(RecurrenceUnit::Week),
            "month" | "months" => Some(RecurrenceUnit::Month),
            _ => None,
        }
    }
}

/// A schedulable unit of notification work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,

    /// Date the notification is due
    pub notification_date: NaiveDate,
    /// Time of day ("HH:MM") gating same-day delivery
    pub notification_time: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,

    /// Recurrence spacing; both fields must be present for a rule to apply
    pub recurrence_interval: Option<u32>,
    pub recurrence_unit: Option<RecurrenceUnit>,

    /// Raw recipient ids: a JSON array or a comma-separated list
    pub recipient_list: String,
    pub notification_type: NotificationType,

    /// Opaque payload consumed by template substitution (document/request
    /// name and id by convention)
    pub metadata: serde_json::Value,
    pub company: Option<String>,
    pub url: Option<String>,

    pub status: TaskStatus,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a task in the `Created` state, due on the given date.
    pub fn new(
        name: impl Into<String>,
        notification_date: NaiveDate,
        notification_type: NotificationType,
        recipient_list: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            notification_date,
            notification_time: None,
            start_date: None,
            end_date: None,
            recurrence_interval: None,
            recurrence_unit: None,
            recipient_list: recipient_list.into(),
            notification_type,
            metadata: serde_json::Value::Null,
            company: None,
            url: None,
            status: TaskStatus::Created,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the time-of-day gate.
    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.notification_time = Some(time.into());
        self
    }

    /// Set a recurrence rule.
    pub fn with_recurrence(mut self, interval: u32, unit: RecurrenceUnit) -> Self {
        self.recurrence_interval = Some(interval);
        self.recurrence_unit = Some(unit);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the template metadata payload.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Parsed recipient ids.
    pub fn recipients(&self) -> RecipientList {
        RecipientList::parse(&self.recipient_list)
    }

    /// Whether the task declares a complete recurrence rule.
    pub fn is_recurrent(&self) -> bool {
        self.recurrence_unit.is_some() && self.recurrence_interval.is_some()
    }
}

/// Validated list of recipient identifiers.
///
/// The persisted form is a string in one of two legacy encodings: a JSON
/// array (`["a", "b"]`) or a comma-separated list (`a, b`). Parsing happens
/// once, here; downstream code only sees the id list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecipientList(Vec<String>);

impl RecipientList {
    /// Parse either encoding, dropping empty entries.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self(Vec::new());
        }

        if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
            match value {
                serde_json::Value::Array(items) => {
                    let ids = items
                        .into_iter()
                        .filter_map(|item| match item {
                            serde_json::Value::String(s) => Some(s),
                            serde_json::Value::Number(n) => Some(n.to_string()),
                            _ => None,
                        })
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect();
                    return Self(ids);
                }
                serde_json::Value::String(s) => {
                    let s = s.trim().to_string();
                    return if s.is_empty() {
                        Self(Vec::new())
                    } else {
                        Self(vec![s])
                    };
                }
                serde_json::Value::Number(n) => return Self(vec![n.to_string()]),
                _ => {}
            }
        }

        let ids = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self(ids)
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl IntoIterator for RecipientList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_task_defaults() {
        let task = Task::new(
            "expiry reminder",
            date(2025, 6, 1),
            NotificationType::Document,
            "[]",
        );
        assert_eq!(task.status, TaskStatus::Created);
        assert!(!task.is_recurrent());
        assert!(task.notification_time.is_none());
    }

    #[test]
    fn test_task_recurrence_requires_both_fields() {
        let mut task = Task::new("t", date(2025, 6, 1), NotificationType::Task, "a");
        task.recurrence_interval = Some(2);
        assert!(!task.is_recurrent());

        task.recurrence_unit = Some(RecurrenceUnit::Week);
        assert!(task.is_recurrent());
    }

    #[test]
    fn test_recurrence_unit_parse_aliases() {
        assert_eq!(RecurrenceUnit::parse("day"), Some(RecurrenceUnit::Day));
        assert_eq!(RecurrenceUnit::parse("Days"), Some(RecurrenceUnit::Day));
        assert_eq!(RecurrenceUnit::parse("WEEK"), Some(RecurrenceUnit::Week));
        assert_eq!(RecurrenceUnit::parse("months"), Some(RecurrenceUnit::Month));
        assert_eq!(RecurrenceUnit::parse("fortnight"), None);
    }

    #[test]
    fn test_recipient_list_json_array() {
        let list = RecipientList::parse(r#"["u1", "u2", "u3"]"#);
        assert_eq!(list.ids(), ["u1", "u2", "u3"]);
    }

    #[test]
    fn test_recipient_list_comma_separated() {
        let list = RecipientList::parse("u1, u2 ,u3");
        assert_eq!(list.ids(), ["u1", "u2", "u3"]);
    }

    #[test]
    fn test_recipient_list_single_id() {
        let list = RecipientList::parse("user-7");
        assert_eq!(list.ids(), ["user-7"]);
    }

    #[test]
    fn test_recipient_list_json_string() {
        let list = RecipientList::parse(r#""user-7""#);
        assert_eq!(list.ids(), ["user-7"]);
    }

    #[test]
    fn test_recipient_list_drops_empties() {
        let list = RecipientList::parse("u1,, ,u2");
        assert_eq!(list.ids(), ["u1", "u2"]);

        let list = RecipientList::parse(r#"["u1", "", "  "]"#);
        assert_eq!(list.ids(), ["u1"]);
    }

    #[test]
    fn test_recipient_list_empty_input() {
        assert!(RecipientList::parse("").is_empty());
        assert!(RecipientList::parse("   ").is_empty());
        assert!(RecipientList::parse("[]").is_empty());
    }

    #[test]
    fn test_recipient_list_numeric_ids() {
        let list = RecipientList::parse("[1, 2]");
        assert_eq!(list.ids(), ["1", "2"]);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TaskStatus::Created.to_string(), "created");
        assert_eq!(TaskStatus::Failed.to_string(), "failed");
        assert_eq!(NotificationType::Document.to_string(), "document");
    }

    #[test]
    fn test_task_serde_round_trip() {
        let task = Task::new("t", date(2025, 3, 15), NotificationType::Request, "a,b")
            .with_time("09:30")
            .with_recurrence(2, RecurrenceUnit::Day);
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back.notification_time.as_deref(), Some("09:30"));
        assert_eq!(back.recurrence_unit, Some(RecurrenceUnit::Day));
        assert_eq!(back.status, TaskStatus::Created);
    }
}
