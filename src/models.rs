use crate::error::Error;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Opaque task identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        TaskId(id.into())
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

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Personal,
    Work,
    Shopping,
    Health,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Personal,
        Category::Work,
        Category::Shopping,
        Category::Health,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Personal => "personal",
            Category::Work => "work",
            Category::Shopping => "shopping",
            Category::Health => "health",
            Category::Other => "other",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Category::Personal => "👤",
            Category::Work => "💼",
            Category::Shopping => "🛒",
            Category::Health => "❤️",
            Category::Other => "📌",
        }
    }

    pub fn next(self) -> Category {
        cycle(&Category::ALL, self, 1)
    }

    pub fn previous(self) -> Category {
        cycle(&Category::ALL, self, Category::ALL.len() - 1)
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownCategory(s.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&capitalize(self.as_str()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    /// Sort rank, lowest first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Priority::High => "🔴",
            Priority::Medium => "🟠",
            Priority::Low => "🟢",
        }
    }

    pub fn next(self) -> Priority {
        cycle(&Priority::ALL, self, 1)
    }

    pub fn previous(self) -> Priority {
        cycle(&Priority::ALL, self, Priority::ALL.len() - 1)
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Priority::High),
            "medium" | "m" => Ok(Priority::Medium),
            "low" | "l" => Ok(Priority::Low),
            _ => Err(Error::UnknownPriority(s.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&capitalize(self.as_str()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

// Task record, serialized in the same shape the stored blob uses
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub category: Category,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < today)
    }
}

// Fields supplied when creating a task
#[derive(Clone, Debug, PartialEq)]
pub struct NewTask {
    pub text: String,
    pub category: Category,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

// Partial update; `due_date: Some(None)` clears the date
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskUpdate {
    pub text: Option<String>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
}

fn cycle<T: Copy + PartialEq>(all: &[T], current: T, step: usize) -> T {
    let index = all.iter().position(|v| *v == current).unwrap_or(0);
    all[(index + step) % all.len()]
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_serializes_in_stored_shape() {
        let task = Task {
            id: TaskId::new("1700000000000"),
            text: "Buy milk".to_string(),
            category: Category::Shopping,
            priority: Priority::Low,
            due_date: NaiveDate::from_ymd_opt(2026, 10, 20),
            completed: false,
            created_at: "2026-10-18T09:30:00Z".parse().unwrap(),
        };
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["id"], "1700000000000");
        assert_eq!(value["category"], "shopping");
        assert_eq!(value["priority"], "low");
        assert_eq!(value["dueDate"], "2026-10-20");
        assert_eq!(value["completed"], false);
        assert!(value["createdAt"].as_str().unwrap().starts_with("2026-10-18T09:30:00"));
    }

    #[test]
    fn test_task_reads_blob_written_by_browser_app() {
        let json = r#"{"id":"1712345678901","text":"Finish report","category":"work",
            "priority":"high","dueDate":null,"completed":true,
            "createdAt":"2024-04-05T19:34:38.901Z"}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.id.as_str(), "1712345678901");
        assert_eq!(task.category, Category::Work);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date, None);
        assert!(task.completed);
    }

    #[test]
    fn test_priority_rank_order() {
        assert!(Priority::High.rank() < Priority::Medium.rank());
        assert!(Priority::Medium.rank() < Priority::Low.rank());
    }

    #[test]
    fn test_category_cycles_through_all_values() {
        let mut category = Category::Personal;
        for _ in 0..Category::ALL.len() {
            category = category.next();
        }
        assert_eq!(category, Category::Personal);
        assert_eq!(Category::Personal.previous(), Category::Other);
    }

    #[test]
    fn test_parse_enums_from_strings() {
        assert_eq!("Work".parse::<Category>().unwrap(), Category::Work);
        assert_eq!("h".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
        assert!("garden".parse::<Category>().is_err());
    }

    #[test]
    fn test_overdue_ignores_completed_tasks() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let mut task = Task {
            id: TaskId::new("1"),
            text: "Pay rent".to_string(),
            category: Category::Personal,
            priority: Priority::High,
            due_date: NaiveDate::from_ymd_opt(2026, 10, 17),
            completed: false,
            created_at: Utc::now(),
        };
        assert!(task.is_overdue(today));
        task.completed = true;
        assert!(!task.is_overdue(today));
    }
}
