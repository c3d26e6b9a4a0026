use crate::models::{Category, Priority, Task};
use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tracing::warn;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => task.category == category,
        }
    }

    /// All -> personal -> ... -> other -> All
    pub fn next(self) -> CategoryFilter {
        match self {
            CategoryFilter::All => CategoryFilter::Only(Category::ALL[0]),
            CategoryFilter::Only(category) if category == Category::ALL[Category::ALL.len() - 1] => {
                CategoryFilter::All
            }
            CategoryFilter::Only(category) => CategoryFilter::Only(category.next()),
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("All"),
            CategoryFilter::Only(category) => write!(f, "{}", category),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PriorityFilter {
    #[default]
    All,
    Only(Priority),
}

impl PriorityFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::Only(priority) => task.priority == priority,
        }
    }

    pub fn next(self) -> PriorityFilter {
        match self {
            PriorityFilter::All => PriorityFilter::Only(Priority::High),
            PriorityFilter::Only(Priority::Low) => PriorityFilter::All,
            PriorityFilter::Only(priority) => PriorityFilter::Only(priority.next()),
        }
    }
}

impl fmt::Display for PriorityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityFilter::All => f.write_str("All"),
            PriorityFilter::Only(priority) => write!(f, "{}", priority),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    /// Collection order, as left by manual reordering.
    #[default]
    Manual,
    DateAdded,
    DueDate,
    Priority,
    Alphabetical,
}

impl SortKey {
    pub const ALL: [SortKey; 5] = [
        SortKey::Manual,
        SortKey::DateAdded,
        SortKey::DueDate,
        SortKey::Priority,
        SortKey::Alphabetical,
    ];

    pub fn next(self) -> SortKey {
        let index = SortKey::ALL.iter().position(|k| *k == self).unwrap_or(0);
        SortKey::ALL[(index + 1) % SortKey::ALL.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::Manual => "Manual",
            SortKey::DateAdded => "Date added",
            SortKey::DueDate => "Due date",
            SortKey::Priority => "Priority",
            SortKey::Alphabetical => "A-Z",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    pub search: String,
    pub category: CategoryFilter,
    pub priority: PriorityFilter,
    pub sort: SortKey,
}

impl Query {
    pub fn with_sort(sort: SortKey) -> Self {
        Query {
            sort,
            ..Query::default()
        }
    }
}

/// Filters then sorts `tasks` into a view. The input is left untouched and
/// the result only depends on the arguments.
pub fn derive_view<'a>(tasks: &'a [Task], query: &Query) -> Vec<&'a Task> {
    let needle = query.search.to_lowercase();

    let mut view: Vec<&Task> = tasks
        .iter()
        .filter(|task| needle.is_empty() || task.text.to_lowercase().contains(&needle))
        .filter(|task| query.category.matches(task))
        .filter(|task| query.priority.matches(task))
        .collect();

    // sort_by is stable, ties keep their filtered order
    match query.sort {
        SortKey::Manual => {}
        SortKey::DateAdded => view.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortKey::DueDate => view.sort_by(|a, b| match (a.due_date, b.due_date) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
        SortKey::Priority => view.sort_by_key(|task| task.priority.rank()),
        SortKey::Alphabetical => {
            let collator = match Collator::try_new(Default::default(), CollatorOptions::default()) {
                Ok(collator) => Some(collator),
                Err(err) => {
                    warn!(error = %err, "collation data unavailable, sorting by case-folded text");
                    None
                }
            };
            view.sort_by(|a, b| compare_text(collator.as_ref(), &a.text, &b.text))
        }
    }

    view
}

// Root-locale collation, so accents and case sort next to their base letter.
// Exact text breaks the remaining ties.
fn compare_text(collator: Option<&CollatorBorrowed<'static>>, a: &str, b: &str) -> Ordering {
    let collated = match collator {
        Some(collator) => collator.compare(a, b),
        None => a.to_lowercase().cmp(&b.to_lowercase()),
    };
    collated.then_with(|| a.cmp(b))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
}

impl Stats {
    pub fn of(tasks: &[Task]) -> Self {
        let completed = tasks.iter().filter(|task| task.completed).count();
        Stats {
            total: tasks.len(),
            pending: tasks.len() - completed,
            completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskId;
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap()
    }

    fn task(id: &str, text: &str, priority: Priority) -> Task {
        Task {
            id: TaskId::new(id),
            text: text.to_string(),
            category: Category::Personal,
            priority,
            due_date: None,
            completed: false,
            created_at: base_time() + Duration::minutes(id.parse::<i64>().unwrap_or(0)),
        }
    }

    fn view_ids(view: &[&Task]) -> Vec<String> {
        view.iter().map(|task| task.id.to_string()).collect()
    }

    #[test]
    fn test_empty_query_keeps_collection_order() {
        let tasks = vec![
            task("3", "c", Priority::Low),
            task("1", "a", Priority::High),
            task("2", "b", Priority::Medium),
        ];
        let view = derive_view(&tasks, &Query::default());
        assert_eq!(view_ids(&view), vec!["3", "1", "2"]);
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let tasks = vec![
            task("1", "Buy MILK", Priority::Low),
            task("2", "Walk the dog", Priority::Low),
            task("3", "milkshake", Priority::Low),
        ];
        let query = Query {
            search: "Milk".to_string(),
            ..Query::default()
        };
        assert_eq!(view_ids(&derive_view(&tasks, &query)), vec!["1", "3"]);
    }

    #[test]
    fn test_filters_combine() {
        let mut tasks = vec![
            task("1", "a", Priority::High),
            task("2", "b", Priority::High),
            task("3", "c", Priority::Low),
        ];
        tasks[0].category = Category::Work;
        tasks[2].category = Category::Work;

        let query = Query {
            category: CategoryFilter::Only(Category::Work),
            priority: PriorityFilter::Only(Priority::High),
            ..Query::default()
        };
        assert_eq!(view_ids(&derive_view(&tasks, &query)), vec!["1"]);
    }

    #[test]
    fn test_sort_date_added_newest_first() {
        let tasks = vec![
            task("1", "a", Priority::Low),
            task("3", "c", Priority::Low),
            task("2", "b", Priority::Low),
        ];
        let view = derive_view(&tasks, &Query::with_sort(SortKey::DateAdded));
        assert_eq!(view_ids(&view), vec!["3", "2", "1"]);
    }

    #[test]
    fn test_sort_due_date_puts_undated_last() {
        let mut tasks = vec![
            task("1", "no date high", Priority::High),
            task("2", "later", Priority::Low),
            task("3", "aaa no date", Priority::High),
            task("4", "sooner", Priority::Low),
        ];
        tasks[1].due_date = NaiveDate::from_ymd_opt(2026, 12, 1);
        tasks[3].due_date = NaiveDate::from_ymd_opt(2026, 11, 1);

        let view = derive_view(&tasks, &Query::with_sort(SortKey::DueDate));
        assert_eq!(view_ids(&view), vec!["4", "2", "1", "3"]);
    }

    #[test]
    fn test_sort_priority_is_stable() {
        let tasks = vec![
            task("1", "low", Priority::Low),
            task("2", "first high", Priority::High),
            task("3", "medium", Priority::Medium),
            task("4", "second high", Priority::High),
        ];
        let view = derive_view(&tasks, &Query::with_sort(SortKey::Priority));
        let priorities: Vec<Priority> = view.iter().map(|task| task.priority).collect();
        assert_eq!(
            priorities,
            vec![Priority::High, Priority::High, Priority::Medium, Priority::Low]
        );
        assert_eq!(view_ids(&view), vec!["2", "4", "3", "1"]);
    }

    #[test]
    fn test_sort_alphabetical_keeps_cases_together() {
        let tasks = vec![
            task("1", "banana", Priority::Low),
            task("2", "Apple", Priority::Low),
            task("3", "cherry", Priority::Low),
            task("4", "apple", Priority::Low),
        ];
        let view = derive_view(&tasks, &Query::with_sort(SortKey::Alphabetical));
        assert_eq!(view_ids(&view), vec!["4", "2", "1", "3"]);
    }

    #[test]
    fn test_sort_alphabetical_places_accented_letters_with_base() {
        let tasks = vec![
            task("1", "zebra", Priority::Low),
            task("2", "Éclair", Priority::Low),
            task("3", "apple", Priority::Low),
            task("4", "eclipse", Priority::Low),
        ];
        let view = derive_view(&tasks, &Query::with_sort(SortKey::Alphabetical));
        let texts: Vec<&str> = view.iter().map(|task| task.text.as_str()).collect();
        assert_eq!(texts, vec!["apple", "Éclair", "eclipse", "zebra"]);
    }

    #[test]
    fn test_derive_view_is_pure() {
        let mut tasks = vec![
            task("1", "b", Priority::Low),
            task("2", "a", Priority::High),
            task("3", "c", Priority::Medium),
        ];
        tasks[2].due_date = NaiveDate::from_ymd_opt(2026, 10, 30);
        let snapshot = tasks.clone();

        for sort in SortKey::ALL {
            let query = Query::with_sort(sort);
            let first = view_ids(&derive_view(&tasks, &query));
            let second = view_ids(&derive_view(&tasks, &query));
            assert_eq!(first, second);
        }
        assert_eq!(tasks, snapshot);
    }

    #[test]
    fn test_filter_cycles_return_to_all() {
        let mut filter = CategoryFilter::All;
        for _ in 0..Category::ALL.len() + 1 {
            filter = filter.next();
        }
        assert_eq!(filter, CategoryFilter::All);

        let mut filter = PriorityFilter::All;
        for _ in 0..Priority::ALL.len() + 1 {
            filter = filter.next();
        }
        assert_eq!(filter, PriorityFilter::All);
    }

    #[test]
    fn test_stats_counts() {
        let mut tasks = vec![
            task("1", "a", Priority::Low),
            task("2", "b", Priority::Low),
            task("3", "c", Priority::Low),
        ];
        tasks[1].completed = true;
        assert_eq!(
            Stats::of(&tasks),
            Stats {
                total: 3,
                pending: 2,
                completed: 1
            }
        );
    }
}
