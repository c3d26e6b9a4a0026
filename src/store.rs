use crate::error::{Error, Result};
use crate::models::{NewTask, Task, TaskId, TaskUpdate};
use crate::storage::{KeyValueStore, Persistence};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};

// Millisecond-timestamp ids, bumped so they never repeat within a session
#[derive(Debug, Default)]
struct IdGenerator {
    last: i64,
    suffix: u64,
}

impl IdGenerator {
    fn seeded_from(tasks: &[Task]) -> Self {
        let last = tasks
            .iter()
            .filter_map(|task| task.id.as_str().parse::<i64>().ok())
            .max()
            .unwrap_or(0);
        IdGenerator { last, suffix: 0 }
    }

    /// Once a stored id has pinned the counter at `i64::MAX`, falls back to
    /// `<millis>-<n>` ids, skipping any that `taken` reports as used.
    fn next<F>(&mut self, now: DateTime<Utc>, taken: F) -> TaskId
    where
        F: Fn(&TaskId) -> bool,
    {
        if let Some(bumped) = self.last.checked_add(1) {
            let candidate = now.timestamp_millis().max(bumped);
            self.last = candidate;
            return TaskId::new(candidate.to_string());
        }

        loop {
            self.suffix += 1;
            let id = TaskId::new(format!("{}-{}", now.timestamp_millis(), self.suffix));
            if !taken(&id) {
                return id;
            }
        }
    }
}

/// Owns the ordered task collection and writes it through on every mutation.
pub struct TaskStore<S: KeyValueStore> {
    tasks: Vec<Task>,
    persistence: Persistence<S>,
    ids: IdGenerator,
}

impl<S: KeyValueStore> TaskStore<S> {
    pub fn open(persistence: Persistence<S>) -> Self {
        let tasks = persistence.load_tasks();
        info!(count = tasks.len(), "opened task store");
        TaskStore {
            ids: IdGenerator::seeded_from(&tasks),
            tasks,
            persistence,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    pub fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| &task.id == id)
    }

    pub fn create(&mut self, new_task: NewTask) -> Result<&Task> {
        let text = new_task.text.trim();
        if text.is_empty() {
            return Err(Error::EmptyText);
        }

        let now = Utc::now();
        let existing = &self.tasks;
        let id = self
            .ids
            .next(now, |id| existing.iter().any(|task| &task.id == id));
        let task = Task {
            id,
            text: text.to_string(),
            category: new_task.category,
            priority: new_task.priority,
            due_date: new_task.due_date,
            completed: false,
            created_at: now,
        };
        debug!(id = %task.id, "created task");

        self.tasks.insert(0, task);
        self.persist();
        Ok(&self.tasks[0])
    }

    pub fn update(&mut self, id: &TaskId, update: TaskUpdate) -> Result<()> {
        let text = match update.text {
            Some(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Err(Error::EmptyText);
                }
                Some(trimmed.to_string())
            }
            None => None,
        };

        let task = self.find_mut(id)?;
        if let Some(text) = text {
            task.text = text;
        }
        if let Some(category) = update.category {
            task.category = category;
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(due_date) = update.due_date {
            task.due_date = due_date;
        }
        debug!(%id, "updated task");

        self.persist();
        Ok(())
    }

    pub fn set_completed(&mut self, id: &TaskId, completed: bool) -> Result<()> {
        self.find_mut(id)?.completed = completed;
        self.persist();
        Ok(())
    }

    /// Flips completion and returns the new state.
    pub fn toggle_completed(&mut self, id: &TaskId) -> Result<bool> {
        let completed = !self.get(id).ok_or_else(|| Error::NotFound(id.clone()))?.completed;
        self.set_completed(id, completed)?;
        Ok(completed)
    }

    /// Returns whether a task was removed; an unknown id is not an error.
    pub fn delete(&mut self, id: &TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| &task.id != id);
        let removed = self.tasks.len() != before;
        if removed {
            debug!(%id, "deleted task");
            self.persist();
        }
        removed
    }

    pub fn delete_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Task) -> bool,
    {
        let before = self.tasks.len();
        self.tasks.retain(|task| !predicate(task));
        let removed = before - self.tasks.len();
        if removed > 0 {
            debug!(removed, "bulk deleted tasks");
            self.persist();
        }
        removed
    }

    /// Puts the collection in exactly the order given. The ids must be a
    /// permutation of the current ids; otherwise nothing changes.
    pub fn reorder(&mut self, order: &[TaskId]) -> Result<()> {
        let mismatch = Error::ReorderMismatch {
            expected: self.tasks.len(),
            got: order.len(),
        };
        if order.len() != self.tasks.len() {
            return Err(mismatch);
        }

        let mut seen = HashSet::with_capacity(order.len());
        if !order.iter().all(|id| seen.insert(id)) {
            return Err(mismatch);
        }

        let mut remaining: Vec<Option<Task>> = self.tasks.iter().cloned().map(Some).collect();
        let mut reordered = Vec::with_capacity(order.len());
        for id in order {
            let slot = self
                .tasks
                .iter()
                .position(|task| &task.id == id)
                .and_then(|index| remaining[index].take());
            match slot {
                Some(task) => reordered.push(task),
                None => return Err(mismatch),
            }
        }

        self.tasks = reordered;
        debug!(count = self.tasks.len(), "reordered tasks");
        self.persist();
        Ok(())
    }

    /// Moves one task to `index` in the collection, clamped to the end.
    pub fn move_to(&mut self, id: &TaskId, index: usize) -> Result<()> {
        let from = self.position(id).ok_or_else(|| Error::NotFound(id.clone()))?;
        let mut order: Vec<TaskId> = self.tasks.iter().map(|task| task.id.clone()).collect();
        let moved = order.remove(from);
        let index = index.min(order.len());
        order.insert(index, moved);
        self.reorder(&order)
    }

    fn find_mut(&mut self, id: &TaskId) -> Result<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|task| &task.id == id)
            .ok_or_else(|| Error::NotFound(id.clone()))
    }

    fn persist(&self) {
        if let Err(err) = self.persistence.save_tasks(&self.tasks) {
            warn!(error = %err, "failed to save tasks");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Priority};
    use crate::storage::{MemoryStore, TASKS_KEY};
    use chrono::NaiveDate;

    fn new_store() -> TaskStore<MemoryStore> {
        TaskStore::open(Persistence::new(MemoryStore::new()))
    }

    fn new_task(text: &str) -> NewTask {
        NewTask {
            text: text.to_string(),
            category: Category::Personal,
            priority: Priority::Medium,
            due_date: None,
        }
    }

    fn ids(store: &TaskStore<MemoryStore>) -> Vec<TaskId> {
        store.tasks().iter().map(|task| task.id.clone()).collect()
    }

    fn texts(store: &TaskStore<MemoryStore>) -> Vec<String> {
        store.tasks().iter().map(|task| task.text.clone()).collect()
    }

    #[test]
    fn test_create_rejects_whitespace_text() {
        let mut store = new_store();
        let result = store.create(new_task("   \t  "));
        assert!(matches!(result, Err(Error::EmptyText)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_create_trims_and_inserts_at_front() {
        let mut store = new_store();
        store.create(new_task("first")).unwrap();
        let created = store.create(new_task("  second  ")).unwrap();
        assert_eq!(created.text, "second");
        assert!(!created.completed);
        assert_eq!(texts(&store), vec!["second", "first"]);
    }

    #[test]
    fn test_ids_stay_unique_under_rapid_creation() {
        let mut store = new_store();
        for i in 0..50 {
            store.create(new_task(&format!("task {}", i))).unwrap();
        }
        let unique: HashSet<TaskId> = ids(&store).into_iter().collect();
        assert_eq!(unique.len(), 50);
    }

    #[test]
    fn test_ids_continue_past_loaded_ids() {
        let memory = MemoryStore::new();
        let mut store = TaskStore::open(Persistence::new(memory.clone()));
        store.create(new_task("loaded")).unwrap();
        let far_future = TaskId::new("99999999999999");
        let mut tasks = store.tasks().to_vec();
        tasks[0].id = far_future.clone();
        Persistence::new(memory.clone()).save_tasks(&tasks).unwrap();

        let mut reopened = TaskStore::open(Persistence::new(memory));
        let created = reopened.create(new_task("fresh")).unwrap();
        assert_ne!(created.id, far_future);
        assert_eq!(created.id.as_str(), "100000000000000");
    }

    #[test]
    fn test_ids_survive_a_maxed_out_stored_id() {
        let memory = MemoryStore::new();
        let blob = r#"[{"id":"9223372036854775807","text":"from an old blob","category":"work","priority":"low","dueDate":null,"completed":false,"createdAt":"2026-10-01T08:00:00Z"}]"#;
        memory.set(TASKS_KEY, blob).unwrap();

        let mut store = TaskStore::open(Persistence::new(memory));
        assert_eq!(store.len(), 1);
        let first = store.create(new_task("one")).unwrap().id.clone();
        let second = store.create(new_task("two")).unwrap().id.clone();

        let unique: HashSet<TaskId> = ids(&store).into_iter().collect();
        assert_eq!(unique.len(), 3);
        assert_ne!(first.as_str(), "9223372036854775807");
        assert!(!first.as_str().starts_with('-'));
        assert!(!second.as_str().starts_with('-'));
    }

    #[test]
    fn test_mutations_write_through() {
        let memory = MemoryStore::new();
        let mut store = TaskStore::open(Persistence::new(memory.clone()));
        let id = store.create(new_task("persist me")).unwrap().id.clone();
        store.set_completed(&id, true).unwrap();

        let reloaded = Persistence::new(memory).load_tasks();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].id, id);
        assert!(reloaded[0].completed);
    }

    #[test]
    fn test_update_applies_partial_fields() {
        let mut store = new_store();
        let id = store.create(new_task("draft")).unwrap().id.clone();
        let due = NaiveDate::from_ymd_opt(2030, 1, 2);

        store
            .update(
                &id,
                TaskUpdate {
                    priority: Some(Priority::High),
                    due_date: Some(due),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();

        let task = store.get(&id).unwrap();
        assert_eq!(task.text, "draft");
        assert_eq!(task.category, Category::Personal);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date, due);

        store
            .update(
                &id,
                TaskUpdate {
                    due_date: Some(None),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(store.get(&id).unwrap().due_date, None);
    }

    #[test]
    fn test_update_rejects_empty_text_without_applying() {
        let mut store = new_store();
        let id = store.create(new_task("keep")).unwrap().id.clone();
        let result = store.update(
            &id,
            TaskUpdate {
                text: Some("  ".to_string()),
                category: Some(Category::Work),
                ..TaskUpdate::default()
            },
        );
        assert!(matches!(result, Err(Error::EmptyText)));
        let task = store.get(&id).unwrap();
        assert_eq!(task.text, "keep");
        assert_eq!(task.category, Category::Personal);
    }

    #[test]
    fn test_missing_id_is_not_found() {
        let mut store = new_store();
        let missing = TaskId::new("nope");
        assert!(matches!(
            store.update(&missing, TaskUpdate::default()),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.set_completed(&missing, true),
            Err(Error::NotFound(_))
        ));
        assert!(!store.delete(&missing));
    }

    #[test]
    fn test_toggle_completed_flips_state() {
        let mut store = new_store();
        let id = store.create(new_task("toggle")).unwrap().id.clone();
        assert!(store.toggle_completed(&id).unwrap());
        assert!(!store.toggle_completed(&id).unwrap());
    }

    #[test]
    fn test_delete_where_completed_keeps_others_in_order() {
        let mut store = new_store();
        for text in ["e", "d", "c", "b", "a"] {
            store.create(new_task(text)).unwrap();
        }
        let order = ids(&store);
        store.set_completed(&order[1], true).unwrap();
        store.set_completed(&order[3], true).unwrap();

        let removed = store.delete_where(|task| task.completed);
        assert_eq!(removed, 2);
        assert_eq!(texts(&store), vec!["a", "c", "e"]);
        assert_eq!(store.delete_where(|task| task.completed), 0);
    }

    #[test]
    fn test_reorder_changes_only_order() {
        let mut store = new_store();
        for text in ["c", "b", "a"] {
            store.create(new_task(text)).unwrap();
        }
        let before = store.tasks().to_vec();
        let mut order = ids(&store);
        order.reverse();

        store.reorder(&order).unwrap();
        assert_eq!(ids(&store), order);
        for task in store.tasks() {
            let original = before.iter().find(|t| t.id == task.id).unwrap();
            assert_eq!(task, original);
        }
    }

    #[test]
    fn test_reorder_rejects_non_permutations() {
        let mut store = new_store();
        for text in ["c", "b", "a"] {
            store.create(new_task(text)).unwrap();
        }
        let order = ids(&store);

        let missing = vec![order[0].clone(), order[1].clone()];
        let unknown = vec![order[0].clone(), order[1].clone(), TaskId::new("ghost")];
        let duplicate = vec![order[0].clone(), order[0].clone(), order[1].clone()];
        for bad in [missing, unknown, duplicate] {
            assert!(matches!(
                store.reorder(&bad),
                Err(Error::ReorderMismatch { .. })
            ));
            assert_eq!(ids(&store), order);
        }
    }

    #[test]
    fn test_move_to_clamps_index() {
        let mut store = new_store();
        for text in ["c", "b", "a"] {
            store.create(new_task(text)).unwrap();
        }
        let a = ids(&store)[0].clone();
        store.move_to(&a, 10).unwrap();
        assert_eq!(texts(&store), vec!["b", "c", "a"]);
        store.move_to(&a, 0).unwrap();
        assert_eq!(texts(&store), vec!["a", "b", "c"]);
    }
}
