use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Category, NewTask, Priority, Task, TaskId, TaskUpdate, Theme};
use crate::parser::{parse_due_date, parse_task_input};
use crate::query::{derive_view, Query, SortKey, Stats};
use crate::storage::{KeyValueStore, Persistence};
use crate::store::TaskStore;
use chrono::{Local, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::ListState;
use tracing::{info, warn};

pub const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";

pub enum InputMode {
    Normal,
    Search,
    Form(TaskForm),
    ConfirmClear { count: usize },
    Grab(DragState),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormField {
    Text,
    Category,
    Priority,
    DueDate,
}

impl FormField {
    fn next(self) -> FormField {
        match self {
            FormField::Text => FormField::Category,
            FormField::Category => FormField::Priority,
            FormField::Priority => FormField::DueDate,
            FormField::DueDate => FormField::Text,
        }
    }

    fn previous(self) -> FormField {
        match self {
            FormField::Text => FormField::DueDate,
            FormField::Category => FormField::Text,
            FormField::Priority => FormField::Category,
            FormField::DueDate => FormField::Priority,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FormKind {
    Create,
    Edit(TaskId),
}

// Creation and edit dialog share the same fields
#[derive(Clone, Debug)]
pub struct TaskForm {
    pub kind: FormKind,
    pub active: FormField,
    pub text: String,
    pub category: Category,
    pub priority: Priority,
    pub due_input: String,
    original_due: Option<NaiveDate>,
}

impl TaskForm {
    pub fn create(config: &Config) -> Self {
        TaskForm {
            kind: FormKind::Create,
            active: FormField::Text,
            text: String::new(),
            category: config.default_category,
            priority: config.default_priority,
            due_input: String::new(),
            original_due: None,
        }
    }

    pub fn edit(task: &Task) -> Self {
        TaskForm {
            kind: FormKind::Edit(task.id.clone()),
            active: FormField::Text,
            text: task.text.clone(),
            category: task.category,
            priority: task.priority,
            due_input: task
                .due_date
                .map(|date| date.format(DATE_INPUT_FORMAT).to_string())
                .unwrap_or_default(),
            original_due: task.due_date,
        }
    }

    pub fn title(&self) -> &'static str {
        match self.kind {
            FormKind::Create => "New Task",
            FormKind::Edit(_) => "Edit Task",
        }
    }

    // An edit may keep a due date that has since passed
    fn due_date(&self, today: NaiveDate) -> Result<Option<NaiveDate>> {
        if let Some(original) = self.original_due {
            if self.due_input.trim() == original.format(DATE_INPUT_FORMAT).to_string() {
                return Ok(Some(original));
            }
        }
        parse_due_date(&self.due_input, today)
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Tab | KeyCode::Down => self.active = self.active.next(),
            KeyCode::BackTab | KeyCode::Up => self.active = self.active.previous(),
            _ => match self.active {
                FormField::Text => edit_string(&mut self.text, code),
                FormField::DueDate => edit_string(&mut self.due_input, code),
                FormField::Category => match code {
                    KeyCode::Right | KeyCode::Char(' ') => self.category = self.category.next(),
                    KeyCode::Left => self.category = self.category.previous(),
                    _ => {}
                },
                FormField::Priority => match code {
                    KeyCode::Right | KeyCode::Char(' ') => self.priority = self.priority.next(),
                    KeyCode::Left => self.priority = self.priority.previous(),
                    _ => {}
                },
            },
        }
    }
}

fn edit_string(value: &mut String, code: KeyCode) {
    match code {
        KeyCode::Char(c) => value.push(c),
        KeyCode::Backspace => {
            value.pop();
        }
        _ => {}
    }
}

/// A reorder gesture in progress. Only `preview` moves until the drop.
#[derive(Clone, Debug)]
pub struct DragState {
    pub id: TaskId,
    pub origin: Vec<TaskId>,
    pub preview: Vec<TaskId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

pub struct App<S: KeyValueStore> {
    pub store: TaskStore<S>,
    pub query: Query,
    pub theme: Theme,
    pub state: ListState,
    pub input_mode: InputMode,
    pub status: Option<StatusMessage>,
    settings: Persistence<S>,
    config: Config,
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

impl<S: KeyValueStore> App<S> {
    pub fn new(store: TaskStore<S>, settings: Persistence<S>, config: Config) -> App<S> {
        let theme = settings.load_theme();
        let mut app = App {
            store,
            query: Query::with_sort(config.default_sort),
            theme,
            state: ListState::default(),
            input_mode: InputMode::Normal,
            status: None,
            settings,
            config,
        };
        app.clamp_selection();
        app
    }

    /// Ids in display order; during a grab this is the preview order.
    pub fn view_ids(&self) -> Vec<TaskId> {
        match &self.input_mode {
            InputMode::Grab(drag) => drag.preview.clone(),
            _ => derive_view(self.store.tasks(), &self.query)
                .into_iter()
                .map(|task| task.id.clone())
                .collect(),
        }
    }

    pub fn visible_tasks(&self) -> Vec<&Task> {
        match &self.input_mode {
            InputMode::Grab(drag) => drag
                .preview
                .iter()
                .filter_map(|id| self.store.get(id))
                .collect(),
            _ => derive_view(self.store.tasks(), &self.query),
        }
    }

    pub fn stats(&self) -> Stats {
        Stats::of(self.store.tasks())
    }

    pub fn selected_id(&self) -> Option<TaskId> {
        let selected = self.state.selected()?;
        self.view_ids().get(selected).cloned()
    }

    pub fn next(&mut self) {
        let len = self.view_ids().len();
        if len == 0 {
            self.state.select(None);
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.view_ids().len();
        if len == 0 {
            self.state.select(None);
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    fn clamp_selection(&mut self) {
        let len = self.view_ids().len();
        let selected = match self.state.selected() {
            _ if len == 0 => None,
            Some(i) => Some(i.min(len - 1)),
            None => Some(0),
        };
        self.state.select(selected);
    }

    fn select_task(&mut self, id: &TaskId) {
        match self.view_ids().iter().position(|view_id| view_id == id) {
            Some(index) => self.state.select(Some(index)),
            None => self.clamp_selection(),
        }
    }

    fn info(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind: StatusKind::Info,
            text: text.into(),
        });
    }

    fn error(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind: StatusKind::Error,
            text: text.into(),
        });
    }

    // Validation problems go to the status line, a vanished task is ignored
    fn report(&mut self, err: Error) {
        match err {
            Error::NotFound(id) => warn!(%id, "task disappeared before the action applied"),
            err if err.is_validation() => self.error(err.to_string()),
            err => {
                warn!(error = %err, "action failed");
                self.error(err.to_string());
            }
        }
    }

    pub fn open_create_form(&mut self) {
        self.input_mode = InputMode::Form(TaskForm::create(&self.config));
    }

    pub fn open_edit_form(&mut self) {
        if let Some(task) = self.selected_id().and_then(|id| self.store.get(&id)) {
            self.input_mode = InputMode::Form(TaskForm::edit(task));
        }
    }

    /// Applies the form; on a validation error the form stays open.
    /// Quick-add tokens only apply when creating; an edit keeps the text as
    /// typed, so `#work` or `!h` already in a task's text stay literal.
    pub fn submit_form(&mut self, form: TaskForm) -> Result<()> {
        let today = today();
        let id = match &form.kind {
            FormKind::Create => {
                let parsed = parse_task_input(&form.text, today)?;
                let due_date = match parsed.due {
                    Some(due) => Some(due),
                    None => form.due_date(today)?,
                };
                let task = self.store.create(NewTask {
                    text: parsed.text,
                    category: parsed.category.unwrap_or(form.category),
                    priority: parsed.priority.unwrap_or(form.priority),
                    due_date,
                })?;
                info!(id = %task.id, "added task");
                task.id.clone()
            }
            FormKind::Edit(id) => {
                let due_date = form.due_date(today)?;
                self.store.update(
                    id,
                    TaskUpdate {
                        text: Some(form.text.clone()),
                        category: Some(form.category),
                        priority: Some(form.priority),
                        due_date: Some(due_date),
                    },
                )?;
                id.clone()
            }
        };
        self.select_task(&id);
        Ok(())
    }

    pub fn toggle_selected(&mut self) {
        if let Some(id) = self.selected_id() {
            if let Err(err) = self.store.toggle_completed(&id) {
                self.report(err);
            }
        }
    }

    pub fn delete_selected(&mut self) {
        if let Some(id) = self.selected_id() {
            if self.store.delete(&id) {
                self.info("Task deleted");
            }
            self.clamp_selection();
        }
    }

    pub fn request_clear_completed(&mut self) {
        let count = self.stats().completed;
        if count == 0 {
            self.info("No completed tasks to clear");
            return;
        }
        self.input_mode = InputMode::ConfirmClear { count };
    }

    pub fn clear_completed(&mut self) -> usize {
        let removed = self.store.delete_where(|task| task.completed);
        if removed > 0 {
            self.info(format!("Removed {} completed task(s)", removed));
        }
        self.clamp_selection();
        removed
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        if let Err(err) = self.settings.save_theme(self.theme) {
            warn!(error = %err, "failed to save theme");
        }
    }

    pub fn cycle_category_filter(&mut self) {
        self.query.category = self.query.category.next();
        self.clamp_selection();
    }

    pub fn cycle_priority_filter(&mut self) {
        self.query.priority = self.query.priority.next();
        self.clamp_selection();
    }

    pub fn cycle_sort(&mut self) {
        self.query.sort = self.query.sort.next();
        self.clamp_selection();
    }

    pub fn reset_query(&mut self) {
        self.query = Query::with_sort(self.config.default_sort);
        self.clamp_selection();
    }

    pub fn begin_grab(&mut self) {
        if self.query.sort != SortKey::Manual {
            self.error("Switch sort to Manual to reorder tasks");
            return;
        }
        if let Some(id) = self.selected_id() {
            let origin = self.view_ids();
            self.input_mode = InputMode::Grab(DragState {
                id,
                preview: origin.clone(),
                origin,
            });
        }
    }

    /// Moves the grabbed task one slot up (`-1`) or down (`1`) in the preview.
    pub fn grab_move(&mut self, delta: isize) {
        let InputMode::Grab(drag) = &mut self.input_mode else {
            return;
        };
        let Some(from) = drag.preview.iter().position(|id| id == &drag.id) else {
            return;
        };
        let to = from as isize + delta;
        if to < 0 || to as usize >= drag.preview.len() {
            return;
        }
        drag.preview.swap(from, to as usize);
        self.state.select(Some(to as usize));
    }

    pub fn cancel_grab(&mut self) {
        if let InputMode::Grab(drag) = std::mem::replace(&mut self.input_mode, InputMode::Normal) {
            self.select_task(&drag.id);
        }
    }

    /// Commits the preview position against the store's full order.
    pub fn drop_grab(&mut self) {
        let InputMode::Grab(drag) = std::mem::replace(&mut self.input_mode, InputMode::Normal)
        else {
            return;
        };
        if drag.preview != drag.origin {
            if let Err(err) = self.commit_drag(&drag) {
                self.report(err);
            }
        }
        self.select_task(&drag.id);
    }

    fn commit_drag(&mut self, drag: &DragState) -> Result<()> {
        let position = drag
            .preview
            .iter()
            .position(|id| id == &drag.id)
            .ok_or_else(|| Error::NotFound(drag.id.clone()))?;

        // Collection order with the grabbed task lifted out
        let rest: Vec<&TaskId> = self
            .store
            .tasks()
            .iter()
            .map(|task| &task.id)
            .filter(|id| *id != &drag.id)
            .collect();
        let index_of = |id: &TaskId| {
            rest.iter()
                .position(|other| *other == id)
                .ok_or_else(|| Error::NotFound(id.clone()))
        };

        let target = match (drag.preview.get(position + 1), position.checked_sub(1)) {
            (Some(following), _) => index_of(following)?,
            (None, Some(before)) => index_of(&drag.preview[before])? + 1,
            (None, None) => return Ok(()),
        };
        self.store.move_to(&drag.id, target)
    }

    /// Returns true when the app should quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match &mut self.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => return true,
                KeyCode::Char('j') | KeyCode::Down => self.next(),
                KeyCode::Char('k') | KeyCode::Up => self.previous(),
                KeyCode::Char('a') => self.open_create_form(),
                KeyCode::Char('e') | KeyCode::Enter => self.open_edit_form(),
                KeyCode::Char(' ') | KeyCode::Char('x') => self.toggle_selected(),
                KeyCode::Char('d') | KeyCode::Delete => self.delete_selected(),
                KeyCode::Char('/') => self.input_mode = InputMode::Search,
                KeyCode::Char('c') => self.cycle_category_filter(),
                KeyCode::Char('p') => self.cycle_priority_filter(),
                KeyCode::Char('s') => self.cycle_sort(),
                KeyCode::Char('r') => self.reset_query(),
                KeyCode::Char('C') => self.request_clear_completed(),
                KeyCode::Char('t') => self.toggle_theme(),
                KeyCode::Char('m') => self.begin_grab(),
                _ => {}
            },

            InputMode::Search => {
                match key.code {
                    KeyCode::Enter => self.input_mode = InputMode::Normal,
                    KeyCode::Esc => {
                        self.query.search.clear();
                        self.input_mode = InputMode::Normal;
                    }
                    code => edit_string(&mut self.query.search, code),
                }
                self.clamp_selection();
            }

            InputMode::Form(form) => match key.code {
                KeyCode::Esc => self.input_mode = InputMode::Normal,
                KeyCode::Enter => {
                    let form = form.clone();
                    match self.submit_form(form) {
                        Ok(()) => {
                            self.status = None;
                            self.input_mode = InputMode::Normal;
                        }
                        Err(Error::NotFound(_)) => self.input_mode = InputMode::Normal,
                        Err(err) => self.report(err),
                    }
                }
                code => form.handle_key(code),
            },

            InputMode::ConfirmClear { .. } => {
                self.input_mode = InputMode::Normal;
                if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                    self.clear_completed();
                }
            }

            InputMode::Grab(_) => match key.code {
                KeyCode::Char('j') | KeyCode::Down => self.grab_move(1),
                KeyCode::Char('k') | KeyCode::Up => self.grab_move(-1),
                KeyCode::Enter | KeyCode::Char('m') => self.drop_grab(),
                KeyCode::Esc => self.cancel_grab(),
                _ => {}
            },
        }
        false
    }
}
