use crate::app::{today, App, FormField, InputMode, StatusKind, TaskForm};
use crate::models::{Priority, Task, Theme};
use crate::storage::KeyValueStore;
use chrono::NaiveDate;
use crossterm::event::{self, Event as CEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

const EVENT_POLL_MS: u64 = 100;

#[derive(Clone, Copy, Debug)]
pub struct Palette {
    pub fg: Color,
    pub bg: Color,
    pub accent: Color,
    pub muted: Color,
    pub overdue: Color,
    pub key: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Palette {
        match theme {
            Theme::Light => Palette {
                fg: Color::Black,
                bg: Color::White,
                accent: Color::Blue,
                muted: Color::DarkGray,
                overdue: Color::Red,
                key: Color::Magenta,
            },
            Theme::Dark => Palette {
                fg: Color::White,
                bg: Color::Black,
                accent: Color::Green,
                muted: Color::Gray,
                overdue: Color::LightRed,
                key: Color::Red,
            },
        }
    }

    fn priority(&self, priority: Priority) -> Color {
        match priority {
            Priority::High => Color::Red,
            Priority::Medium => Color::Yellow,
            Priority::Low => Color::Green,
        }
    }
}

/// What one list row shows for a task.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskRow {
    pub text: String,
    pub category: String,
    pub priority: Priority,
    pub priority_label: String,
    pub due: Option<String>,
    pub overdue: bool,
    pub completed: bool,
}

impl TaskRow {
    pub fn new(task: &Task, today: NaiveDate) -> TaskRow {
        TaskRow {
            text: task.text.clone(),
            category: format!("{} {}", task.category.icon(), task.category),
            priority: task.priority,
            priority_label: format!("{} {}", task.priority.icon(), task.priority),
            due: task
                .due_date
                .map(|date| format!("📅 {}", date.format("%b %-d"))),
            overdue: task.is_overdue(today),
            completed: task.completed,
        }
    }

    fn checkbox(&self) -> &'static str {
        if self.completed {
            "[x] "
        } else {
            "[ ] "
        }
    }

    fn into_list_item(self, palette: &Palette) -> ListItem<'static> {
        let text_style = if self.completed {
            Style::default()
                .fg(palette.muted)
                .add_modifier(Modifier::CROSSED_OUT)
        } else {
            Style::default().fg(palette.fg)
        };

        let mut spans = vec![
            Span::styled(self.checkbox(), Style::default().fg(palette.accent)),
            Span::styled(self.text, text_style),
            Span::raw("  "),
            Span::styled(self.category, Style::default().fg(palette.muted)),
            Span::raw("  "),
            Span::styled(
                self.priority_label,
                Style::default().fg(palette.priority(self.priority)),
            ),
        ];
        if let Some(due) = self.due {
            let due_style = if self.overdue {
                Style::default()
                    .fg(palette.overdue)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette.muted)
            };
            spans.push(Span::raw("  "));
            spans.push(Span::styled(due, due_style));
        }
        ListItem::new(Line::from(spans))
    }
}

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn legend_line(entries: &[(&'static str, &'static str)], palette: &Palette) -> Text<'static> {
    let spans: Vec<Span<'static>> = entries
        .iter()
        .flat_map(|(key, label)| {
            [
                Span::styled(format!(" {} ", key), Style::default().fg(palette.key)),
                Span::raw(format!(": {} ", label)),
            ]
        })
        .collect();
    Text::from(Line::from(spans))
}

fn get_legend(input_mode: &InputMode, palette: &Palette) -> Text<'static> {
    match input_mode {
        InputMode::Normal => legend_line(
            &[
                ("q", "Quit"),
                ("j/k", "Move"),
                ("a", "Add"),
                ("e", "Edit"),
                ("space", "Done"),
                ("d", "Delete"),
                ("/", "Search"),
                ("c", "Category"),
                ("p", "Priority"),
                ("s", "Sort"),
                ("r", "Reset"),
                ("m", "Reorder"),
                ("C", "Clear Done"),
                ("t", "Theme"),
            ],
            palette,
        ),
        InputMode::Search => legend_line(&[("Enter", "Keep"), ("Esc", "Clear")], palette),
        InputMode::Form(_) => legend_line(
            &[
                ("Tab", "Next Field"),
                ("←/→", "Change"),
                ("Enter", "Save"),
                ("Esc", "Cancel"),
            ],
            palette,
        ),
        InputMode::ConfirmClear { .. } => {
            legend_line(&[("y", "Confirm"), ("any", "Cancel")], palette)
        }
        InputMode::Grab(_) => legend_line(
            &[("j/k", "Move Task"), ("Enter", "Drop"), ("Esc", "Cancel")],
            palette,
        ),
    }
}

fn header<S: KeyValueStore>(app: &App<S>, palette: &Palette) -> Text<'static> {
    let stats = app.stats();
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let search = if app.query.search.is_empty() {
        "-".to_string()
    } else {
        format!("\"{}\"", app.query.search)
    };

    Text::from(vec![
        Line::from(vec![
            Span::styled("Total: ", bold),
            Span::raw(stats.total.to_string()),
            Span::styled("  Pending: ", bold),
            Span::raw(stats.pending.to_string()),
            Span::styled("  Completed: ", bold),
            Span::raw(stats.completed.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Search: ", Style::default().fg(palette.muted)),
            Span::raw(search),
            Span::styled("  Category: ", Style::default().fg(palette.muted)),
            Span::raw(app.query.category.to_string()),
            Span::styled("  Priority: ", Style::default().fg(palette.muted)),
            Span::raw(app.query.priority.to_string()),
            Span::styled("  Sort: ", Style::default().fg(palette.muted)),
            Span::raw(app.query.sort.label()),
        ]),
    ])
}

fn form_lines(form: &TaskForm, palette: &Palette) -> Vec<Line<'static>> {
    let field = |id: FormField, label: &'static str, value: String| {
        let active = form.active == id;
        let marker = if active { "> " } else { "  " };
        let style = if active {
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.fg)
        };
        Line::from(vec![
            Span::styled(format!("{}{:<10}", marker, label), style),
            Span::styled(value, Style::default().fg(palette.fg)),
        ])
    };

    let due = if form.due_input.is_empty() && form.active != FormField::DueDate {
        "none (YYYY-MM-DD, today, tomorrow, +Nd)".to_string()
    } else {
        form.due_input.clone()
    };

    vec![
        field(FormField::Text, "Task", form.text.clone()),
        field(
            FormField::Category,
            "Category",
            format!("< {} {} >", form.category.icon(), form.category),
        ),
        field(
            FormField::Priority,
            "Priority",
            format!("< {} {} >", form.priority.icon(), form.priority),
        ),
        field(FormField::DueDate, "Due", due),
    ]
}

/// Draws one frame for the current app state.
pub fn draw<S: KeyValueStore>(f: &mut Frame, app: &mut App<S>) {
    let palette = Palette::for_theme(app.theme);
    let size = f.area();

    f.render_widget(
        Block::default().style(Style::default().bg(palette.bg).fg(palette.fg)),
        size,
    );

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints(
            [
                Constraint::Length(4),
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(2),
            ]
            .as_ref(),
        )
        .split(size);

    let header_chunk = chunks[0];
    let body_chunk = chunks[1];
    let status_chunk = chunks[2];
    let footer_chunk = chunks[3];

    let header_widget = Paragraph::new(header(app, &palette)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("taskdeck")
            .border_style(Style::default().fg(palette.accent)),
    );
    f.render_widget(header_widget, header_chunk);

    let grabbing = matches!(app.input_mode, InputMode::Grab(_));
    let list_title = if grabbing { "Tasks (moving)" } else { "Tasks" };

    let today = today();
    let rows: Vec<TaskRow> = app
        .visible_tasks()
        .into_iter()
        .map(|task| TaskRow::new(task, today))
        .collect();

    if rows.is_empty() {
        let message = if app.store.is_empty() {
            "No tasks yet. Press 'a' to add one."
        } else {
            "No tasks match the current search and filters."
        };
        let empty = Paragraph::new(message)
            .style(Style::default().fg(palette.muted))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(list_title))
            .wrap(Wrap { trim: true });
        f.render_widget(empty, body_chunk);
    } else {
        let items: Vec<ListItem> = rows
            .into_iter()
            .map(|row| row.into_list_item(&palette))
            .collect();
        let highlight = if grabbing {
            Style::default()
                .fg(palette.bg)
                .bg(palette.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD)
        };
        let tasks_widget = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(list_title))
            .highlight_style(highlight)
            .highlight_symbol(if grabbing { "≡ " } else { ">> " });
        f.render_stateful_widget(tasks_widget, body_chunk, &mut app.state);
    }

    match &app.input_mode {
        InputMode::Search => {
            let search = Paragraph::new(format!("/{}", app.query.search))
                .style(Style::default().fg(palette.accent));
            f.render_widget(search, status_chunk);
        }
        _ => {
            if let Some(status) = &app.status {
                let color = match status.kind {
                    StatusKind::Info => palette.accent,
                    StatusKind::Error => palette.overdue,
                };
                f.render_widget(
                    Paragraph::new(status.text.clone()).style(Style::default().fg(color)),
                    status_chunk,
                );
            }
        }
    }

    match &app.input_mode {
        InputMode::Form(form) => {
            // u32 so wide terminals cannot overflow; 70% of width always fits u16
            let popup_width = (u32::from(size.width) * 70 / 100) as u16;
            let popup_width = popup_width.max(30).min(size.width);
            let inner_width = popup_width.saturating_sub(14);
            let text_lines = calculate_wrapped_lines(&form.text, inner_width).max(1);
            let popup_height = std::cmp::min((text_lines as u16).saturating_add(5), size.height);
            let popup_area = centered_rect_absolute(popup_width, popup_height, body_chunk);

            let popup_block = Block::default()
                .title(format!("{} (Enter to Save)", form.title()))
                .borders(Borders::ALL)
                .style(Style::default().bg(palette.bg).fg(palette.accent));

            let input = Paragraph::new(form_lines(form, &palette))
                .block(popup_block)
                .wrap(Wrap { trim: false });

            f.render_widget(Clear, popup_area);
            f.render_widget(input, popup_area);
        }
        InputMode::ConfirmClear { count } => {
            let popup_area = centered_rect_absolute(50, 3, body_chunk);
            let confirm = Paragraph::new(format!(
                "Remove {} completed task(s)? (y/n)",
                count
            ))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Clear Completed")
                    .style(Style::default().bg(palette.bg).fg(palette.overdue)),
            );
            f.render_widget(Clear, popup_area);
            f.render_widget(confirm, popup_area);
        }
        _ => {}
    }

    // Render the legend in the footer
    let legend = Paragraph::new(get_legend(&app.input_mode, &palette))
        .style(Style::default().fg(palette.fg))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });

    f.render_widget(legend, footer_chunk);
}

pub fn run_app<B: Backend, S: KeyValueStore>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;

        // Handle input
        if event::poll(Duration::from_millis(EVENT_POLL_MS))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if app.handle_key(key) {
                    return Ok(());
                }
            }
        }
    }
}

fn calculate_wrapped_lines(text: &str, max_width: u16) -> usize {
    if max_width == 0 {
        return 0;
    }
    let mut line_count = 0;
    for line in text.lines() {
        let line_width = line.chars().count() as u16;
        line_count += line_width.div_ceil(max_width) as usize;
    }
    line_count
}
