use crate::error::{Error, Result};
use crate::models::{Category, Priority};
use chrono::{Duration, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, PartialEq)]
pub struct ParsedTask {
    pub text: String,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub due: Option<NaiveDate>,
}

fn priority_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^!(high|medium|low|h|m|l)$").unwrap())
}

fn category_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#(\w+)$").unwrap())
}

fn due_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^@(\S+)$").unwrap())
}

fn relative_days_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+(\d{1,4})d$").unwrap())
}

/// Pulls `!priority`, `#category` and `@due` tokens out of typed task text.
/// The first token of each kind wins; tokens that do not name a known value
/// stay in the text.
pub fn parse_task_input(input: &str, today: NaiveDate) -> Result<ParsedTask> {
    let mut priority = None;
    let mut category = None;
    let mut due = None;
    let mut words = Vec::new();

    for word in input.split_whitespace() {
        if let Some(caps) = priority_re().captures(word) {
            if priority.is_none() {
                priority = caps[1].parse::<Priority>().ok();
            }
            continue;
        }

        if let Some(caps) = category_re().captures(word) {
            if let Ok(parsed) = caps[1].parse::<Category>() {
                if category.is_none() {
                    category = Some(parsed);
                }
                continue;
            }
        }

        if let Some(caps) = due_re().captures(word) {
            match parse_due_date(&caps[1], today) {
                Ok(parsed) => {
                    if due.is_none() {
                        due = parsed;
                    }
                    continue;
                }
                Err(err @ Error::PastDueDate(_)) => return Err(err),
                Err(_) => {}
            }
        }

        words.push(word);
    }

    Ok(ParsedTask {
        text: words.join(" "),
        category,
        priority,
        due,
    })
}

/// Accepts `YYYY-MM-DD`, `today`, `tomorrow` and `+Nd`. Empty input means no
/// due date; dates before `today` are rejected.
pub fn parse_due_date(input: &str, today: NaiveDate) -> Result<Option<NaiveDate>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }

    let date = match input.to_ascii_lowercase().as_str() {
        "today" => today,
        "tomorrow" => today + Duration::days(1),
        other => {
            if let Some(caps) = relative_days_re().captures(other) {
                let days: i64 = caps[1]
                    .parse()
                    .map_err(|_| Error::InvalidDate(input.to_string()))?;
                today + Duration::days(days)
            } else {
                NaiveDate::parse_from_str(other, "%Y-%m-%d")
                    .map_err(|_| Error::InvalidDate(input.to_string()))?
            }
        }
    };

    if date < today {
        return Err(Error::PastDueDate(date));
    }
    Ok(Some(date))
}
