//! Validation gate for create/update payloads.
//!
//! Runs before the controller touches the store. On the first violated
//! rule the request halts with that rule's message (a 400). The gate also
//! sanitizes: titles and descriptions are trimmed, empty string and
//! explicit null both mean "clear this field" on update, and unknown JSON
//! fields were already stripped during deserialization.

use chrono::{DateTime, NaiveDate};
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CreateTodoInput, NewTask, Priority, TaskPatch, UpdateTodoInput};

pub const TITLE_MAX: usize = 255;
pub const DESCRIPTION_MAX: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> AppError {
        AppError::BadRequest(err.0)
    }
}

fn rule(message: &str) -> ValidationError {
    ValidationError(message.to_string())
}

/// Create: title and priority are required, the rest optional.
pub fn create(input: CreateTodoInput) -> Result<NewTask, ValidationError> {
    let title = match input.title {
        Some(t) => check_title(t.trim())?,
        None => return Err(rule("title is required")),
    };

    let description = match input.description {
        Some(d) => check_description(d.trim())?,
        None => None,
    };

    let priority = match input.priority.as_deref() {
        Some(p) => check_priority(p)?,
        None => return Err(rule("priority is required")),
    };

    let due_date = match input.due_date.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Some(check_date(s)?),
        _ => None,
    };

    let category_id = match input.category_id.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Some(check_category_id(s)?),
        _ => None,
    };

    Ok(NewTask { title, description, priority, due_date, category_id })
}

/// Update: every field optional. Fields absent from the payload stay out
/// of the patch entirely; an empty patch is the controller's problem
/// (it answers 400), not a validation failure.
pub fn update(input: UpdateTodoInput) -> Result<TaskPatch, ValidationError> {
    let mut patch = TaskPatch::default();

    if let Some(title) = input.title {
        patch.title = Some(check_title(title.trim())?);
    }

    if let Some(description) = input.description {
        patch.description = Some(match description.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => check_description(d)?,
            _ => None, // null or empty string: clear the column
        });
    }

    if let Some(completed) = input.completed {
        patch.completed = Some(completed);
    }

    if let Some(priority) = input.priority {
        patch.priority = Some(check_priority(&priority)?);
    }

    if let Some(due_date) = input.due_date {
        patch.due_date = Some(match due_date.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => Some(check_date(s)?),
            _ => None,
        });
    }

    if let Some(category_id) = input.category_id {
        patch.category_id = Some(match category_id.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => Some(check_category_id(s)?),
            _ => None,
        });
    }

    Ok(patch)
}

fn check_title(trimmed: &str) -> Result<String, ValidationError> {
    let len = trimmed.chars().count();
    if len == 0 || len > TITLE_MAX {
        return Err(rule("title must be between 1 and 255 characters"));
    }
    Ok(trimmed.to_string())
}

fn check_description(trimmed: &str) -> Result<Option<String>, ValidationError> {
    if trimmed.chars().count() > DESCRIPTION_MAX {
        return Err(rule("description must be at most 1000 characters"));
    }
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(trimmed.to_string()))
}

fn check_priority(s: &str) -> Result<Priority, ValidationError> {
    Priority::parse(s).ok_or_else(|| rule("priority must be one of low, medium, high"))
}

/// Accepts a plain ISO date; a full RFC 3339 timestamp is truncated to
/// its date part.
fn check_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.date_naive()))
        .map_err(|_| rule("dueDate must be an ISO date (YYYY-MM-DD)"))
}

fn check_category_id(s: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(s).map_err(|_| rule("categoryId must be a valid UUID"))
}
