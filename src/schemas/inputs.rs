//! Free-text fields typed by users during workflows.

use thiserror::Error;
use validator::{Validate, ValidationErrors};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub(crate) struct InvalidInput(String);

#[derive(Debug, Validate)]
pub(crate) struct FullNameInput {
    #[validate(length(min = 2, max = 128, message = "ФИО должно содержать от 2 до 128 символов"))]
    pub(crate) full_name: String,
}

#[derive(Debug, Validate)]
pub(crate) struct GroupNameInput {
    #[validate(length(
        min = 1,
        max = 64,
        message = "Название группы должно содержать от 1 до 64 символов"
    ))]
    pub(crate) name: String,
}

#[derive(Debug, Validate)]
pub(crate) struct SubjectNameInput {
    #[validate(length(
        min = 1,
        max = 128,
        message = "Название предмета должно содержать от 1 до 128 символов"
    ))]
    pub(crate) name: String,
}

pub(crate) fn full_name(raw: &str) -> Result<String, InvalidInput> {
    let input = FullNameInput { full_name: normalize(raw) };
    input.validate().map_err(first_message)?;
    Ok(input.full_name)
}

pub(crate) fn group_name(raw: &str) -> Result<String, InvalidInput> {
    let input = GroupNameInput { name: normalize(raw) };
    input.validate().map_err(first_message)?;
    Ok(input.name)
}

pub(crate) fn subject_name(raw: &str) -> Result<String, InvalidInput> {
    let input = SubjectNameInput { name: normalize(raw) };
    input.validate().map_err(first_message)?;
    Ok(input.name)
}

/// Trims and collapses inner whitespace runs, newlines included.
fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_message(errors: ValidationErrors) -> InvalidInput {
    let message = errors
        .field_errors()
        .values()
        .flat_map(|errors| errors.iter())
        .find_map(|error| error.message.as_ref().map(|message| message.to_string()))
        .unwrap_or_else(|| "Некорректное значение".to_string());
    InvalidInput(message)
}
