use super::option::ValueKind;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("'{field}' is missing")]
    Missing { field: String },

    #[error("invalid value for '{field}', expected {expected} type, got {value}")]
    Type {
        field: String,
        expected: ValueKind,
        value: String,
    },

    #[error("'{field}' {reason}")]
    Numericality { field: String, reason: String },

    #[error("value for '{field}' must be one of {choices}, got {value}")]
    Inclusion {
        field: String,
        choices: String,
        value: String,
    },

    #[error("value for '{field}' must not be one of {choices}, got {value}")]
    Exclusion {
        field: String,
        choices: String,
        value: String,
    },

    #[error("'{field}' does not match expected format {pattern}")]
    Format { field: String, pattern: String },

    #[error("invalid value for field '{field}' ({description}), got {value}")]
    Predicate {
        field: String,
        description: &'static str,
        value: String,
    },

    #[error("unknown option '{field}' for program '{program}'")]
    UnknownOption { field: String, program: String },

    #[error("cannot determine a jobname for program '{program}': no jobname given and no input files")]
    MissingJobname { program: String },
}

impl CommandError {
    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            CommandError::Missing { field }
            | CommandError::Type { field, .. }
            | CommandError::Numericality { field, .. }
            | CommandError::Inclusion { field, .. }
            | CommandError::Exclusion { field, .. }
            | CommandError::Format { field, .. }
            | CommandError::Predicate { field, .. }
            | CommandError::UnknownOption { field, .. } => field,
            CommandError::MissingJobname { .. } => "jobname",
        }
    }
}
