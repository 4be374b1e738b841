//! Validator chains for command options.
//!
//! Each [`CmdOption`](super::option::CmdOption) carries an ordered list of [`Rule`]s.
//! [`validate_option`] checks the declared type first and then evaluates the rules
//! in order, stopping at the first failure.

use super::error::CommandError;
use super::option::{CmdOption, OptionValue};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericCheck {
    GreaterThan(f64),
    GreaterThanOrEqualTo(f64),
    LessThan(f64),
    LessThanOrEqualTo(f64),
    EqualTo(f64),
    OtherThan(f64),
    Odd,
    Even,
}

impl NumericCheck {
    fn holds(self, n: f64) -> bool {
        match self {
            NumericCheck::GreaterThan(x) => n > x,
            NumericCheck::GreaterThanOrEqualTo(x) => n >= x,
            NumericCheck::LessThan(x) => n < x,
            NumericCheck::LessThanOrEqualTo(x) => n <= x,
            NumericCheck::EqualTo(x) => n == x,
            NumericCheck::OtherThan(x) => n != x,
            NumericCheck::Odd => n.fract() == 0.0 && n.rem_euclid(2.0) == 1.0,
            NumericCheck::Even => n.fract() == 0.0 && n.rem_euclid(2.0) == 0.0,
        }
    }

    fn failure(self) -> String {
        match self {
            NumericCheck::GreaterThan(x) => format!("is less than or equal to {}", x),
            NumericCheck::GreaterThanOrEqualTo(x) => format!("is less than {}", x),
            NumericCheck::LessThan(x) => format!("is greater than or equal to {}", x),
            NumericCheck::LessThanOrEqualTo(x) => format!("is greater than {}", x),
            NumericCheck::EqualTo(x) => format!("is not equal to {}", x),
            NumericCheck::OtherThan(x) => format!("is equal to {}", x),
            NumericCheck::Odd => "is not odd".to_string(),
            NumericCheck::Even => "is not even".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Rule {
    Presence,
    Numericality(NumericCheck),
    Inclusion(Vec<OptionValue>),
    Exclusion(Vec<OptionValue>),
    Format(Regex),
    Predicate {
        description: &'static str,
        check: fn(&OptionValue) -> bool,
    },
}

impl Rule {
    /// Absent values only fail [`Rule::Presence`]; every other rule skips them.
    pub fn check(&self, field: &str, value: Option<&OptionValue>) -> Result<(), CommandError> {
        let Some(value) = value else {
            return match self {
                Rule::Presence => Err(CommandError::Missing {
                    field: field.to_string(),
                }),
                _ => Ok(()),
            };
        };

        match self {
            Rule::Presence => Ok(()),
            Rule::Numericality(check) => {
                let n = value.as_f64().ok_or_else(|| CommandError::Numericality {
                    field: field.to_string(),
                    reason: "is not a number".to_string(),
                })?;
                if check.holds(n) {
                    Ok(())
                } else {
                    Err(CommandError::Numericality {
                        field: field.to_string(),
                        reason: check.failure(),
                    })
                }
            }
            Rule::Inclusion(choices) => {
                if choices.contains(value) {
                    Ok(())
                } else {
                    Err(CommandError::Inclusion {
                        field: field.to_string(),
                        choices: list_choices(choices),
                        value: value.to_string(),
                    })
                }
            }
            Rule::Exclusion(choices) => {
                if choices.contains(value) {
                    Err(CommandError::Exclusion {
                        field: field.to_string(),
                        choices: list_choices(choices),
                        value: value.to_string(),
                    })
                } else {
                    Ok(())
                }
            }
            Rule::Format(pattern) => match value.as_str() {
                Some(text) if pattern.is_match(text) => Ok(()),
                Some(_) => Err(CommandError::Format {
                    field: field.to_string(),
                    pattern: pattern.as_str().to_string(),
                }),
                None => Err(CommandError::Type {
                    field: field.to_string(),
                    expected: super::option::ValueKind::Text,
                    value: value.to_string(),
                }),
            },
            Rule::Predicate { description, check } => {
                if check(value) {
                    Ok(())
                } else {
                    Err(CommandError::Predicate {
                        field: field.to_string(),
                        description: *description,
                        value: value.to_string(),
                    })
                }
            }
        }
    }
}

fn list_choices(choices: &[OptionValue]) -> String {
    let items: Vec<String> = choices.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(", "))
}

/// Runs the type check and the validator chain of `option` against `value`.
pub fn validate_option(option: &CmdOption, value: Option<&OptionValue>) -> Result<(), CommandError> {
    match value {
        None if option.allows_none() => return Ok(()),
        None => {
            return Err(CommandError::Missing {
                field: option.name().to_string(),
            });
        }
        Some(v) if !option.kind().accepts(v) => {
            return Err(CommandError::Type {
                field: option.name().to_string(),
                expected: option.kind(),
                value: v.to_string(),
            });
        }
        Some(_) => {}
    }
    option
        .rules()
        .iter()
        .try_for_each(|rule| rule.check(option.name(), value))
}
