use super::validation::{NumericCheck, Rule};
use regex::Regex;
use std::fmt;

/// The value assigned to a command option.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Flag(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            OptionValue::Flag(_) => ValueKind::Flag,
            OptionValue::Int(_) => ValueKind::Int,
            OptionValue::Float(_) => ValueKind::Float,
            OptionValue::Text(_) => ValueKind::Text,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Int(i) => Some(*i as f64),
            OptionValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Flag(b) => write!(f, "{}", b),
            OptionValue::Int(i) => write!(f, "{}", i),
            OptionValue::Float(x) => write!(f, "{}", x),
            OptionValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Flag(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Int(value.into())
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        OptionValue::Int(value.into())
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

/// Declared type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Flag,
    Int,
    Float,
    Text,
}

impl ValueKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ValueKind::Flag => "flag",
            ValueKind::Int => "integer",
            ValueKind::Float => "float",
            ValueKind::Text => "string",
        }
    }

    /// Integers are accepted where floats are declared.
    pub fn accepts(self, value: &OptionValue) -> bool {
        matches!(
            (self, value),
            (ValueKind::Flag, OptionValue::Flag(_))
                | (ValueKind::Int, OptionValue::Int(_))
                | (ValueKind::Float, OptionValue::Float(_) | OptionValue::Int(_))
                | (ValueKind::Text, OptionValue::Text(_))
        )
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of one command-line option: its field name, the flag string written
/// on the command line, its type, default value and validator chain.
#[derive(Debug, Clone)]
pub struct CmdOption {
    name: String,
    alias: String,
    kind: ValueKind,
    default: Option<OptionValue>,
    allow_none: bool,
    rules: Vec<Rule>,
}

impl CmdOption {
    pub fn new(name: impl Into<String>, alias: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
            kind,
            default: None,
            allow_none: false,
            rules: Vec::new(),
        }
    }

    /// Number of processors, a positive integer defaulting to 12.
    pub fn cpu(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::new(name, alias, ValueKind::Int)
            .default_value(12)
            .rule(Rule::Numericality(NumericCheck::GreaterThan(0.0)))
    }

    /// Optional `host` or `host:count` target.
    pub fn host(alias: impl Into<String>) -> Self {
        Self::new("host", alias, ValueKind::Text)
            .allow_none()
            .rule(Rule::Format(host_pattern()))
    }

    /// Optional job name; no whitespace or path separators.
    pub fn jobname(alias: impl Into<String>) -> Self {
        Self::new("jobname", alias, ValueKind::Text)
            .allow_none()
            .rule(Rule::Format(jobname_pattern()))
    }

    /// Boolean switch rendered as a bare flag when set.
    pub fn flag(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::new(name, alias, ValueKind::Flag).default_value(false)
    }

    pub fn default_value(mut self, value: impl Into<OptionValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn allow_none(mut self) -> Self {
        self.allow_none = true;
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn default(&self) -> Option<&OptionValue> {
        self.default.as_ref()
    }

    pub fn allows_none(&self) -> bool {
        self.allow_none
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

fn host_pattern() -> Regex {
    Regex::new(r"^[A-Za-z0-9_.\-]+(:[0-9]+)?$").expect("host pattern is a valid regex")
}

fn jobname_pattern() -> Regex {
    Regex::new(r"^[^\s/\\]+$").expect("jobname pattern is a valid regex")
}
