//! # Command Module
//!
//! Immutable command-line invocations built from declarative program schemas.
//!
//! A [`CommandSchema`] names a program and declares its options ([`CmdOption`]),
//! each with a command-line alias, a type, a default and a validator chain. A
//! [`CommandBuilder`] collects caller-supplied values and input files and produces a
//! validated [`Command`], whose rendering is deterministic: options are sorted by
//! alias, unset and `false` options are omitted, `true` flags are rendered bare, and
//! the input files come last.
//!
//! Jobnames follow the convention of the supported programs: when no jobname is
//! given it is derived from the first input file's basename without extension, and
//! a jobname equal to that derived default is never written on the command line.

pub mod error;
pub mod option;
pub mod schemas;
pub mod validation;

pub use error::CommandError;
pub use option::{CmdOption, OptionValue, ValueKind};
pub use validation::{NumericCheck, Rule};

use std::fmt;
use std::path::{Path, PathBuf};

const JOBNAME_FIELD: &str = "jobname";

#[derive(Debug, Clone)]
pub struct CommandSchema {
    program: String,
    options: Vec<CmdOption>,
}

impl CommandSchema {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            options: Vec::new(),
        }
    }

    pub fn option(mut self, option: CmdOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn options(&self) -> &[CmdOption] {
        &self.options
    }

    pub fn find(&self, name: &str) -> Option<&CmdOption> {
        self.options.iter().find(|o| o.name() == name)
    }

    pub fn builder(&self) -> CommandBuilder<'_> {
        CommandBuilder::new(self)
    }
}

pub struct CommandBuilder<'a> {
    schema: &'a CommandSchema,
    values: Vec<(String, OptionValue)>,
    input_files: Vec<PathBuf>,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(schema: &'a CommandSchema) -> Self {
        Self {
            schema,
            values: Vec::new(),
            input_files: Vec::new(),
        }
    }

    /// Sets an option value; a later call for the same option wins.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        let name = name.into();
        self.values.retain(|(n, _)| *n != name);
        self.values.push((name, value.into()));
        self
    }

    pub fn input_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_files.push(path.into());
        self
    }

    pub fn input_files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.input_files.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<Command, CommandError> {
        let program = self.schema.program().to_string();

        if let Some((name, _)) = self
            .values
            .iter()
            .find(|(name, _)| self.schema.find(name).is_none())
        {
            return Err(CommandError::UnknownOption {
                field: name.clone(),
                program,
            });
        }

        let default_jobname = self.input_files.first().and_then(|f| file_stem(f));

        let mut entries = Vec::with_capacity(self.schema.options().len());
        for option in self.schema.options() {
            let mut value = self
                .values
                .iter()
                .find(|(name, _)| name == option.name())
                .map(|(_, v)| v.clone())
                .or_else(|| option.default().cloned());
            if option.name() == JOBNAME_FIELD && value.is_none() {
                value = default_jobname.clone().map(OptionValue::Text);
            }
            validation::validate_option(option, value.as_ref())?;
            entries.push(CommandEntry {
                name: option.name().to_string(),
                alias: option.alias().to_string(),
                value,
            });
        }
        entries.sort_by(|a, b| a.alias.cmp(&b.alias));

        let jobname = entries
            .iter()
            .find(|e| e.name == JOBNAME_FIELD)
            .and_then(|e| e.value.as_ref())
            .and_then(OptionValue::as_str)
            .map(str::to_string)
            .or_else(|| default_jobname.clone())
            .ok_or_else(|| CommandError::MissingJobname {
                program: program.clone(),
            })?;

        Ok(Command {
            program,
            entries,
            input_files: self.input_files,
            jobname,
            default_jobname,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct CommandEntry {
    name: String,
    alias: String,
    value: Option<OptionValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    program: String,
    entries: Vec<CommandEntry>,
    input_files: Vec<PathBuf>,
    jobname: String,
    default_jobname: Option<String>,
}

impl Command {
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn jobname(&self) -> &str {
        &self.jobname
    }

    pub fn input_files(&self) -> &[PathBuf] {
        &self.input_files
    }

    /// Basenames of the input files.
    pub fn filenames(&self) -> Vec<String> {
        self.input_files
            .iter()
            .filter_map(|f| f.file_name())
            .map(|f| f.to_string_lossy().into_owned())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.value.as_ref())
    }

    /// The invocation as an argument vector, program first.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.program.clone()];
        for entry in &self.entries {
            let value = match &entry.value {
                None | Some(OptionValue::Flag(false)) => continue,
                Some(OptionValue::Flag(true)) => None,
                Some(v) => Some(v),
            };
            if entry.name == JOBNAME_FIELD
                && value.and_then(OptionValue::as_str) == self.default_jobname.as_deref()
            {
                continue;
            }
            args.extend(entry.alias.split_whitespace().map(str::to_string));
            if let Some(v) = value {
                args.push(v.to_string());
            }
        }
        args.extend(
            self.input_files
                .iter()
                .map(|f| f.to_string_lossy().into_owned()),
        );
        args
    }

    pub fn render(&self) -> String {
        self.args().join(" ")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> CommandSchema {
        CommandSchema::new("runner")
            .option(CmdOption::jobname("-jobname"))
            .option(CmdOption::cpu("ncpu", "-NJOBS"))
            .option(CmdOption::flag("verbose", "-v"))
            .option(CmdOption::host("-HOST"))
    }

    #[test]
    fn render_sorts_options_by_alias_and_appends_files() {
        let cmd = schema()
            .builder()
            .input_file("in.file")
            .set("jobname", "x")
            .set("ncpu", 4)
            .build()
            .unwrap();
        assert_eq!(cmd.render(), "runner -NJOBS 4 -jobname x in.file");
    }

    #[test]
    fn render_is_independent_of_insertion_order() {
        let a = schema()
            .builder()
            .set("host", "localhost:4")
            .set("ncpu", 2)
            .input_file("a.mae")
            .build()
            .unwrap();
        let b = schema()
            .builder()
            .input_file("a.mae")
            .set("ncpu", 2)
            .set("host", "localhost:4")
            .build()
            .unwrap();
        assert_eq!(a.render(), b.render());
        assert_eq!(a.render(), "runner -HOST localhost:4 -NJOBS 2 a.mae");
    }

    #[test]
    fn derived_default_jobname_is_omitted() {
        let cmd = schema().builder().input_file("dir/in.file").build().unwrap();
        assert_eq!(cmd.jobname(), "in");
        assert!(!cmd.render().contains("-jobname"));

        let explicit = schema()
            .builder()
            .input_file("dir/in.file")
            .set("jobname", "in")
            .build()
            .unwrap();
        assert!(!explicit.render().contains("-jobname"));
    }

    #[test]
    fn flags_render_bare_when_true_and_vanish_when_false() {
        let on = schema()
            .builder()
            .input_file("a.mae")
            .set("verbose", true)
            .build()
            .unwrap();
        assert_eq!(on.args(), vec!["runner", "-NJOBS", "12", "-v", "a.mae"]);

        let off = schema().builder().input_file("a.mae").build().unwrap();
        assert!(!off.args().contains(&"-v".to_string()));
    }

    #[test]
    fn multi_token_alias_is_split_into_arguments() {
        let schema = CommandSchema::new("prog")
            .option(CmdOption::new("flex", "-rflexdist 1", ValueKind::Flag).default_value(true));
        let cmd = schema.builder().input_file("x.mae").build().unwrap();
        assert_eq!(cmd.args(), vec!["prog", "-rflexdist", "1", "x.mae"]);
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = schema()
            .builder()
            .input_file("a.mae")
            .set("threads", 3)
            .build()
            .unwrap_err();
        assert_eq!(err.field(), "threads");
    }

    #[test]
    fn invalid_value_fails_construction() {
        let err = schema()
            .builder()
            .input_file("a.mae")
            .set("ncpu", -1)
            .build()
            .unwrap_err();
        assert!(matches!(err, CommandError::Numericality { .. }));
    }

    #[test]
    fn missing_jobname_without_inputs_is_an_error() {
        let err = schema().builder().build().unwrap_err();
        assert!(matches!(err, CommandError::MissingJobname { .. }));

        let named = schema().builder().set("jobname", "solo").build().unwrap();
        assert_eq!(named.jobname(), "solo");
        assert_eq!(named.render(), "runner -NJOBS 12 -jobname solo");
    }

    #[test]
    fn filenames_are_basenames() {
        let cmd = schema()
            .builder()
            .input_files(["/tmp/a.mae", "b.mae"])
            .build()
            .unwrap();
        assert_eq!(cmd.filenames(), vec!["a.mae", "b.mae"]);
        assert_eq!(cmd.to_string(), "runner -NJOBS 12 /tmp/a.mae b.mae");
    }
}
