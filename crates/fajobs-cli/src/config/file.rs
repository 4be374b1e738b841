use crate::error::{CliError, Result};
use fajobs::core::command::OptionValue;
use fajobs::engine::config::CpuRequest;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `cpu = 8` or `cpu = "all"`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FileCpu {
    Count(usize),
    Keyword(String),
}

impl FileCpu {
    pub fn to_request(&self) -> Result<CpuRequest> {
        match self {
            FileCpu::Count(n) => Ok(CpuRequest::Count(*n)),
            FileCpu::Keyword(s) => s.parse().map_err(|e| CliError::Config(format!("{}", e))),
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileQueueConfig {
    pub name: Option<String>,
    pub cpu: Option<FileCpu>,
    pub cpu_per_job: Option<usize>,
    pub workdir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileNotificationConfig {
    pub level: Option<String>,
    pub recipient: Option<String>,
    pub smtp_server: Option<String>,
    pub netrc: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileBackendConfig {
    pub poll_interval_ms: Option<u64>,
    pub capture_output: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileCommandConfig {
    pub program: Option<String>,
    #[serde(default)]
    pub options: BTreeMap<String, toml::Value>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileStageConfig {
    pub marker: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub queue: Option<FileQueueConfig>,
    pub notification: Option<FileNotificationConfig>,
    pub backend: Option<FileBackendConfig>,
    pub command: Option<FileCommandConfig>,
    pub stage: Option<FileStageConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

/// Converts a TOML scalar into a command option value.
pub fn option_from_toml(name: &str, value: &toml::Value) -> Result<OptionValue> {
    match value {
        toml::Value::Boolean(b) => Ok(OptionValue::Flag(*b)),
        toml::Value::Integer(i) => Ok(OptionValue::Int(*i)),
        toml::Value::Float(f) => Ok(OptionValue::Float(*f)),
        toml::Value::String(s) => Ok(OptionValue::Text(s.clone())),
        other => Err(CliError::Config(format!(
            "Option '{}' must be a boolean, number or string, got {}",
            name,
            other.type_str()
        ))),
    }
}

pub fn option_to_toml(value: OptionValue) -> toml::Value {
    match value {
        OptionValue::Flag(b) => toml::Value::Boolean(b),
        OptionValue::Int(i) => toml::Value::Integer(i),
        OptionValue::Float(f) => toml::Value::Float(f),
        OptionValue::Text(s) => toml::Value::String(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn full_file_is_parsed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fajobs.toml");
        fs::write(
            &path,
            r#"
            [queue]
            name = "docking"
            cpu = "all"
            cpu-per-job = 4
            workdir = "runs"

            [notification]
            level = "failed"
            recipient = "chemist@example.org"
            smtp-server = "smtp.example.org"

            [backend]
            poll-interval-ms = 250
            capture-output = false

            [command]
            program = "macromodel"
            options = { host = "localhost:4", ncpu = 4 }

            [stage]
            marker = "dock.done"
            "#,
        )
        .unwrap();

        let config = FileConfig::from_file(&path).unwrap();
        let queue = config.queue.unwrap();
        assert_eq!(queue.name.as_deref(), Some("docking"));
        assert_eq!(queue.cpu, Some(FileCpu::Keyword("all".into())));
        assert_eq!(queue.cpu_per_job, Some(4));
        assert_eq!(
            config.notification.unwrap().smtp_server.as_deref(),
            Some("smtp.example.org")
        );
        assert_eq!(config.backend.unwrap().poll_interval_ms, Some(250));
        let command = config.command.unwrap();
        assert_eq!(command.options.len(), 2);
        assert_eq!(
            config.stage.unwrap().marker,
            Some(PathBuf::from("dock.done"))
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[queue]\ncpus = 3\n").unwrap();
        assert!(matches!(
            FileConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn cpu_accepts_numbers_and_keywords() {
        assert_eq!(FileCpu::Count(6).to_request().unwrap(), CpuRequest::Count(6));
        assert_eq!(
            FileCpu::Keyword("all".into()).to_request().unwrap(),
            CpuRequest::All
        );
        assert!(FileCpu::Keyword("many".into()).to_request().is_err());
    }

    #[test]
    fn toml_scalars_map_to_option_values() {
        assert_eq!(
            option_from_toml("x", &toml::Value::Integer(3)).unwrap(),
            OptionValue::Int(3)
        );
        assert_eq!(
            option_from_toml("x", &toml::Value::String("a".into())).unwrap(),
            OptionValue::Text("a".into())
        );
        assert!(option_from_toml("x", &toml::Value::Array(vec![])).is_err());
    }
}
