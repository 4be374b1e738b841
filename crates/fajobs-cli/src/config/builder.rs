use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileCpu, option_from_toml, option_to_toml};
use super::models::AppConfig;
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use fajobs::core::command::{Command, OptionValue, schemas};
use fajobs::engine::config::{CpuRequest, QueueConfigBuilder};
use fajobs::engine::notification::NotificationLevel;
use fajobs::workflows::batch::BatchOptions;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const CPU_OPTION: &str = "ncpu";

pub fn build_config(args: &RunArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let queue_file = file_config.queue.take().unwrap_or_default();
    let notify_file = file_config.notification.take().unwrap_or_default();
    let backend_file = file_config.backend.take().unwrap_or_default();
    let command_file = file_config.command.take().unwrap_or_default();
    let stage_file = file_config.stage.take().unwrap_or_default();

    let program = args
        .program
        .clone()
        .or(command_file.program)
        .unwrap_or(defaults.program);

    let cpu = match (&args.cpu, &queue_file.cpu) {
        (Some(raw), _) => raw
            .parse::<CpuRequest>()
            .map_err(|e| CliError::Config(e.to_string()))?,
        (None, Some(file_cpu)) => file_cpu.to_request()?,
        (None, None) => defaults.cpu,
    };
    let cpu_per_job = args
        .cpu_per_job
        .or(queue_file.cpu_per_job)
        .unwrap_or(defaults.cpu_per_job);

    let notify_level = match args.notify.as_deref().or(notify_file.level.as_deref()) {
        Some(raw) => raw
            .parse::<NotificationLevel>()
            .map_err(|e| CliError::Config(e.to_string()))?,
        None => defaults.notify_level,
    };

    let queue = QueueConfigBuilder::new()
        .name(
            args.name
                .clone()
                .or(queue_file.name)
                .unwrap_or_else(|| program.clone()),
        )
        .total_cpu(cpu)
        .cpu_per_job(cpu_per_job)
        .workdir(
            args.workdir
                .clone()
                .or(queue_file.workdir)
                .unwrap_or(defaults.workdir),
        )
        .notify_level(notify_level)
        .recipient(args.recipient.clone().or(notify_file.recipient))
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let options = merge_options(&command_file.options, &args.options)?;
    let commands = build_commands(&program, &options, &args.files, queue.cpu_per_job)?;

    let poll_interval_ms = args
        .poll_interval
        .or(backend_file.poll_interval_ms)
        .unwrap_or(defaults.poll_interval_ms);
    if poll_interval_ms == 0 {
        return Err(CliError::Config(
            "The poll interval must be at least 1 ms.".to_string(),
        ));
    }

    Ok(AppConfig {
        queue,
        commands,
        poll_interval: Duration::from_millis(poll_interval_ms),
        capture_output: !args.no_capture
            && backend_file
                .capture_output
                .unwrap_or(defaults.capture_output),
        smtp_server: args
            .smtp_server
            .clone()
            .or(notify_file.smtp_server)
            .unwrap_or(defaults.smtp_server),
        netrc: notify_file.netrc,
        batch: BatchOptions {
            marker: args.marker.clone().or(stage_file.marker),
            report: args.report.clone().or(stage_file.report),
        },
    })
}

/// File options first, then `-o NAME=VALUE` flags on top.
fn merge_options(
    file_options: &BTreeMap<String, toml::Value>,
    cli_options: &[String],
) -> Result<BTreeMap<String, OptionValue>> {
    let mut merged = BTreeMap::new();
    for (name, value) in file_options {
        merged.insert(name.clone(), option_from_toml(name, value)?);
    }
    for raw in cli_options {
        let (name, value) =
            parser::parse_key_value(raw).map_err(|e| CliError::Argument(e.to_string()))?;
        merged.insert(name, parser::parse_option_value(&value));
    }
    Ok(merged)
}

/// One command per input file. A schema with a cpu option gets `cpu_per_job` unless
/// the option was set explicitly.
fn build_commands(
    program: &str,
    options: &BTreeMap<String, OptionValue>,
    files: &[PathBuf],
    cpu_per_job: usize,
) -> Result<Vec<Command>> {
    let schema = schemas::for_program(program);
    let inject_cpu = schema.find(CPU_OPTION).is_some() && !options.contains_key(CPU_OPTION);
    if inject_cpu {
        debug!(
            program,
            cpu_per_job, "Passing the per-job cpu budget to the program"
        );
    }

    files
        .iter()
        .map(|file| {
            let mut builder = schema.builder().input_file(file.clone());
            if inject_cpu {
                builder = builder.set(CPU_OPTION, OptionValue::Int(cpu_per_job as i64));
            }
            for (name, value) in options {
                builder = builder.set(name.clone(), value.clone());
            }
            builder.build().map_err(CliError::from)
        })
        .collect()
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value_str) =
            parser::parse_key_value(kv_pair).map_err(|e| CliError::Config(e.to_string()))?;
        let key = key.as_str();
        let value_str = value_str.as_str();

        let invalid = |kind: &str| {
            CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value_str))
        };

        match key {
            "queue.name" => {
                config.queue.get_or_insert_with(Default::default).name = Some(value_str.into());
            }
            "queue.cpu" => {
                let cpu = match value_str.parse::<usize>() {
                    Ok(n) => FileCpu::Count(n),
                    Err(_) => FileCpu::Keyword(value_str.to_string()),
                };
                config.queue.get_or_insert_with(Default::default).cpu = Some(cpu);
            }
            "queue.cpu-per-job" => {
                config.queue.get_or_insert_with(Default::default).cpu_per_job =
                    Some(value_str.parse().map_err(|_| invalid("integer"))?);
            }
            "queue.workdir" => {
                config.queue.get_or_insert_with(Default::default).workdir =
                    Some(PathBuf::from(value_str));
            }
            "notification.level" => {
                config.notification.get_or_insert_with(Default::default).level =
                    Some(value_str.into());
            }
            "notification.recipient" => {
                config
                    .notification
                    .get_or_insert_with(Default::default)
                    .recipient = Some(value_str.into());
            }
            "notification.smtp-server" => {
                config
                    .notification
                    .get_or_insert_with(Default::default)
                    .smtp_server = Some(value_str.into());
            }
            "notification.netrc" => {
                config.notification.get_or_insert_with(Default::default).netrc =
                    Some(PathBuf::from(value_str));
            }
            "backend.poll-interval-ms" => {
                config
                    .backend
                    .get_or_insert_with(Default::default)
                    .poll_interval_ms = Some(value_str.parse().map_err(|_| invalid("integer"))?);
            }
            "backend.capture-output" => {
                config
                    .backend
                    .get_or_insert_with(Default::default)
                    .capture_output = Some(value_str.parse().map_err(|_| invalid("boolean"))?);
            }
            "command.program" => {
                config.command.get_or_insert_with(Default::default).program =
                    Some(value_str.into());
            }
            "stage.marker" => {
                config.stage.get_or_insert_with(Default::default).marker =
                    Some(PathBuf::from(value_str));
            }
            "stage.report" => {
                config.stage.get_or_insert_with(Default::default).report =
                    Some(PathBuf::from(value_str));
            }
            _ => match key.strip_prefix("command.options.") {
                Some(name) if !name.is_empty() => {
                    config
                        .command
                        .get_or_insert_with(Default::default)
                        .options
                        .insert(
                            name.to_string(),
                            option_to_toml(parser::parse_option_value(value_str)),
                        );
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            },
        }
    }
    Ok(config)
}
