use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "fajobs developers",
    version,
    about = "fajobs - Run batches of computational-chemistry jobs through a CPU-budgeted job queue with live status and email notifications.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one job per input file and wait for the queue to terminate.
    Run(RunArgs),
    /// Print the command lines `run` would execute, without running anything.
    Render(RunArgs),
}

/// Arguments shared by `run` and `render`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    // --- Jobs ---
    /// Input files; each one becomes a job.
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Program to run (e.g., 'macromodel', 'prime_mmgbsa', or any executable).
    #[arg(short, long, value_name = "NAME")]
    pub program: Option<String>,

    /// Set a program option. Can be used multiple times. Example: -o host=localhost:4
    #[arg(short = 'o', long = "option", value_name = "NAME=VALUE")]
    pub options: Vec<String>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Queue ---
    /// Name of the job queue, used in the status header and notifications.
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Total number of cpus available to the queue, or 'all'.
    #[arg(long, value_name = "N|all")]
    pub cpu: Option<String>,

    /// Number of cpus used by each job.
    #[arg(long, value_name = "N")]
    pub cpu_per_job: Option<usize>,

    /// Directory where jobs run and write their logs.
    #[arg(short, long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    // --- Notifications ---
    /// Notification level: none, queue, failed or all.
    #[arg(long, value_name = "LEVEL")]
    pub notify: Option<String>,

    /// Email address receiving notifications.
    #[arg(long, value_name = "EMAIL")]
    pub recipient: Option<String>,

    /// SMTP server used to send notifications; credentials come from netrc.
    #[arg(long, value_name = "HOST")]
    pub smtp_server: Option<String>,

    // --- Backend ---
    /// Interval between two polls of the running jobs, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub poll_interval: Option<u64>,

    /// Let jobs write to the terminal instead of '<jobname>.log'.
    #[arg(long)]
    pub no_capture: bool,

    // --- Stage ---
    /// Stage marker file: skip the batch if it exists, create it after a clean run.
    #[arg(long, value_name = "PATH")]
    pub marker: Option<PathBuf>,

    /// Write a CSV summary with one row per job.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S queue.cpu-per-job=2
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
