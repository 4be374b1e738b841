use crate::cli::RunArgs;
use crate::config::build_config;
use crate::error::Result;
use tracing::info;

/// Prints the command line of every job `run` would start.
pub async fn run(args: RunArgs) -> Result<()> {
    let config = build_config(&args)?;
    info!(
        queue = %config.queue.name,
        jobs = config.commands.len(),
        "Rendering commands"
    );
    for command in &config.commands {
        println!("{}", command);
    }
    Ok(())
}
