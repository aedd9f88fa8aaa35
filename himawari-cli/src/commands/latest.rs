//! Latest command - print the newest image timestamp.

use crate::error::CliError;
use crate::runner::{CliRunner, Overrides};

pub fn run(overrides: Overrides) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("latest");
    let acquirer = runner.acquirer(&overrides)?;

    let latest = runner
        .runtime()
        .block_on(acquirer.latest_timestamp())?;

    println!("{} UTC", latest.timestamp);
    if !latest.file.is_empty() {
        println!("{}", latest.file);
    }
    Ok(())
}
