//! CONFIG command - Show the effective processor configuration.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use pinflow_request::ProcessorConfig;

use super::{HumanReadable, output, yes_no};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {}

impl HumanReadable for ProcessorConfig {
    fn print_human(&self) {
        println!("{}", "Processor configuration".bold());
        println!();
        println!(
            "  {} {}",
            "Placeholder activity:".cyan(),
            self.placeholder_activity,
        );
        println!(
            "  {} {}",
            "Verify states:".cyan(),
            yes_no(self.verify_states),
        );
        println!(
            "  {} {}",
            "Strict verification:".cyan(),
            yes_no(self.strict_verification),
        );
        println!("  {} {}", "Log level:".cyan(), self.log_level);
    }
}

/// Execute the config command.
pub fn execute(config: &ProcessorConfig, human: bool, _args: ConfigArgs) -> Result<()> {
    output(config, human)
}
