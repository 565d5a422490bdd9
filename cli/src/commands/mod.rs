//! Command implementations for the pinflow CLI.
//!
//! Each command module provides:
//! - Args struct for clap argument parsing
//! - execute() function that performs the command
//! - Human-readable and JSON output formatting

pub mod config;
pub mod simulate;

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

/// Print output in JSON or human-readable format.
pub fn output<T: Serialize + HumanReadable>(value: &T, human: bool) -> Result<()> {
    if human {
        value.print_human();
    } else {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}

/// Trait for types that can be printed in human-readable format.
pub trait HumanReadable {
    fn print_human(&self);
}

/// Format a flag as a colored yes/no.
pub fn yes_no(flag: bool) -> colored::ColoredString {
    if flag { "yes".green() } else { "no".red() }
}
