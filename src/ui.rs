#![allow(dead_code)]

use colored::Colorize;
use reconcile::Outcome;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a template's terminal outcome, colored by severity
pub fn outcome(key: &str, outcome: Outcome) {
    let label = outcome.to_string();
    let rendered = match outcome {
        Outcome::InDesiredState | Outcome::Configured => label.green(),
        Outcome::WouldConfigure => label.cyan(),
        Outcome::ConfiguredWithDrift | Outcome::Cancelled => label.yellow(),
        Outcome::ValidationFailed | Outcome::Failed => label.red(),
    };
    println!("{} {}: {}", "•".blue(), key.bold(), rendered);
}
