use colored::{ColoredString, Colorize};
use std::fmt::Display;

pub fn header(title: &str) {
    println!("{}", title.bold().underline());
}

pub fn subheader(title: &str) {
    println!("{}", title.bold());
}

pub fn hint(msg: &str) {
    println!("{} {}", "hint:".cyan().bold(), msg.dimmed());
}

pub fn info(msg: &str) {
    eprintln!("{} {}", "info:".blue().bold(), msg);
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Indented `label: value` line with the label dimmed and padded.
pub fn field(label: &str, value: impl Display) {
    println!("  {:<24} {}", format!("{label}:").dimmed(), value);
}

/// A report counter: red when a non-zero value signals a problem, green for
/// other non-zero values, dimmed for zero.
pub fn count(value: u32, is_problem: bool) -> ColoredString {
    let text = value.to_string();
    match (value, is_problem) {
        (0, _) => text.dimmed(),
        (_, true) => text.red().bold(),
        (_, false) => text.green()
    }
}
