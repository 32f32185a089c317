//! Colored CLI display utilities for supervisor output.

use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::supervisor::SupervisorStats;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Truncate a string to a maximum number of characters, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

/// Human-readable byte count.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Print that a transcoder was spawned.
pub fn print_started(command_line: &str) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "[STARTED]".green().bold(),
        truncate(command_line, 120).dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print that the supervisor stopped.
pub fn print_stopped(stats: &SupervisorStats) {
    println!(
        "{} {} frames={}, bytes={}, spawns={}, restarts={}",
        timestamp().dimmed(),
        "[STOPPED]".blue().bold(),
        stats.frames,
        format_bytes(stats.bytes),
        stats.spawns,
        stats.automatic_restarts
    );
    let _ = io::stdout().flush();
}

/// Print a restart.
pub fn print_restarted() {
    println!("{} {}", timestamp().dimmed(), "[RESTARTED]".yellow().bold());
    let _ = io::stdout().flush();
}

/// Print a received frame, with the file it was written to if any.
pub fn print_frame(sequence: u64, len: usize, path: Option<&Path>) {
    let size = format_bytes(len as u64);
    match path {
        Some(path) => println!(
            "{} {} #{} {} -> {}",
            timestamp().dimmed(),
            "[FRAME]".cyan().bold(),
            sequence,
            size,
            path.display().dimmed()
        ),
        None => println!(
            "{} {} #{} {}",
            timestamp().dimmed(),
            "[FRAME]".cyan().bold(),
            sequence,
            size
        ),
    }
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "[ERROR]".red().bold(),
        message
    );
    let _ = io::stdout().flush();
}
