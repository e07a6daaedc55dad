// src/utils/log.rs

//! Console formatting helpers for CLI output.
//!
//! Structured logging goes through the `log` crate; these helpers print
//! the human-facing run summaries.

/// Print a section header.
pub fn header(message: &str) {
    println!();
    println!("=== {} ===", message);
}

/// Print a success line.
pub fn success(message: &str) {
    println!("[ok] {}", message);
}

/// Print an indented detail line.
pub fn sub_item(message: &str) {
    println!("     - {}", message);
}

/// Print a failure line.
pub fn failure(message: &str) {
    eprintln!("[!!] {}", message);
}
