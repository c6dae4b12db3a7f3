//! Parse command implementation
//!
//! Runs the event-stream parser over one raw chunk and prints its packets.
//!
//! ```bash
//! perf-lens parse chunk.txt [--timestamp 1700000000] [--json]
//! ```

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;

use perf_lens::stream::{self, StreamMessage};

use crate::cli::ParseArgs;

/// Execute the parse command
pub fn execute(args: &ParseArgs, json_output: bool) -> Result<()> {
    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read chunk file: {}", args.input.display()))?;

    let message = stream::parse(&raw, args.timestamp);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        print_message(&message);
    }

    Ok(())
}

fn print_message(message: &StreamMessage) {
    println!();
    println!(
        "{} {} packets @ {}ns",
        "=>".bright_cyan(),
        message.packets.len(),
        message.perf_ns
    );
    println!();

    for packet in &message.packets {
        let value = packet
            .value
            .as_deref()
            .map(|v| format!("{:?}", v))
            .unwrap_or_else(|| "(none)".dimmed().to_string());
        println!("  {:10} {}", packet.name.as_str().bright_white().bold(), value);
    }

    if message.ends_with_done_marker() {
        println!();
        println!("{} Stream terminated by [DONE]", "✓".bright_green().bold());
    }
}
