//! `plangrid inspect`: plan metadata read straight from the annotations.

use std::fmt::Write;
use std::path::Path;

use anyhow::{Context, Result};
use plangrid_core::{PlanMetadata, StreamBinding, annotation};

pub fn inspect(path: &str, format: &str) -> Result<()> {
    let text = std::fs::read_to_string(Path::new(path))
        .with_context(|| format!("failed to read plan file {path}"))?;
    let metadata = PlanMetadata::from_parsed(&annotation::scan(&text)?)
        .with_context(|| format!("{path} is not a valid plan"))?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        _ => {
            print!("{}", format_metadata(&metadata));
        }
    }

    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn format_bindings(out: &mut String, title: &str, arrow: &str, bindings: &[StreamBinding]) {
    let _ = writeln!(out, "{title}:");
    if bindings.is_empty() {
        out.push_str("  (none)\n");
    }
    for b in bindings {
        let _ = writeln!(out, "  {} {arrow} {}", b.local_name, b.stream_id);
    }
}

pub fn format_metadata(metadata: &PlanMetadata) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Plan:        {}", metadata.name);
    if !metadata.description.is_empty() {
        let _ = writeln!(out, "Description: {}", metadata.description);
    }
    let _ = writeln!(
        out,
        "Tracing:     {}\nStatistics:  {}",
        on_off(metadata.tracing_enabled),
        on_off(metadata.statistics_enabled)
    );
    format_bindings(&mut out, "Imports", "<-", &metadata.imports);
    format_bindings(&mut out, "Exports", "->", &metadata.exports);
    out
}
