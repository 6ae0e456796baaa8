//! Offset registry inspection.

use anyhow::Result;
use osumeter::{OffsetSource, TrackerConfig};

pub fn run(config: &TrackerConfig) -> Result<()> {
    for path in &config.offset_paths {
        let marker = if path.exists() { "found" } else { "missing" };
        println!("  candidate: {} ({})", path.display(), marker);
    }

    let registry = super::load_registry(config);
    println!("Source : {}", registry.source());
    println!(
        "Schema : {}",
        registry.schema_version().unwrap_or("(none)")
    );
    println!("Entries: {}", registry.len());

    if *registry.source() == OffsetSource::Builtin {
        println!("Readers will use their built-in defaults.");
    }
    Ok(())
}
