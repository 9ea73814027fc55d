//! Compile command implementation.

use anyhow::Result;
use memsig::{Pattern, SkipTable};

/// Run the compile command
pub fn run(signature: &str) -> Result<()> {
    let pattern = Pattern::compile(signature);
    let table = SkipTable::build(&pattern);

    if pattern.is_empty() {
        println!("Pattern: (empty, resolves to the module base)");
        return Ok(());
    }

    println!("Pattern: {}", pattern);
    println!("Mask:    {}", mask_string(&pattern));
    println!(
        "Length:  {} ({} literal, {} wildcard)",
        pattern.len(),
        pattern.literal_count(),
        pattern.len() - pattern.literal_count()
    );
    println!();
    println!("Skip table (default {}):", pattern.len());
    for (byte, shift) in table.non_default() {
        println!("  {:02X} -> {}", byte, shift);
    }

    Ok(())
}

/// `x` for literal positions, `?` for wildcards
pub fn mask_string(pattern: &Pattern) -> String {
    pattern
        .mask()
        .iter()
        .map(|&literal| if literal { 'x' } else { '?' })
        .collect()
}
