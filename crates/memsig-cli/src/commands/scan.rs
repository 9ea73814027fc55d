//! Scan command implementation.

use anyhow::Result;
use memsig::scan::find_all;
use memsig::{BufferLocator, Pattern, Resolver, Source};
use owo_colors::OwoColorize;
use serde::Serialize;

use super::image::{self, ImageArgs};

/// Result for one signature
#[derive(Debug, Clone, Serialize)]
pub struct ScanRow {
    pub signature: String,
    pub pattern: String,
    /// Offset from the image start, if found
    pub offset: Option<usize>,
    pub source: Source,
    /// Total occurrences of the pattern (scanned signatures only)
    pub occurrences: Option<usize>,
}

/// Resolve each signature and count its occurrences
pub fn scan_rows(
    resolver: &Resolver<BufferLocator>,
    signatures: &[String],
) -> Result<Vec<ScanRow>> {
    let image = resolver.module()?;
    let module_name = resolver.config().module_name.as_str();
    let bytes = resolver
        .locator()
        .image_bytes(module_name)
        .unwrap_or_default();

    let mut rows = Vec::with_capacity(signatures.len());
    for signature in signatures {
        let resolution = resolver.resolve_detailed(signature)?;
        let pattern = Pattern::compile(signature);
        let occurrences = matches!(resolution.source, Source::Scan | Source::NotFound)
            .then(|| find_all(bytes, &pattern).len());

        rows.push(ScanRow {
            signature: signature.clone(),
            pattern: pattern.to_string(),
            offset: Some(resolution.address)
                .filter(|address| !address.is_null())
                .and_then(|address| address.offset_from(image.base)),
            source: resolution.source,
            occurrences,
        });
    }
    Ok(rows)
}

/// Run the scan command
pub fn run(args: &ImageArgs, signatures: &[String], json: bool) -> Result<()> {
    let resolver = image::open(args)?;
    let rows = scan_rows(&resolver, signatures)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in &rows {
        print_row(row);
    }
    Ok(())
}

fn print_row(row: &ScanRow) {
    println!("{}", row.signature.bold());
    if row.pattern != row.signature {
        println!("  Pattern:     {}", row.pattern);
    }
    match row.offset {
        Some(offset) => println!(
            "  Offset:      {} (via {})",
            format!("0x{:X}", offset).green(),
            row.source
        ),
        None => println!("  Offset:      {}", "not found".red()),
    }
    if let Some(count) = row.occurrences {
        let text = format!("{}", count);
        if count > 1 {
            println!("  Occurrences: {} (first match used)", text.yellow());
        } else {
            println!("  Occurrences: {}", text);
        }
    }
}
