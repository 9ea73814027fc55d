//! Resolve command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use memsig::{BufferLocator, Resolver, SignatureSet, load_signatures};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::info;

use super::image::{self, ImageArgs};

/// Result for one signature set entry
#[derive(Debug, Clone, Serialize)]
pub struct EntryRow {
    pub name: String,
    /// Offset from the image start, if any candidate matched
    pub offset: Option<usize>,
    /// Index of the first candidate that matched
    pub candidate: Option<usize>,
}

/// Resolve every entry of `set`
pub fn resolve_entries(
    resolver: &Resolver<BufferLocator>,
    set: &SignatureSet,
) -> Result<Vec<EntryRow>> {
    let base = resolver.module()?.base;

    let mut rows = Vec::with_capacity(set.entries.len());
    for entry in &set.entries {
        let target = entry.hook_site().locate(resolver)?;
        let candidate = target.and_then(|address| {
            entry
                .signatures
                .iter()
                .position(|signature| resolver.cached(signature) == Some(address))
        });
        rows.push(EntryRow {
            name: entry.name.clone(),
            offset: target.and_then(|address| address.offset_from(base)),
            candidate,
        });
    }
    Ok(rows)
}

/// Run the resolve command
pub fn run(args: &ImageArgs, signatures: &Path, json: bool) -> Result<()> {
    let set = load_signatures(signatures)
        .with_context(|| format!("Failed to load signatures from {}", signatures.display()))?;
    info!(
        "Loaded {} signature entries (version: {})",
        set.entries.len(),
        if set.version.is_empty() {
            "unknown"
        } else {
            set.version.as_str()
        }
    );

    let resolver = image::open(args)?;
    let rows = resolve_entries(&resolver, &set)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let found = rows.iter().filter(|row| row.offset.is_some()).count();
    for row in &rows {
        match (row.offset, row.candidate) {
            (Some(offset), Some(candidate)) => println!(
                "{:<32} {} (candidate {})",
                row.name,
                format!("0x{:X}", offset).green(),
                candidate
            ),
            (Some(offset), None) => {
                println!("{:<32} {}", row.name, format!("0x{:X}", offset).green())
            }
            (None, _) => println!("{:<32} {}", row.name, "not found".red()),
        }
    }
    println!();
    println!("Resolved {}/{} entries", found, rows.len());

    let stats = resolver.stats();
    info!(
        "Scans: {}, symbol hits: {}, cache hits: {}",
        stats.scans, stats.symbol_hits, stats.cache_hits
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use memsig::{SignatureEntry, save_signatures};
    use tempfile::NamedTempFile;

    #[test]
    fn test_resolve_entries() {
        let mut bytes = vec![0u8; 0x40];
        bytes[0x10..0x14].copy_from_slice(&[0xFF, 0x43, 0x01, 0xD1]);
        let resolver =
            Resolver::for_module(BufferLocator::single("libgame.so", bytes), "libgame.so");

        let set = SignatureSet {
            version: String::new(),
            entries: vec![
                SignatureEntry {
                    name: "init".to_string(),
                    signatures: vec!["AA BB".to_string(), "FF 43 ?? D1".to_string()],
                },
                SignatureEntry {
                    name: "missing".to_string(),
                    signatures: vec!["DE AD BE EF".to_string()],
                },
            ],
        };

        let rows = resolve_entries(&resolver, &set).unwrap();
        assert_eq!(rows[0].offset, Some(0x10));
        assert_eq!(rows[0].candidate, Some(1));
        assert_eq!(rows[1].offset, None);
        assert_eq!(rows[1].candidate, None);
    }

    #[test]
    fn test_run_with_files() {
        let image_file = NamedTempFile::new().unwrap();
        std::fs::write(image_file.path(), [0x90, 0x90, 0xC3]).unwrap();
        let set_file = NamedTempFile::new().unwrap();
        save_signatures(
            set_file.path(),
            &SignatureSet {
                version: "test".to_string(),
                entries: vec![SignatureEntry {
                    name: "ret".to_string(),
                    signatures: vec!["C3".to_string()],
                }],
            },
        )
        .unwrap();

        let args = ImageArgs {
            file: image_file.path().to_path_buf(),
            symbols: Vec::new(),
            no_symbols: true,
        };
        run(&args, set_file.path(), true).unwrap();
    }
}
