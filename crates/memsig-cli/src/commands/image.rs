//! Loading an image file as a module.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Args;
use memsig::{BufferLocator, Resolver, ResolverConfig};
use tracing::debug;

/// Image file and the symbols it exports
#[derive(Debug, Clone, Args)]
pub struct ImageArgs {
    /// Image file to search (searched as raw bytes, file offsets)
    pub file: PathBuf,

    /// Exported symbol as NAME=OFFSET (hex), may be repeated
    #[arg(long = "symbol", value_name = "NAME=OFFSET")]
    pub symbols: Vec<String>,

    /// Skip the exported-symbol probe
    #[arg(long)]
    pub no_symbols: bool,
}

/// Parse a hex address string (with or without 0x prefix)
pub fn parse_hex_address(s: &str) -> Result<usize> {
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    usize::from_str_radix(s, 16).map_err(|e| anyhow!("Invalid hex address: {}", e))
}

/// Parse a `NAME=OFFSET` symbol definition
pub fn parse_symbol(definition: &str) -> Result<(String, usize)> {
    let (name, offset) = definition
        .rsplit_once('=')
        .ok_or_else(|| anyhow!("Symbol must be NAME=OFFSET: {}", definition))?;
    if name.is_empty() {
        return Err(anyhow!("Symbol name is empty: {}", definition));
    }
    Ok((name.to_string(), parse_hex_address(offset)?))
}

fn module_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load the image and build a resolver over it
pub fn open(args: &ImageArgs) -> Result<Resolver<BufferLocator>> {
    let bytes = fs::read(&args.file)
        .with_context(|| format!("Failed to read image {}", args.file.display()))?;
    let name = module_name(&args.file);
    debug!("Loaded {} ({} bytes)", name, bytes.len());

    let mut builder = BufferLocator::builder().module(name.clone(), bytes);
    for definition in &args.symbols {
        let (symbol, offset) = parse_symbol(definition)?;
        builder = builder.symbol(symbol, offset);
    }

    let config = ResolverConfig::builder(name)
        .symbol_lookup(!args.no_symbols)
        .build();
    Ok(Resolver::new(builder.build(), config))
}
