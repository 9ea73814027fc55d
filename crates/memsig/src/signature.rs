//! Signature set files
//!
//! A signature set is a JSON document naming each target and listing its
//! candidate signatures, tried in order:
//!
//! ```json
//! {
//!   "version": "1.21.50",
//!   "entries": [
//!     { "name": "OreUi::init", "signatures": ["40 55 53 56 57 ?? ??", "FF 43 ?? D1"] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::hook::HookSite;
use crate::pattern::Pattern;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub name: String,
    pub signatures: Vec<String>,
}

impl SignatureEntry {
    /// Compiled form of every candidate
    pub fn patterns(&self) -> Vec<Pattern> {
        self.signatures.iter().map(|s| Pattern::compile(s)).collect()
    }

    pub fn hook_site(&self) -> HookSite {
        HookSite::new(self.name.clone(), self.signatures.iter().cloned())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSet {
    #[serde(default)]
    pub version: String,
    pub entries: Vec<SignatureEntry>,
}

impl SignatureSet {
    pub fn entry(&self, name: &str) -> Option<&SignatureEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    pub fn hook_sites(&self) -> Vec<HookSite> {
        self.entries.iter().map(SignatureEntry::hook_site).collect()
    }
}

pub fn load_signatures<P: AsRef<Path>>(path: P) -> Result<SignatureSet> {
    let content = fs::read_to_string(&path)?;
    let data = serde_json::from_str(&content)?;
    Ok(data)
}

pub fn save_signatures<P: AsRef<Path>>(path: P, signatures: &SignatureSet) -> Result<()> {
    let content = serde_json::to_string_pretty(signatures)?;
    fs::write(path, content)?;
    Ok(())
}
