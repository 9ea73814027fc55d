//! In-memory module images
//!
//! Serves byte buffers as if they were loaded modules. The buffers are
//! boxed and never reallocated, so their addresses stay fixed for the
//! lifetime of the locator.

use std::collections::HashMap;

use tracing::debug;

use super::ModuleLocator;
use crate::error::{Error, Result};

struct BufferModule {
    name: String,
    bytes: Box<[u8]>,
    /// Symbol name -> offset from image start
    symbols: HashMap<String, usize>,
}

impl BufferModule {
    fn base(&self) -> usize {
        self.bytes.as_ptr() as usize
    }
}

/// Locator over owned byte buffers.
pub struct BufferLocator {
    modules: Vec<BufferModule>,
}

impl BufferLocator {
    pub fn builder() -> BufferLocatorBuilder {
        BufferLocatorBuilder::default()
    }

    /// Locator holding a single image
    pub fn single<S: Into<String>>(name: S, bytes: Vec<u8>) -> Self {
        Self::builder().module(name, bytes).build()
    }

    /// Bytes of the named image
    pub fn image_bytes(&self, name: &str) -> Option<&[u8]> {
        self.find(name).map(|(_, module)| &*module.bytes)
    }

    fn find(&self, name: &str) -> Option<(usize, &BufferModule)> {
        self.modules
            .iter()
            .enumerate()
            .find(|(_, module)| module.name == name)
    }

    fn get(&self, handle: usize) -> Result<&BufferModule> {
        self.modules.get(handle).ok_or_else(|| Error::ModuleQueryFailed {
            module: format!("#{}", handle),
            message: "stale buffer handle".to_string(),
        })
    }
}

impl std::fmt::Debug for BufferLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.modules
                    .iter()
                    .map(|m| (&m.name, m.bytes.len(), m.symbols.len())),
            )
            .finish()
    }
}

impl ModuleLocator for BufferLocator {
    type Handle = usize;

    fn open(&self, name: &str) -> Result<usize> {
        self.find(name)
            .map(|(index, _)| index)
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))
    }

    fn base_address(&self, handle: &usize) -> Result<usize> {
        self.get(*handle).map(BufferModule::base)
    }

    fn image_size(&self, handle: &usize) -> Result<usize> {
        self.get(*handle).map(|module| module.bytes.len())
    }

    fn lookup_symbol(&self, handle: &usize, name: &str) -> Option<usize> {
        let module = self.modules.get(*handle)?;
        let offset = module.symbols.get(name)?;
        debug!("Buffer symbol {} at +0x{:X} in {}", name, offset, module.name);
        Some(module.base() + offset)
    }
}

/// Builder for [`BufferLocator`]
#[derive(Default)]
pub struct BufferLocatorBuilder {
    modules: Vec<BufferModule>,
}

impl BufferLocatorBuilder {
    /// Add an image. Lookups by name return the first image registered
    /// under that name.
    pub fn module<S: Into<String>>(mut self, name: S, bytes: Vec<u8>) -> Self {
        self.modules.push(BufferModule {
            name: name.into(),
            bytes: bytes.into_boxed_slice(),
            symbols: HashMap::new(),
        });
        self
    }

    /// Export `symbol` at `offset` in the most recently added image
    pub fn symbol<S: Into<String>>(mut self, symbol: S, offset: usize) -> Self {
        if let Some(module) = self.modules.last_mut() {
            module.symbols.insert(symbol.into(), offset);
        }
        self
    }

    pub fn build(self) -> BufferLocator {
        BufferLocator {
            modules: self.modules,
        }
    }
}
