//! Module location
//!
//! The resolver never talks to the OS loader directly; it goes through a
//! [`ModuleLocator`]. This module provides:
//! - [`DlLocator`] for Linux/Android (`dlopen`/`dlsym`/`dl_iterate_phdr`)
//! - [`Win32Locator`] for Windows (`GetModuleHandleW`/`GetModuleInformation`)
//! - [`BufferLocator`] for images held in memory (tests, files on disk)

mod buffer;
#[cfg(any(target_os = "linux", target_os = "android"))]
mod linux;
#[cfg(target_os = "windows")]
mod windows;

pub use buffer::{BufferLocator, BufferLocatorBuilder};
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use linux::{DlHandle, DlLocator};
#[cfg(target_os = "windows")]
pub use windows::{Win32Handle, Win32Locator};

use crate::error::Result;

/// Base address and length of a mapped module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModuleImage {
    /// Start of the mapped image
    pub base: usize,
    /// Length of the image in bytes
    pub size: usize,
}

impl ModuleImage {
    pub fn new(base: usize, size: usize) -> Self {
        Self { base, size }
    }

    /// End address (exclusive)
    #[inline]
    pub fn end(&self) -> usize {
        self.base.saturating_add(self.size)
    }

    /// Check if an address lies inside the image
    #[inline]
    pub fn contains(&self, address: usize) -> bool {
        address >= self.base && address < self.end()
    }

    /// View the image as a byte slice.
    ///
    /// # Safety
    ///
    /// `base..base + size` must be mapped and readable for as long as the
    /// returned slice is used, and must not be written concurrently.
    pub unsafe fn as_slice<'a>(&self) -> &'a [u8] {
        if self.size == 0 || self.base == 0 {
            return &[];
        }
        // SAFETY: the caller guarantees the range is mapped and readable.
        unsafe { std::slice::from_raw_parts(self.base as *const u8, self.size) }
    }
}

/// Facility that finds a loaded module and its exported symbols.
///
/// Failures from `open`, `base_address` and `image_size` mean the module
/// is unusable; callers propagate them rather than retrying.
pub trait ModuleLocator: Send + Sync {
    /// Opaque handle returned by [`ModuleLocator::open`]
    type Handle: Clone + Send + Sync;

    /// Open an already loaded module by name
    fn open(&self, name: &str) -> Result<Self::Handle>;

    /// Start address of the module's mapped image
    fn base_address(&self, handle: &Self::Handle) -> Result<usize>;

    /// Size in bytes of the module's mapped image
    fn image_size(&self, handle: &Self::Handle) -> Result<usize>;

    /// Address of an exported symbol, or `None` when it does not exist
    fn lookup_symbol(&self, handle: &Self::Handle, name: &str) -> Option<usize>;

    /// Open `name` and query its image in one step
    fn locate(&self, name: &str) -> Result<(Self::Handle, ModuleImage)> {
        let handle = self.open(name)?;
        let base = self.base_address(&handle)?;
        let size = self.image_size(&handle)?;
        Ok((handle, ModuleImage::new(base, size)))
    }
}

/// Locator for the current platform
#[cfg(any(target_os = "linux", target_os = "android"))]
pub type DefaultLocator = DlLocator;

#[cfg(target_os = "windows")]
pub type DefaultLocator = Win32Locator;

/// Create the locator for the current platform
#[cfg(any(target_os = "linux", target_os = "android", target_os = "windows"))]
pub fn default_locator() -> DefaultLocator {
    DefaultLocator::default()
}

/// Compare a loader-reported path against a requested module name.
///
/// Matches either the full path or its final component.
#[cfg_attr(not(any(target_os = "linux", target_os = "android")), allow(dead_code))]
pub(crate) fn module_name_matches(path: &str, name: &str) -> bool {
    if path.is_empty() || name.is_empty() {
        return false;
    }
    if path == name {
        return true;
    }
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    if cfg!(target_os = "windows") {
        file_name.eq_ignore_ascii_case(name)
    } else {
        file_name == name
    }
}
