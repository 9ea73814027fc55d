//! Windows module locator
//!
//! Resolves modules already loaded into the current process with
//! `GetModuleHandleW`, sizes them with `GetModuleInformation` and looks up
//! exports with `GetProcAddress`.

use std::ffi::CString;

use tracing::debug;
use windows::Win32::Foundation::HMODULE;
use windows::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress};
use windows::Win32::System::ProcessStatus::{GetModuleInformation, MODULEINFO};
use windows::Win32::System::Threading::GetCurrentProcess;
use windows::core::{HSTRING, PCSTR};

use super::ModuleLocator;
use crate::error::{Error, Result};

/// Handle to a module loaded in the current process
#[derive(Debug, Clone)]
pub struct Win32Handle {
    name: String,
    raw: usize,
}

impl Win32Handle {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn module(&self) -> HMODULE {
        HMODULE(self.raw as _)
    }

    fn info(&self) -> Result<MODULEINFO> {
        let mut info = MODULEINFO::default();
        // SAFETY: the module handle stays valid while the module is loaded and
        // `info` is a properly sized out-parameter.
        unsafe {
            GetModuleInformation(
                GetCurrentProcess(),
                self.module(),
                &mut info,
                std::mem::size_of::<MODULEINFO>() as u32,
            )
        }
        .map_err(|e| Error::ModuleQueryFailed {
            module: self.name.clone(),
            message: e.to_string(),
        })?;
        Ok(info)
    }
}

/// Locator backed by the Win32 loader
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Locator;

impl Win32Locator {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLocator for Win32Locator {
    type Handle = Win32Handle;

    fn open(&self, name: &str) -> Result<Win32Handle> {
        // SAFETY: GetModuleHandleW does not take a loader reference and only
        // reads the provided string.
        let module = unsafe { GetModuleHandleW(&HSTRING::from(name)) }
            .map_err(|e| Error::ModuleNotFound(format!("{} ({})", name, e)))?;
        debug!("GetModuleHandleW {} -> {:?}", name, module.0);

        Ok(Win32Handle {
            name: name.to_string(),
            raw: module.0 as usize,
        })
    }

    fn base_address(&self, handle: &Win32Handle) -> Result<usize> {
        Ok(handle.info()?.lpBaseOfDll as usize)
    }

    fn image_size(&self, handle: &Win32Handle) -> Result<usize> {
        Ok(handle.info()?.SizeOfImage as usize)
    }

    fn lookup_symbol(&self, handle: &Win32Handle, name: &str) -> Option<usize> {
        let c_name = CString::new(name).ok()?;
        // SAFETY: c_name is NUL-terminated and outlives the call.
        let proc = unsafe { GetProcAddress(handle.module(), PCSTR(c_name.as_ptr() as *const u8)) }?;
        Some(proc as usize)
    }
}
