//! Linux/Android module locator
//!
//! Uses `dlopen(RTLD_NOLOAD)` so only modules that are already mapped can be
//! opened, `dlsym` for exported symbols, and `dl_iterate_phdr` to find the
//! load bias and the extent of the module's `PT_LOAD` segments.

use std::ffi::{CStr, CString, c_char, c_int, c_void};

use tracing::debug;

use super::{ModuleLocator, module_name_matches};
use crate::error::{Error, Result};

const PT_LOAD: u32 = 1;

/// Handle to a module opened through the dynamic loader.
///
/// The loader reference taken by `dlopen` is never released; modules are
/// assumed to stay mapped for the life of the process.
#[derive(Debug, Clone)]
pub struct DlHandle {
    name: String,
    raw: usize,
    base: usize,
    size: usize,
}

impl DlHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Locator backed by the platform dynamic loader
#[derive(Debug, Default, Clone, Copy)]
pub struct DlLocator;

impl DlLocator {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLocator for DlLocator {
    type Handle = DlHandle;

    fn open(&self, name: &str) -> Result<DlHandle> {
        let c_name =
            CString::new(name).map_err(|_| Error::ModuleNotFound(name.to_string()))?;

        // SAFETY: c_name is a valid NUL-terminated string; RTLD_NOLOAD never
        // maps a new object.
        let raw = unsafe { libc::dlopen(c_name.as_ptr(), libc::RTLD_NOW | libc::RTLD_NOLOAD) };
        if raw.is_null() {
            return Err(Error::ModuleNotFound(format!(
                "{} ({})",
                name,
                last_dl_error().unwrap_or_else(|| "not loaded".to_string())
            )));
        }

        let (base, size) = loaded_extent(name).ok_or_else(|| Error::ModuleQueryFailed {
            module: name.to_string(),
            message: "no PT_LOAD segments reported by dl_iterate_phdr".to_string(),
        })?;
        debug!("dlopen {} -> base 0x{:X}, size 0x{:X}", name, base, size);

        Ok(DlHandle {
            name: name.to_string(),
            raw: raw as usize,
            base,
            size,
        })
    }

    fn base_address(&self, handle: &DlHandle) -> Result<usize> {
        Ok(handle.base)
    }

    fn image_size(&self, handle: &DlHandle) -> Result<usize> {
        Ok(handle.size)
    }

    fn lookup_symbol(&self, handle: &DlHandle, name: &str) -> Option<usize> {
        let c_name = CString::new(name).ok()?;
        // SAFETY: handle.raw came from a successful dlopen that is never closed.
        let address = unsafe { libc::dlsym(handle.raw as *mut c_void, c_name.as_ptr()) };
        (!address.is_null()).then_some(address as usize)
    }
}

fn last_dl_error() -> Option<String> {
    // SAFETY: dlerror returns either null or a thread-local C string.
    let message = unsafe { libc::dlerror() };
    if message.is_null() {
        return None;
    }
    // SAFETY: non-null dlerror results are NUL-terminated.
    Some(unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned())
}

struct ExtentQuery<'a> {
    name: &'a str,
    found: Option<(usize, usize)>,
}

/// Start address and length spanned by the named module's loadable segments
fn loaded_extent(name: &str) -> Option<(usize, usize)> {
    let mut query = ExtentQuery { name, found: None };
    // SAFETY: the callback only dereferences loader-provided structures and
    // the query, which outlives the call.
    unsafe {
        libc::dl_iterate_phdr(
            Some(visit_object),
            &mut query as *mut ExtentQuery<'_> as *mut c_void,
        );
    }
    query.found
}

unsafe extern "C" fn visit_object(
    info: *mut libc::dl_phdr_info,
    _size: libc::size_t,
    data: *mut c_void,
) -> c_int {
    // SAFETY: data is the ExtentQuery passed by loaded_extent and info is a
    // valid entry for the duration of the callback.
    let (query, info) = unsafe { (&mut *(data as *mut ExtentQuery<'_>), &*info) };

    let path = object_path(info.dlpi_name);
    if !module_name_matches(&path, query.name) {
        return 0;
    }

    let headers = if info.dlpi_phdr.is_null() {
        &[][..]
    } else {
        // SAFETY: dlpi_phdr points at dlpi_phnum program headers.
        unsafe { std::slice::from_raw_parts(info.dlpi_phdr, info.dlpi_phnum as usize) }
    };

    let mut start = usize::MAX;
    let mut end = 0usize;
    for header in headers.iter().filter(|h| h.p_type == PT_LOAD) {
        let vaddr = header.p_vaddr as usize;
        start = start.min(vaddr);
        end = end.max(vaddr.saturating_add(header.p_memsz as usize));
    }

    if start < end {
        query.found = Some((info.dlpi_addr as usize + start, end - start));
    }
    1
}

fn object_path(name: *const c_char) -> String {
    if name.is_null() {
        return String::new();
    }
    // SAFETY: the loader reports NUL-terminated object names.
    unsafe { CStr::from_ptr(name) }
        .to_string_lossy()
        .into_owned()
}
