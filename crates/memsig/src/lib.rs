//! # memsig
//!
//! Signature resolution inside a module loaded into the current process.
//!
//! This crate provides:
//! - A tolerant compiler for `"48 8B ?? ?? 05"`-style signatures
//! - Masked Boyer-Moore-Horspool search with an exhaustive fallback
//! - A thread-safe resolver that caches every result and prefers exported
//!   symbols over byte scanning
//! - Unchecked typed access for fields, virtual methods and raw functions
//!   at resolved addresses
//! - Hook site descriptors and JSON signature sets for hook frameworks

pub mod access;
pub mod error;
pub mod hook;
pub mod module;
pub mod pattern;
pub mod resolver;
pub mod scan;
pub mod signature;

pub use access::{
    AsAddress, CallArgs, address_call, field, field_ref, virtual_call, virtual_call_const,
    vtable_entry,
};
pub use error::{Error, Result};
pub use hook::HookSite;
#[cfg(any(target_os = "linux", target_os = "android", target_os = "windows"))]
pub use module::{DefaultLocator, default_locator};
pub use module::{BufferLocator, BufferLocatorBuilder, ModuleImage, ModuleLocator};
pub use pattern::Pattern;
pub use resolver::{
    Address, Resolution, Resolver, ResolverConfig, ResolverConfigBuilder, ResolverStats, Source,
};
pub use scan::SkipTable;
pub use signature::{SignatureEntry, SignatureSet, load_signatures, save_signatures};
