//! Signature resolution cache
//!
//! A [`Resolver`] turns signatures into addresses inside one module:
//! 1. Return a previously resolved address
//! 2. Open the module on first use
//! 3. Try the signature as an exported symbol
//! 4. Compile the signature (memoized) and scan the module image
//!
//! Every outcome is cached, including "not found". The lock guarding the
//! caches is never held while the module is opened or scanned, so two
//! threads missing on the same signature may both do the work; the results
//! are identical and the last insert wins.
//!
//! ## Example
//!
//! ```ignore
//! use memsig::{Resolver, ResolverConfig, default_locator};
//!
//! let resolver = Resolver::new(default_locator(), ResolverConfig::new("libminecraftpe.so"));
//! let address = resolver.resolve("FD 7B ?? A9 ?? ?? ?? 91")?;
//! if let Some(target) = address.non_null() {
//!     // install a detour at `target`
//! }
//! ```

mod address;
mod config;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::module::{ModuleImage, ModuleLocator};
use crate::pattern::Pattern;
use crate::scan::{self, SkipTable};

pub use address::{Address, Resolution, Source};
pub use config::{ResolverConfig, ResolverConfigBuilder};

/// Compiled signature with its skip table
#[derive(Debug)]
struct CompiledSignature {
    pattern: Pattern,
    table: SkipTable,
}

struct LoadedModule<H> {
    handle: H,
    image: ModuleImage,
}

struct State<H> {
    module: Option<Arc<LoadedModule<H>>>,
    addresses: HashMap<String, Address>,
    patterns: HashMap<String, Arc<CompiledSignature>>,
}

impl<H> Default for State<H> {
    fn default() -> Self {
        Self {
            module: None,
            addresses: HashMap::new(),
            patterns: HashMap::new(),
        }
    }
}

/// Counters describing the work a resolver has done
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Attempts to open the target module
    pub module_opens: usize,
    /// Lookups answered from the address cache
    pub cache_hits: usize,
    /// Signatures resolved as exported symbols
    pub symbol_hits: usize,
    /// Signatures compiled into patterns
    pub compilations: usize,
    /// Module image scans
    pub scans: usize,
}

#[derive(Default)]
struct Counters {
    module_opens: AtomicUsize,
    cache_hits: AtomicUsize,
    symbol_hits: AtomicUsize,
    compilations: AtomicUsize,
    scans: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ResolverStats {
        ResolverStats {
            module_opens: self.module_opens.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            symbol_hits: self.symbol_hits.load(Ordering::Relaxed),
            compilations: self.compilations.load(Ordering::Relaxed),
            scans: self.scans.load(Ordering::Relaxed),
        }
    }
}

/// Resolves signatures to addresses inside a single module.
pub struct Resolver<L: ModuleLocator> {
    locator: L,
    config: ResolverConfig,
    state: Mutex<State<L::Handle>>,
    counters: Counters,
}

impl<L: ModuleLocator> Resolver<L> {
    pub fn new(locator: L, config: ResolverConfig) -> Self {
        Self {
            locator,
            config,
            state: Mutex::new(State::default()),
            counters: Counters::default(),
        }
    }

    /// Resolver for `module_name` with default settings
    pub fn for_module<S: Into<String>>(locator: L, module_name: S) -> Self {
        Self::new(locator, ResolverConfig::new(module_name))
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn locator(&self) -> &L {
        &self.locator
    }

    pub fn stats(&self) -> ResolverStats {
        self.counters.snapshot()
    }

    /// Resolve a signature to an absolute address.
    ///
    /// Returns [`Address::NULL`] when the signature matches nothing. Errors
    /// only come from the module locator.
    pub fn resolve(&self, signature: &str) -> Result<Address> {
        self.resolve_detailed(signature).map(|r| r.address)
    }

    /// Like [`resolve`](Self::resolve), also reporting which step answered.
    pub fn resolve_detailed(&self, signature: &str) -> Result<Resolution> {
        if let Some(address) = self.cached(signature) {
            Counters::bump(&self.counters.cache_hits);
            return Ok(Resolution {
                address,
                source: Source::Cache,
            });
        }

        let module = self.loaded_module()?;

        if self.config.symbol_lookup
            && let Some(symbol) = self
                .locator
                .lookup_symbol(&module.handle, signature)
                .filter(|&addr| addr != 0)
        {
            Counters::bump(&self.counters.symbol_hits);
            debug!("Resolved {} as symbol at 0x{:X}", signature, symbol);
            return Ok(self.remember(signature, Address::new(symbol), Source::Symbol));
        }

        let compiled = self.compiled(signature);
        if compiled.pattern.is_empty() {
            debug!("Empty pattern for {:?}, using module base", signature);
            return Ok(self.remember(
                signature,
                Address::new(module.image.base),
                Source::ModuleBase,
            ));
        }

        Counters::bump(&self.counters.scans);
        let started = Instant::now();
        // SAFETY: the locator reported this range as the mapped image of a
        // loaded module, which stays mapped and unmodified.
        let haystack = unsafe { module.image.as_slice() };
        let found = scan::find(haystack, &compiled.pattern, &compiled.table);
        debug!(
            "Scanned 0x{:X} bytes for {} in {:?}: {:?}",
            haystack.len(),
            compiled.pattern,
            started.elapsed(),
            found
        );

        let resolution = match found {
            Some(offset) => self.remember(
                signature,
                Address::new(module.image.base + offset),
                Source::Scan,
            ),
            None => self.remember(signature, Address::NULL, Source::NotFound),
        };
        Ok(resolution)
    }

    /// Resolve candidates in order and return the first non-null address.
    ///
    /// Every candidate tried is cached individually.
    pub fn resolve_any<S: AsRef<str>>(&self, signatures: &[S]) -> Result<Address> {
        for signature in signatures {
            let address = self.resolve(signature.as_ref())?;
            if !address.is_null() {
                return Ok(address);
            }
        }
        Ok(Address::NULL)
    }

    /// Previously resolved address for `signature`, if any
    pub fn cached(&self, signature: &str) -> Option<Address> {
        self.state.lock().addresses.get(signature).copied()
    }

    /// Image of the target module, opening it on first use
    pub fn module(&self) -> Result<ModuleImage> {
        self.loaded_module().map(|module| module.image)
    }

    fn loaded_module(&self) -> Result<Arc<LoadedModule<L::Handle>>> {
        if let Some(module) = self.state.lock().module.as_ref() {
            return Ok(Arc::clone(module));
        }

        Counters::bump(&self.counters.module_opens);
        let (handle, image) = self.locator.locate(&self.config.module_name)?;
        info!(
            "Opened module {} at 0x{:X} (0x{:X} bytes)",
            self.config.module_name, image.base, image.size
        );

        let mut state = self.state.lock();
        let module = state
            .module
            .get_or_insert_with(|| Arc::new(LoadedModule { handle, image }));
        Ok(Arc::clone(module))
    }

    fn compiled(&self, signature: &str) -> Arc<CompiledSignature> {
        let mut state = self.state.lock();
        if let Some(compiled) = state.patterns.get(signature) {
            return Arc::clone(compiled);
        }

        Counters::bump(&self.counters.compilations);
        let pattern = Pattern::compile(signature);
        let table = SkipTable::build(&pattern);
        let compiled = Arc::new(CompiledSignature { pattern, table });
        state
            .patterns
            .insert(signature.to_string(), Arc::clone(&compiled));
        compiled
    }

    fn remember(&self, signature: &str, address: Address, source: Source) -> Resolution {
        self.state
            .lock()
            .addresses
            .insert(signature.to_string(), address);
        Resolution { address, source }
    }
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "windows"))]
impl Resolver<crate::module::DefaultLocator> {
    /// Resolver for a module loaded in the current process
    pub fn in_process<S: Into<String>>(module_name: S) -> Self {
        Self::for_module(crate::module::default_locator(), module_name)
    }
}

impl<L: ModuleLocator> std::fmt::Debug for Resolver<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("module", &state.module.as_ref().map(|m| m.image))
            .field("cached", &state.addresses.len())
            .field("stats", &self.counters.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::module::BufferLocator;

    const MODULE: &str = "libtest.so";

    fn resolver_over(bytes: Vec<u8>) -> Resolver<BufferLocator> {
        Resolver::for_module(BufferLocator::single(MODULE, bytes), MODULE)
    }

    fn base_of(resolver: &Resolver<BufferLocator>) -> usize {
        resolver.module().unwrap().base
    }

    #[test]
    fn test_concrete_scenario() {
        let resolver = resolver_over(vec![0x10, 0xAA, 0xBB, 0x10, 0xCC, 0xBB]);
        let resolution = resolver.resolve_detailed("10 ? BB").unwrap();
        assert_eq!(resolution.source, Source::Scan);
        assert_eq!(resolution.address.get(), base_of(&resolver));
    }

    #[test]
    fn test_empty_signature_is_module_base() {
        let resolver = resolver_over(vec![0xCC; 16]);
        let address = resolver.resolve("").unwrap();
        assert_eq!(address.get(), base_of(&resolver));
        assert_eq!(resolver.stats().scans, 0);
    }

    #[test]
    fn test_all_wildcards_match_module_start() {
        let resolver = resolver_over(vec![0x01, 0x02, 0x03, 0x04]);
        let address = resolver.resolve("?? ??").unwrap();
        assert_eq!(address.get(), base_of(&resolver));
    }

    #[test]
    fn test_match_inside_module() {
        let mut bytes = vec![0u8; 0x400];
        bytes[0x123..0x127].copy_from_slice(&[0xFD, 0x7B, 0xBF, 0xA9]);
        let resolver = resolver_over(bytes);
        let address = resolver.resolve("FD 7B ?? A9").unwrap();
        assert_eq!(address.offset_from(base_of(&resolver)), Some(0x123));
    }

    #[test]
    fn test_second_resolve_is_cached() {
        let resolver = resolver_over(vec![0x90, 0x90, 0xC3]);
        let first = resolver.resolve("90 C3").unwrap();
        let second = resolver.resolve_detailed("90 C3").unwrap();

        assert_eq!(first, second.address);
        assert_eq!(second.source, Source::Cache);
        let stats = resolver.stats();
        assert_eq!(stats.scans, 1);
        assert_eq!(stats.compilations, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.module_opens, 1);
    }

    #[test]
    fn test_not_found_is_cached() {
        let resolver = resolver_over(vec![0x00; 64]);
        assert!(resolver.resolve("DE AD BE EF").unwrap().is_null());
        assert_eq!(resolver.cached("DE AD BE EF"), Some(Address::NULL));

        let again = resolver.resolve_detailed("DE AD BE EF").unwrap();
        assert_eq!(again.source, Source::Cache);
        assert!(!again.is_found());
        assert_eq!(resolver.stats().scans, 1);
    }

    #[test]
    fn test_symbol_probe_skips_scan() {
        let locator = BufferLocator::builder()
            .module(MODULE, vec![0u8; 0x200])
            .symbol("_ZN5OreUi4initEv", 0x80)
            .build();
        let resolver = Resolver::for_module(locator, MODULE);

        let resolution = resolver.resolve_detailed("_ZN5OreUi4initEv").unwrap();
        assert_eq!(resolution.source, Source::Symbol);
        assert_eq!(resolution.address.get(), base_of(&resolver) + 0x80);

        let stats = resolver.stats();
        assert_eq!(stats.scans, 0);
        assert_eq!(stats.compilations, 0);
        assert_eq!(stats.symbol_hits, 1);
    }

    #[test]
    fn test_symbol_probe_disabled() {
        let locator = BufferLocator::builder()
            .module(MODULE, vec![0u8; 0x20])
            .symbol("init", 0x10)
            .build();
        let config = ResolverConfig::builder(MODULE).symbol_lookup(false).build();
        let resolver = Resolver::new(locator, config);

        let resolution = resolver.resolve_detailed("init").unwrap();
        assert_ne!(resolution.source, Source::Symbol);
        assert_eq!(resolver.stats().symbol_hits, 0);
    }

    #[test]
    fn test_missing_module_propagates() {
        let resolver = Resolver::for_module(BufferLocator::single("other.so", vec![0; 4]), MODULE);

        let err = resolver.resolve("00").unwrap_err();
        assert!(matches!(err, Error::ModuleNotFound(_)));
        assert!(resolver.cached("00").is_none());

        // Nothing is remembered, so the next call tries again
        assert!(resolver.resolve("00").is_err());
        assert_eq!(resolver.stats().module_opens, 2);
    }

    #[test]
    fn test_resolve_any_returns_first_found() {
        let resolver = resolver_over(vec![0x11, 0x22, 0x33, 0x44]);
        let address = resolver
            .resolve_any(&["AA BB", "33 44", "11 22"])
            .unwrap();
        assert_eq!(address.offset_from(base_of(&resolver)), Some(2));
        assert_eq!(resolver.cached("AA BB"), Some(Address::NULL));
        assert!(resolver.cached("11 22").is_none());
    }

    #[test]
    fn test_resolve_any_all_missing() {
        let resolver = resolver_over(vec![0x00; 8]);
        let address = resolver.resolve_any(&["AA", "BB"]).unwrap();
        assert!(address.is_null());
        let none: [&str; 0] = [];
        assert!(resolver.resolve_any(&none).unwrap().is_null());
    }

    #[test]
    fn test_concurrent_resolve_agrees() {
        let mut bytes = vec![0x90u8; 0x10000];
        bytes[0xBEEF..0xBEF3].copy_from_slice(&[0x48, 0x89, 0x5C, 0x24]);
        let resolver = resolver_over(bytes);

        let results: Vec<Address> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| resolver.resolve("48 89 ?? 24").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let expected = base_of(&resolver) + 0xBEEF;
        assert!(results.iter().all(|a| a.get() == expected));
        assert_eq!(resolver.module().unwrap(), resolver.module().unwrap());
    }
}
