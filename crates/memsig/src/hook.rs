//! Hook sites
//!
//! A hook framework describes each interception target as a name plus a
//! list of candidate signatures (usually one per game build or CPU
//! architecture). The framework asks the resolver for the target address
//! once and owns everything after that: detours, trampolines, forwarding to
//! the original function. A site that does not resolve is skipped.

use tracing::{debug, warn};

use crate::error::Result;
use crate::module::ModuleLocator;
use crate::resolver::{Address, Resolver};

/// One interception target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSite {
    pub name: String,
    pub signatures: Vec<String>,
}

impl HookSite {
    pub fn new<N, I, S>(name: N, signatures: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            signatures: signatures.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolve the site, trying each candidate signature in order.
    ///
    /// Returns `Ok(None)` when no candidate matches; errors come only from
    /// the module locator.
    pub fn locate<L: ModuleLocator>(&self, resolver: &Resolver<L>) -> Result<Option<Address>> {
        for (index, signature) in self.signatures.iter().enumerate() {
            let resolution = resolver.resolve_detailed(signature)?;
            if resolution.is_found() {
                debug!(
                    "Hook {} resolved to {} via candidate {} ({})",
                    self.name, resolution.address, index, resolution.source
                );
                return Ok(Some(resolution.address));
            }
        }

        warn!(
            "Hook {} not resolved ({} candidate signatures), skipping",
            self.name,
            self.signatures.len()
        );
        Ok(None)
    }

    /// Resolve the site and run `install` with the target address.
    ///
    /// `install` is not called for an unresolved site. Returns whether it
    /// ran.
    pub fn install_with<L, F>(&self, resolver: &Resolver<L>, install: F) -> Result<bool>
    where
        L: ModuleLocator,
        F: FnOnce(Address),
    {
        match self.locate(resolver)? {
            Some(target) => {
                install(target);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
