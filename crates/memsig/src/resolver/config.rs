/// Configuration for a [`Resolver`](super::Resolver)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Name of the module to search (e.g. `libminecraftpe.so`)
    pub module_name: String,
    /// Try each signature as an exported symbol name before scanning
    pub symbol_lookup: bool,
}

impl ResolverConfig {
    /// Configuration for `module_name` with default settings
    pub fn new<S: Into<String>>(module_name: S) -> Self {
        Self {
            module_name: module_name.into(),
            symbol_lookup: true,
        }
    }

    /// Create a new configuration builder
    pub fn builder<S: Into<String>>(module_name: S) -> ResolverConfigBuilder {
        ResolverConfigBuilder {
            module_name: module_name.into(),
            symbol_lookup: None,
        }
    }
}

/// Builder for ResolverConfig
#[derive(Debug, Clone)]
pub struct ResolverConfigBuilder {
    module_name: String,
    symbol_lookup: Option<bool>,
}

impl ResolverConfigBuilder {
    /// Enable or disable the exported-symbol probe
    pub fn symbol_lookup(mut self, enabled: bool) -> Self {
        self.symbol_lookup = Some(enabled);
        self
    }

    /// Build the configuration
    pub fn build(self) -> ResolverConfig {
        let default = ResolverConfig::new(self.module_name);
        ResolverConfig {
            symbol_lookup: self.symbol_lookup.unwrap_or(default.symbol_lookup),
            ..default
        }
    }
}
