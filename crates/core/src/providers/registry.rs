use super::bolsa_santiago::BolsaSantiagoProvider;
use super::iex_cloud::IexCloudProvider;
use super::traits::MarketDataProvider;
use super::yahoo_finance::YahooFinanceProvider;

/// Registry of all available market-data providers, keyed by origin.
///
/// Origins accept the historical short aliases callers already use
/// ("iex", "yahoo"), normalized to the canonical ids the adapters report.
/// New providers can be registered without modifying existing code.
pub struct ProviderRegistry {
    providers: Vec<Box<dyn MarketDataProvider>>,
}

/// Normalize an origin alias to its canonical id.
/// Returns `None` for origins no adapter claims.
pub fn resolve_origin(origin: &str) -> Option<&'static str> {
    match origin.trim().to_lowercase().as_str() {
        "iex" | "iex_cloud" => Some("iex_cloud"),
        "yahoo" | "yahoo_finance" => Some("yahoo_finance"),
        "bolsa" | "bolsa_santiago" => Some("bolsa_santiago"),
        _ => None,
    }
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Create a registry with all default providers pre-configured.
    ///
    /// The quote API needs a token; without one only the exchange portal
    /// and Yahoo are registered.
    pub fn new_with_defaults(iex_token: Option<&str>) -> Self {
        let mut registry = Self::new();

        if let Some(token) = iex_token {
            registry.register(Box::new(IexCloudProvider::new(token.to_string())));
        }

        if let Ok(yahoo) = YahooFinanceProvider::new() {
            registry.register(Box::new(yahoo));
        }

        registry.register(Box::new(BolsaSantiagoProvider::new()));

        registry
    }

    /// Register a new provider.
    pub fn register(&mut self, provider: Box<dyn MarketDataProvider>) {
        self.providers.push(provider);
    }

    /// Look up a provider by origin. Aliases are normalized first; an
    /// unrecognized alias still matches a provider registered under that
    /// exact name, so custom providers don't need an alias entry.
    pub fn get(&self, origin: &str) -> Option<&dyn MarketDataProvider> {
        let canonical = resolve_origin(origin).unwrap_or(origin);
        self.providers
            .iter()
            .find(|p| p.name() == canonical)
            .map(|p| p.as_ref())
    }

    /// Canonical ids of every registered provider, in registration order.
    pub fn origins(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
