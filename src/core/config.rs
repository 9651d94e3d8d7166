use crate::core::portfolio::PortfolioHolding;
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

/// Largest page the ranked market endpoints serve in one request.
pub const MAX_TOP_N: usize = 100;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SeriesProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ProvidersConfig {
    pub coingecko: ProviderConfig,
    pub coinpaprika: ProviderConfig,
    pub cryptocompare: SeriesProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            coingecko: ProviderConfig {
                base_url: "https://api.coingecko.com".to_string(),
            },
            coinpaprika: ProviderConfig {
                base_url: "https://api.coinpaprika.com".to_string(),
            },
            cryptocompare: SeriesProviderConfig {
                base_url: "https://min-api.cryptocompare.com".to_string(),
                api_key: None,
            },
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RefreshConfig {
    pub market_secs: u64,
    pub portfolio_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            market_secs: 60,
            portfolio_secs: 300,
        }
    }
}

impl RefreshConfig {
    pub fn market_interval(&self) -> Duration {
        Duration::from_secs(self.market_secs)
    }

    pub fn portfolio_interval(&self) -> Duration {
        Duration::from_secs(self.portfolio_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            retries: 2,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MarketConfig {
    pub top_n: usize,
    /// How many top coins are offered in the chart picker.
    pub selection_top_n: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            top_n: MAX_TOP_N,
            selection_top_n: 10,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_basket")]
    pub basket: Vec<PortfolioHolding>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub market: MarketConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            basket: default_basket(),
            providers: ProvidersConfig::default(),
            refresh: RefreshConfig::default(),
            http: HttpConfig::default(),
            market: MarketConfig::default(),
        }
    }
}

pub fn default_basket() -> Vec<PortfolioHolding> {
    [
        ("S", 0.242519221, 45.67),
        ("BONE", 0.314253601, 35.54),
        ("PI", 0.072179793, 17.58),
        ("HOT", 0.140283158, 0.06),
        ("AREA", 0.130255399, 1.12),
        ("SHIB", 0.029004557, 0.0),
        ("XEP", 0.017231113, 0.0),
        ("OMAX", 0.035760613, 0.0),
        ("CSPR", 0.008125776, 0.0),
        ("BAD", 0.001450946, 0.0),
        ("BTT", 0.001976374, 0.0),
        ("HTX", 0.000516305, 0.0),
        ("BLOK", 0.003385173, 0.0),
    ]
    .iter()
    .map(|(symbol, amount, weight)| PortfolioHolding::new(symbol, *amount, *weight))
    .collect()
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "coinpulse", "coinpulse")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        Self::from_yaml(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        for holding in &mut config.basket {
            holding.symbol = holding.symbol.trim().to_uppercase();
        }
        config.validate()?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for holding in &self.basket {
            if holding.symbol.is_empty() {
                bail!("Basket entry with empty symbol");
            }
            if !holding.held_amount.is_finite() || holding.held_amount <= 0.0 {
                bail!(
                    "Basket amount for {} must be positive, got {}",
                    holding.symbol,
                    holding.held_amount
                );
            }
            if holding.display_weight_percent < 0.0 {
                bail!("Basket weight for {} must not be negative", holding.symbol);
            }
            if !seen.insert(holding.symbol.to_uppercase()) {
                bail!("Duplicate basket symbol: {}", holding.symbol);
            }
        }
        if self.market.top_n == 0 {
            bail!("market.top_n must be at least 1");
        }
        if self.refresh.market_secs == 0 || self.refresh.portfolio_secs == 0 {
            bail!("Refresh intervals must be at least one second");
        }
        Ok(())
    }

    /// Requested page size, capped at what one provider request can return.
    pub fn top_n(&self) -> usize {
        self.market.top_n.min(MAX_TOP_N)
    }

    pub fn default_yaml() -> Result<String> {
        serde_yaml::to_string(&Self::default()).context("Failed to serialize default config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
basket:
  - symbol: "btc"
    amount: 0.5
    weight: 50
  - symbol: "ETH"
    amount: 10
    weight: 50
providers:
  coingecko:
    base_url: "http://example.com/gecko"
  cryptocompare:
    base_url: "http://example.com/cc"
    api_key: "secret"
refresh:
  market_secs: 30
market:
  top_n: 250
"#;

        let config = AppConfig::from_yaml(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.basket.len(), 2);
        assert_eq!(config.basket[0].symbol, "BTC");
        assert_eq!(config.basket[0].held_amount, 0.5);
        assert_eq!(config.basket[1].display_weight_percent, 50.0);
        assert_eq!(config.providers.coingecko.base_url, "http://example.com/gecko");
        assert_eq!(
            config.providers.coinpaprika.base_url,
            "https://api.coinpaprika.com"
        );
        assert_eq!(
            config.providers.cryptocompare.api_key.as_deref(),
            Some("secret")
        );
        assert_eq!(config.refresh.market_secs, 30);
        assert_eq!(config.refresh.portfolio_secs, 300);
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.top_n(), MAX_TOP_N);
        assert_eq!(config.market.selection_top_n, 10);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_yaml("{}").unwrap();
        assert_eq!(config.basket.len(), 13);
        assert_eq!(config.basket[0].symbol, "S");
        assert_eq!(config.refresh.market_interval(), Duration::from_secs(60));
        assert_eq!(config.refresh.portfolio_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_default_yaml_round_trips() {
        let yaml = AppConfig::default_yaml().unwrap();
        let config = AppConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.basket, default_basket());
    }

    #[test]
    fn test_validation_errors() {
        let duplicate = r#"
basket:
  - { symbol: "BTC", amount: 1, weight: 50 }
  - { symbol: "btc", amount: 2, weight: 50 }
"#;
        let err = AppConfig::from_yaml(duplicate).unwrap_err();
        assert_eq!(err.to_string(), "Duplicate basket symbol: BTC");

        let zero_amount = r#"
basket:
  - { symbol: "BTC", amount: 0, weight: 50 }
"#;
        assert!(AppConfig::from_yaml(zero_amount).is_err());

        let zero_top = "market:\n  top_n: 0\n";
        assert!(AppConfig::from_yaml(zero_top).is_err());

        let zero_refresh = "refresh:\n  portfolio_secs: 0\n";
        assert!(AppConfig::from_yaml(zero_refresh).is_err());
    }

    #[test]
    fn test_load_from_missing_path() {
        let err = AppConfig::load_from_path("/nonexistent/coinpulse.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
