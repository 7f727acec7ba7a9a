use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

pub const ALPHA_VANTAGE_KEY_ENV: &str = "ALPHA_VANTAGE_API_KEY";

fn default_bitable_base_url() -> String {
    "https://open.feishu.cn/open-apis".to_string()
}

fn default_page_size() -> u32 {
    500
}

fn default_timeout_secs() -> u64 {
    10
}

/// Credentials and location of the tracked table.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BitableConfig {
    pub app_id: String,
    pub app_secret: String,
    pub app_token: String,
    pub table_id: String,
    #[serde(default = "default_bitable_base_url")]
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Column names the workflow reads and writes.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TableColumns {
    pub code_field: String,
    pub exchange_field: Option<String>,
    pub price_field: String,
}

impl Default for TableColumns {
    fn default() -> Self {
        TableColumns {
            code_field: "代号".to_string(),
            exchange_field: None,
            price_field: "last_price".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
    /// Market suffixes tried in order for fund codes; an empty entry means the bare code.
    #[serde(default = "default_fund_suffixes")]
    pub suffixes: Vec<String>,
}

fn default_fund_suffixes() -> Vec<String> {
    vec![".SS".to_string(), ".SZ".to_string(), String::new()]
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EastmoneyProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TsanghiProviderConfig {
    pub base_url: String,
    #[serde(default = "default_exchange")]
    pub default_exchange: String,
}

fn default_exchange() -> String {
    "XNAS".to_string()
}

fn default_alpha_vantage_base_url() -> String {
    "https://www.alphavantage.co".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AlphaVantageProviderConfig {
    #[serde(default = "default_alpha_vantage_base_url")]
    pub base_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
    pub eastmoney: Option<EastmoneyProviderConfig>,
    pub tsanghi: Option<TsanghiProviderConfig>,
    pub alpha_vantage: Option<AlphaVantageProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
                suffixes: default_fund_suffixes(),
            }),
            eastmoney: Some(EastmoneyProviderConfig {
                base_url: "https://fund.eastmoney.com".to_string(),
            }),
            tsanghi: Some(TsanghiProviderConfig {
                base_url: "https://tsanghi.com".to_string(),
                default_exchange: default_exchange(),
            }),
            alpha_vantage: Some(AlphaVantageProviderConfig {
                base_url: default_alpha_vantage_base_url(),
                api_key: None,
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub bitable: BitableConfig,
    #[serde(default)]
    pub table: TableColumns,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("cn", "bitquote", "bitquote")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Alpha Vantage key, with the environment taking precedence over the file.
    pub fn alpha_vantage_key(&self) -> Option<String> {
        let from_file = self
            .providers
            .alpha_vantage
            .as_ref()
            .and_then(|p| p.api_key.clone());
        Self::pick_key(std::env::var(ALPHA_VANTAGE_KEY_ENV).ok(), from_file)
    }

    /// Base URL and key for Alpha Vantage, or `None` when no key is available.
    ///
    /// A key from the environment enables the provider even when the config
    /// has no `alpha_vantage` section.
    pub fn alpha_vantage(&self) -> Option<(String, String)> {
        self.alpha_vantage_with_key(self.alpha_vantage_key())
    }

    fn alpha_vantage_with_key(&self, key: Option<String>) -> Option<(String, String)> {
        let key = key?;
        let base_url = self
            .providers
            .alpha_vantage
            .as_ref()
            .map_or_else(default_alpha_vantage_base_url, |p| p.base_url.clone());
        Some((base_url, key))
    }

    fn pick_key(from_env: Option<String>, from_file: Option<String>) -> Option<String> {
        from_env
            .filter(|k| !k.trim().is_empty())
            .or(from_file.filter(|k| !k.trim().is_empty()))
    }

    pub fn default_exchange(&self) -> String {
        self.providers
            .tsanghi
            .as_ref()
            .map_or_else(default_exchange, |p| p.default_exchange.clone())
    }
}
