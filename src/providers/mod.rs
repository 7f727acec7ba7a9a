pub mod alpha_vantage;
pub mod bitable;
pub mod eastmoney;
pub mod fallback;
pub mod tsanghi;
pub mod util;
pub mod yahoo_finance;

use crate::core::config::AppConfig;
use crate::core::price::{FundPriceProvider, PriceResolver, StockPriceProvider};
use anyhow::{Context, Result};
use fallback::FallbackChain;
use std::time::Duration;
use tracing::debug;

/// Assembles the fund and stock provider chains described by the config.
pub fn build_resolver(config: &AppConfig) -> Result<PriceResolver> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let providers = &config.providers;

    let mut fund = FallbackChain::<dyn FundPriceProvider>::new();
    if let Some(yahoo) = &providers.yahoo {
        let provider =
            yahoo_finance::YahooFinanceProvider::new(&yahoo.base_url, &yahoo.suffixes, timeout)
                .context("Failed to create Yahoo Finance provider")?;
        fund = fund.with("yahoo", Box::new(provider));
    }
    if let Some(eastmoney) = &providers.eastmoney {
        let provider = eastmoney::EastmoneyProvider::new(&eastmoney.base_url, timeout)
            .context("Failed to create Eastmoney provider")?;
        fund = fund.with("eastmoney", Box::new(provider));
    }

    let mut stock = FallbackChain::<dyn StockPriceProvider>::new();
    if let Some((base_url, key)) = config.alpha_vantage() {
        let provider = alpha_vantage::AlphaVantageProvider::new(&base_url, &key, timeout)
            .context("Failed to create Alpha Vantage provider")?;
        stock = stock.with("alpha_vantage", Box::new(provider));
    }
    if let Some(tsanghi) = &providers.tsanghi {
        let provider = tsanghi::TsanghiProvider::new(&tsanghi.base_url, timeout)
            .context("Failed to create Tsanghi provider")?;
        stock = stock.with("tsanghi", Box::new(provider));
    }

    if fund.is_empty() || stock.is_empty() {
        anyhow::bail!("At least one fund provider and one stock provider must be configured");
    }
    debug!(fund = ?fund.names(), stock = ?stock.names(), "Built price providers");

    Ok(PriceResolver::new(
        Box::new(fund),
        Box::new(stock),
        &config.default_exchange(),
    ))
}
