use crate::core::price::{FundPriceProvider, Quote, QuoteError, StockPriceProvider};
use async_trait::async_trait;
use tracing::debug;

/// Tries providers in order and returns the first quote. When every provider
/// fails, the last provider's error is returned.
pub struct FallbackChain<P: ?Sized> {
    providers: Vec<(String, Box<P>)>,
}

impl<P: ?Sized> FallbackChain<P> {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    pub fn with(mut self, name: &str, provider: Box<P>) -> Self {
        self.providers.push((name.to_string(), provider));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|(n, _)| n.as_str()).collect()
    }
}

impl<P: ?Sized> Default for FallbackChain<P> {
    fn default() -> Self {
        Self::new()
    }
}

fn no_providers(code: &str) -> QuoteError {
    QuoteError::not_found(code, "no price provider configured")
}

#[async_trait]
impl FundPriceProvider for FallbackChain<dyn FundPriceProvider> {
    async fn fetch_fund_price(&self, code: &str) -> Result<Quote, QuoteError> {
        let mut last_error = no_providers(code);
        for (name, provider) in &self.providers {
            match provider.fetch_fund_price(code).await {
                Ok(quote) => return Ok(quote),
                Err(e) => {
                    debug!(provider = %name, %code, error = %e, "Provider failed, trying next");
                    last_error = last_error.or_rate_limited(e);
                }
            }
        }
        Err(last_error)
    }
}

#[async_trait]
impl StockPriceProvider for FallbackChain<dyn StockPriceProvider> {
    async fn fetch_stock_price(&self, code: &str, exchange: &str) -> Result<Quote, QuoteError> {
        let mut last_error = no_providers(code);
        for (name, provider) in &self.providers {
            match provider.fetch_stock_price(code, exchange).await {
                Ok(quote) => return Ok(quote),
                Err(e) => {
                    debug!(provider = %name, %code, error = %e, "Provider failed, trying next");
                    last_error = last_error.or_rate_limited(e);
                }
            }
        }
        Err(last_error)
    }
}
