//! Pricing abstractions and core types

use crate::core::code::{CodeKind, CodeTarget, classify};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub code: String,
    pub price: Decimal,
    pub currency: Option<String>,
    pub exchange: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Name of the provider that produced this quote.
    pub source: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuoteError {
    #[error("Invalid code: '{0}'")]
    InvalidCode(String),

    #[error("No price found for {code}: {reason}")]
    NotFound { code: String, reason: String },

    #[error("Network error for {code}: {reason}")]
    Network { code: String, reason: String },

    #[error("Rate limited while fetching {code}: {reason}")]
    RateLimited { code: String, reason: String },
}

impl QuoteError {
    pub fn not_found(code: &str, reason: impl Into<String>) -> Self {
        QuoteError::NotFound {
            code: code.to_string(),
            reason: reason.into(),
        }
    }

    pub fn network(code: &str, reason: impl Into<String>) -> Self {
        QuoteError::Network {
            code: code.to_string(),
            reason: reason.into(),
        }
    }

    pub fn rate_limited(code: &str, reason: impl Into<String>) -> Self {
        QuoteError::RateLimited {
            code: code.to_string(),
            reason: reason.into(),
        }
    }

    /// Combines the errors of two attempts at the same code. A rate limit is
    /// kept over any later non-rate-limit error.
    pub fn or_rate_limited(self, next: QuoteError) -> QuoteError {
        match (&self, &next) {
            (QuoteError::RateLimited { .. }, QuoteError::RateLimited { .. }) => next,
            (QuoteError::RateLimited { .. }, _) => self,
            _ => next,
        }
    }

    /// Short label used when reporting per-code failures.
    pub fn kind(&self) -> &'static str {
        match self {
            QuoteError::InvalidCode(_) => "InvalidCode",
            QuoteError::NotFound { .. } => "NotFound",
            QuoteError::Network { .. } => "Network",
            QuoteError::RateLimited { .. } => "RateLimited",
        }
    }
}

/// Converts a provider's float price into a `Decimal`, rejecting non-positive values.
pub fn decimal_price(code: &str, value: f64) -> Result<Decimal, QuoteError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(QuoteError::not_found(code, format!("unusable price {value}")));
    }
    Decimal::try_from(value)
        .map(|d| d.normalize())
        .map_err(|e| QuoteError::not_found(code, format!("unusable price {value}: {e}")))
}

#[async_trait]
pub trait FundPriceProvider: Send + Sync {
    async fn fetch_fund_price(&self, code: &str) -> Result<Quote, QuoteError>;
}

#[async_trait]
pub trait StockPriceProvider: Send + Sync {
    async fn fetch_stock_price(&self, code: &str, exchange: &str) -> Result<Quote, QuoteError>;
}

/// Routes a code to the fund or stock strategy by its classification.
pub struct PriceResolver {
    fund: Box<dyn FundPriceProvider>,
    stock: Box<dyn StockPriceProvider>,
    default_exchange: String,
}

impl PriceResolver {
    pub fn new(
        fund: Box<dyn FundPriceProvider>,
        stock: Box<dyn StockPriceProvider>,
        default_exchange: &str,
    ) -> Self {
        Self {
            fund,
            stock,
            default_exchange: default_exchange.to_string(),
        }
    }

    pub async fn resolve(&self, target: &CodeTarget) -> Result<Quote, QuoteError> {
        match classify(&target.code) {
            CodeKind::Fund => self.fund.fetch_fund_price(&target.code).await,
            CodeKind::Stock => {
                let exchange = target
                    .exchange
                    .as_deref()
                    .unwrap_or(&self.default_exchange);
                debug!(code = %target.code, exchange, "Resolving stock price");
                self.stock.fetch_stock_price(&target.code, exchange).await
            }
            CodeKind::Invalid => Err(QuoteError::InvalidCode(target.code.clone())),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::StubProvider;
    use super::*;
    use std::sync::Arc;

    fn resolver() -> (PriceResolver, Arc<StubProvider>, Arc<StubProvider>) {
        let fund = Arc::new(StubProvider::default());
        let stock = Arc::new(StubProvider::default());
        let resolver = PriceResolver::new(
            Box::new(Arc::clone(&fund)),
            Box::new(Arc::clone(&stock)),
            "XNAS",
        );
        (resolver, fund, stock)
    }

    #[tokio::test]
    async fn test_fund_code_routes_to_fund_provider() {
        let (resolver, fund, stock) = resolver();
        let quote = resolver.resolve(&CodeTarget::new("600519")).await.unwrap();

        assert_eq!(quote.code, "600519");
        assert_eq!(quote.source, "fund-stub");
        assert_eq!(*fund.calls.lock().unwrap(), vec![("600519".to_string(), None)]);
        assert!(stock.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stock_code_uses_default_exchange() {
        let (resolver, fund, stock) = resolver();
        let quote = resolver.resolve(&CodeTarget::new("TSLA")).await.unwrap();

        assert_eq!(quote.source, "stock-stub");
        assert_eq!(
            *stock.calls.lock().unwrap(),
            vec![("TSLA".to_string(), Some("XNAS".to_string()))]
        );
        assert!(fund.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stock_code_uses_row_exchange() {
        let (resolver, _fund, stock) = resolver();
        let target = CodeTarget {
            code: "IBM".to_string(),
            exchange: Some("XNYS".to_string()),
        };
        resolver.resolve(&target).await.unwrap();

        assert_eq!(
            *stock.calls.lock().unwrap(),
            vec![("IBM".to_string(), Some("XNYS".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_invalid_code_is_never_sent() {
        let (resolver, fund, stock) = resolver();
        let result = resolver.resolve(&CodeTarget::new("--")).await;

        assert_eq!(result, Err(QuoteError::InvalidCode("--".to_string())));
        assert!(fund.calls.lock().unwrap().is_empty());
        assert!(stock.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_rate_limit_outlives_later_errors() {
        let limited = QuoteError::rate_limited("IBM", "429");
        let missing = QuoteError::not_found("IBM", "404");

        assert_eq!(limited.clone().or_rate_limited(missing.clone()), limited);
        assert_eq!(missing.clone().or_rate_limited(limited.clone()), limited);
        assert_eq!(
            missing.or_rate_limited(QuoteError::network("IBM", "reset")),
            QuoteError::network("IBM", "reset")
        );
    }

    #[test]
    fn test_decimal_price() {
        assert_eq!(decimal_price("X", 1.431).unwrap(), Decimal::new(1431, 3));
        assert_eq!(decimal_price("X", 250.0).unwrap(), Decimal::new(250, 0));
        assert!(matches!(
            decimal_price("X", 0.0),
            Err(QuoteError::NotFound { .. })
        ));
        assert!(decimal_price("X", f64::NAN).is_err());
    }
}
