use crate::core::price::{Quote, QuoteError, StockPriceProvider};
use crate::providers::util::{http_client, read_body, send_quote_request};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument};

/// `GLOBAL_QUOTE` prices from Alpha Vantage.
///
/// Free keys allow a handful of requests per minute; once exhausted the API
/// still answers 200 but replaces the quote with a `Note` or `Information`
/// message.
pub struct AlphaVantageProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
}

impl AlphaVantageProvider {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> reqwest::Result<Self> {
        Ok(AlphaVantageProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl StockPriceProvider for AlphaVantageProvider {
    #[instrument(name = "AlphaVantagePriceFetch", skip(self, _exchange), fields(code = %code))]
    async fn fetch_stock_price(&self, code: &str, _exchange: &str) -> Result<Quote, QuoteError> {
        let url = Url::parse_with_params(
            &format!("{}/query", self.base_url),
            &[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", code),
                ("apikey", self.api_key.as_str()),
            ],
        )
        .map_err(|e| QuoteError::network(code, format!("invalid URL: {e}")))?;
        debug!(%code, "Requesting global quote");

        let response = send_quote_request(code, self.client.get(url)).await?;
        let text = read_body(code, response).await?;
        let body: GlobalQuoteResponse = serde_json::from_str(&text)
            .map_err(|e| QuoteError::not_found(code, format!("failed to parse response: {e}")))?;

        if let Some(note) = body.note.or(body.information) {
            return Err(QuoteError::rate_limited(code, note));
        }
        if let Some(message) = body.error_message {
            return Err(QuoteError::not_found(code, message));
        }

        let quote = body
            .global_quote
            .ok_or_else(|| QuoteError::not_found(code, "no Global Quote in response"))?;
        let price = quote
            .price
            .as_deref()
            .and_then(|p| Decimal::from_str(p.trim()).ok())
            .filter(|p| p.is_sign_positive() && !p.is_zero())
            .ok_or_else(|| QuoteError::not_found(code, "no usable price in Global Quote"))?;

        Ok(Quote {
            code: code.to_string(),
            price: price.normalize(),
            currency: None,
            exchange: None,
            timestamp: quote
                .latest_trading_day
                .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc()),
            source: "alpha_vantage".to_string(),
        })
    }
}
