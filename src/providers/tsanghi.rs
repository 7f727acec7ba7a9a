use crate::core::price::{Quote, QuoteError, StockPriceProvider, decimal_price};
use crate::providers::util::{http_client, read_body, send_quote_request};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Public token handed out by tsanghi.com for unauthenticated use. It is
/// shared and heavily rate limited.
const DEMO_TOKEN: &str = "demo";

/// Realtime stock prices from tsanghi.com, addressed by exchange MIC and ticker.
pub struct TsanghiProvider {
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct RealtimeResponse {
    code: Option<i64>,
    msg: Option<String>,
    data: Option<Vec<RealtimeQuote>>,
}

#[derive(Debug, Deserialize)]
struct RealtimeQuote {
    close: Option<f64>,
}

impl TsanghiProvider {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        Ok(TsanghiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
        })
    }

    /// Builds `{base}/api/fin/stock/{exchange}/realtime`. The exchange comes
    /// from the table, so it is pushed as an escaped path segment.
    fn realtime_url(&self, code: &str, exchange: &str) -> Result<Url, QuoteError> {
        let invalid = |reason: String| QuoteError::network(code, format!("invalid URL: {reason}"));
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "fin", "stock", exchange, "realtime"]);
        url.query_pairs_mut()
            .append_pair("token", DEMO_TOKEN)
            .append_pair("ticker", code);
        Ok(url)
    }
}

#[async_trait]
impl StockPriceProvider for TsanghiProvider {
    #[instrument(name = "TsanghiPriceFetch", skip(self), fields(code = %code, exchange = %exchange))]
    async fn fetch_stock_price(&self, code: &str, exchange: &str) -> Result<Quote, QuoteError> {
        let url = self.realtime_url(code, exchange)?;
        debug!("Requesting realtime quote from {}", url);

        let response = send_quote_request(code, self.client.get(url)).await?;
        let text = read_body(code, response).await?;
        let body: RealtimeResponse = serde_json::from_str(&text)
            .map_err(|e| QuoteError::not_found(code, format!("failed to parse response: {e}")))?;

        let msg = body.msg.unwrap_or_default();
        match body.code {
            Some(200) => {}
            Some(429) => return Err(QuoteError::rate_limited(code, msg)),
            Some(other) => {
                return Err(QuoteError::not_found(code, format!("code {other}: {msg}")));
            }
            None => return Err(QuoteError::not_found(code, "response carries no status code")),
        }

        let price = body
            .data
            .and_then(|d| d.into_iter().next())
            .and_then(|q| q.close)
            .ok_or_else(|| QuoteError::not_found(code, "no close price in response"))?;

        Ok(Quote {
            code: code.to_string(),
            price: decimal_price(code, price)?,
            currency: None,
            exchange: Some(exchange.to_string()),
            timestamp: None,
            source: "tsanghi".to_string(),
        })
    }
}
