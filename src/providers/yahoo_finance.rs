use crate::core::price::{FundPriceProvider, Quote, QuoteError, decimal_price};
use crate::providers::util::{http_client, read_body, send_quote_request};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Fund prices from the Yahoo Finance chart endpoint.
///
/// Mainland fund codes are listed under a market suffix (`.SS` for Shanghai,
/// `.SZ` for Shenzhen), so each configured suffix is tried in turn.
pub struct YahooFinanceProvider {
    base_url: String,
    suffixes: Vec<String>,
    client: Client,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, suffixes: &[String], timeout: Duration) -> reqwest::Result<Self> {
        Ok(YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            suffixes: suffixes.to_vec(),
            client: http_client(timeout)?,
        })
    }

    async fn fetch_symbol(&self, code: &str, symbol: &str) -> Result<Quote, QuoteError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        debug!("Requesting price data from {}", url);

        let response = send_quote_request(code, self.client.get(&url)).await?;
        let text = read_body(code, response).await?;

        let data: YahooPriceResponse = serde_json::from_str(&text).map_err(|e| {
            QuoteError::not_found(code, format!("failed to parse chart for {symbol}: {e}"))
        })?;
        let meta = data
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .map(|item| item.meta)
            .ok_or_else(|| QuoteError::not_found(code, format!("no chart data for {symbol}")))?;
        let price = meta
            .regular_market_price
            .ok_or_else(|| QuoteError::not_found(code, format!("no market price for {symbol}")))?;

        Ok(Quote {
            code: code.to_string(),
            price: decimal_price(code, price)?,
            currency: meta.currency,
            exchange: meta.exchange_name,
            timestamp: meta
                .regular_market_time
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
            source: format!("yahoo:{symbol}"),
        })
    }
}

#[derive(Deserialize, Debug)]
struct YahooPriceResponse {
    chart: PriceChartResult,
}

#[derive(Deserialize, Debug)]
struct PriceChartResult {
    result: Option<Vec<PriceChartItem>>,
}

#[derive(Deserialize, Debug)]
struct PriceChartItem {
    meta: PriceChartMeta,
}

#[derive(Deserialize, Debug)]
struct PriceChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    currency: Option<String>,
    #[serde(alias = "exchangeName")]
    exchange_name: Option<String>,
    #[serde(alias = "regularMarketTime")]
    regular_market_time: Option<i64>,
}

#[async_trait]
impl FundPriceProvider for YahooFinanceProvider {
    #[instrument(
        name = "YahooPriceFetch",
        skip(self),
        fields(code = %code)
    )]
    async fn fetch_fund_price(&self, code: &str) -> Result<Quote, QuoteError> {
        let mut last_error = QuoteError::not_found(code, "no market suffix configured");
        for suffix in &self.suffixes {
            let symbol = format!("{code}{suffix}");
            match self.fetch_symbol(code, &symbol).await {
                Ok(quote) => return Ok(quote),
                Err(e) => {
                    debug!(%symbol, error = %e, "Symbol lookup failed");
                    last_error = last_error.or_rate_limited(e);
                }
            }
        }
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_mock_server(symbol: &str, mock_response: &str) -> wiremock::MockServer {
        let mock_server = wiremock::MockServer::start().await;
        let request_path = format!("/v8/finance/chart/{symbol}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn suffixes() -> Vec<String> {
        vec![".SS".to_string(), ".SZ".to_string(), String::new()]
    }

    fn provider(mock_server: &MockServer) -> YahooFinanceProvider {
        YahooFinanceProvider::new(&mock_server.uri(), &suffixes(), Duration::from_secs(5)).unwrap()
    }

    const CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "currency": "CNY",
                    "symbol": "600519.SS",
                    "exchangeName": "SHH",
                    "regularMarketPrice": 1431.5,
                    "regularMarketTime": 1727420400
                }
            }],
            "error": null
        }
    }"#;

    #[tokio::test]
    async fn test_successful_price_fetch() {
        let mock_server = create_mock_server("600519.SS", CHART).await;

        let quote = provider(&mock_server).fetch_fund_price("600519").await.unwrap();
        assert_eq!(quote.code, "600519");
        assert_eq!(quote.price, Decimal::new(14315, 1));
        assert_eq!(quote.currency.as_deref(), Some("CNY"));
        assert_eq!(quote.exchange.as_deref(), Some("SHH"));
        assert_eq!(quote.timestamp.unwrap().timestamp(), 1727420400);
        assert_eq!(quote.source, "yahoo:600519.SS");
    }

    #[tokio::test]
    async fn test_falls_through_to_next_suffix() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/161725.SS"))
            .respond_with(ResponseTemplate::new(404).set_body_string(
                r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/161725.SZ"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"chart":{"result":[{"meta":{"currency":"CNY","regularMarketPrice":0.736}}]}}"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let quote = provider(&mock_server).fetch_fund_price("161725").await.unwrap();
        assert_eq!(quote.price, Decimal::new(736, 3));
        assert_eq!(quote.source, "yahoo:161725.SZ");
        assert!(quote.timestamp.is_none());
    }

    #[tokio::test]
    async fn test_rate_limited_suffix_is_reported() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/513100.SS"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&mock_server)
            .await;

        // .SZ and the bare code fall through to wiremock's default 404
        let result = provider(&mock_server).fetch_fund_price("513100").await;
        assert!(matches!(result, Err(QuoteError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_no_price_result_data() {
        let mock_server = create_mock_server("999999", r#"{"chart": {"result": []}}"#).await;

        let result = provider(&mock_server).fetch_fund_price("999999").await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "No price found for 999999: no chart data for 999999"
        );
    }

    #[tokio::test]
    async fn test_server_error_is_network_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server).fetch_fund_price("512710").await;
        assert!(matches!(result, Err(QuoteError::Network { .. })));
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(CHART)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let provider =
            YahooFinanceProvider::new(&mock_server.uri(), &[".SS".to_string()], Duration::from_millis(50))
                .unwrap();
        let result = provider.fetch_fund_price("600519").await;
        match result {
            Err(QuoteError::Network { reason, .. }) => assert!(reason.contains("timed out")),
            other => panic!("Expected network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_repeated_fetch_returns_equal_quotes() {
        let mock_server = create_mock_server("600519.SS", CHART).await;
        let provider = provider(&mock_server);

        let first = provider.fetch_fund_price("600519").await.unwrap();
        let second = provider.fetch_fund_price("600519").await.unwrap();
        assert_eq!(first, second);
    }
}
