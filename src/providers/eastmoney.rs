use crate::core::price::{FundPriceProvider, Quote, QuoteError, decimal_price};
use crate::providers::util::{http_client, read_body, send_quote_request};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, instrument};

static NET_WORTH_TREND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)var\s+Data_netWorthTrend\s*=\s*(\[.*?\]);").expect("valid regex")
});

/// Net asset values from the Eastmoney `pingzhongdata` script.
///
/// The endpoint serves JavaScript; the `Data_netWorthTrend` array holds one
/// `{x: epoch_millis, y: nav}` point per trading day, oldest first.
pub struct EastmoneyProvider {
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct NetWorthPoint {
    x: Option<i64>,
    y: Option<f64>,
}

impl EastmoneyProvider {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        Ok(EastmoneyProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
        })
    }
}

fn parse_latest_net_worth(code: &str, script: &str) -> Result<Quote, QuoteError> {
    let array = NET_WORTH_TREND
        .captures(script)
        .and_then(|c| c.get(1))
        .ok_or_else(|| QuoteError::not_found(code, "no Data_netWorthTrend in response"))?;

    let points: Vec<NetWorthPoint> = serde_json::from_str(array.as_str())
        .map_err(|e| QuoteError::not_found(code, format!("failed to parse net worth trend: {e}")))?;

    let (latest, price) = points
        .iter()
        .rev()
        .find_map(|p| p.y.map(|y| (p, y)))
        .ok_or_else(|| QuoteError::not_found(code, "net worth trend is empty"))?;

    Ok(Quote {
        code: code.to_string(),
        price: decimal_price(code, price)?,
        currency: Some("CNY".to_string()),
        exchange: None,
        timestamp: latest
            .x
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        source: "eastmoney".to_string(),
    })
}

#[async_trait]
impl FundPriceProvider for EastmoneyProvider {
    #[instrument(name = "EastmoneyPriceFetch", skip(self), fields(code = %code))]
    async fn fetch_fund_price(&self, code: &str) -> Result<Quote, QuoteError> {
        let url = format!("{}/pingzhongdata/{}.js", self.base_url, code);
        debug!("Requesting net worth trend from {}", url);

        let response = send_quote_request(code, self.client.get(&url)).await?;
        let script = read_body(code, response).await?;
        parse_latest_net_worth(code, &script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SCRIPT: &str = r#"/*161903*/var ishb=false;var fS_name = "万家行业优选混合(LOF)";var fS_code = "161903";
/*单位净值走势*/var Data_netWorthTrend = [{"x":1727280000000,"y":1.402,"equityReturn":0.42,"unitMoney":""},
{"x":1727366400000,"y":1.431,"equityReturn":2.07,"unitMoney":""}];
/*累计净值走势*/var Data_ACWorthTrend = [[1727280000000,3.602],[1727366400000,3.631]];"#;

    #[test]
    fn test_parse_takes_latest_point() {
        let quote = parse_latest_net_worth("161903", SCRIPT).unwrap();
        assert_eq!(quote.price, Decimal::new(1431, 3));
        assert_eq!(quote.timestamp.unwrap().timestamp_millis(), 1727366400000);
        assert_eq!(quote.currency.as_deref(), Some("CNY"));
    }

    #[test]
    fn test_parse_without_trend() {
        let result = parse_latest_net_worth("161903", "var fS_code = \"161903\";");
        assert!(matches!(result, Err(QuoteError::NotFound { .. })));
    }

    #[test]
    fn test_parse_empty_trend() {
        let result = parse_latest_net_worth("161903", "var Data_netWorthTrend = [];");
        assert_eq!(
            result.unwrap_err().to_string(),
            "No price found for 161903: net worth trend is empty"
        );
    }

    #[tokio::test]
    async fn test_successful_fetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pingzhongdata/161903.js"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(SCRIPT)
                    .insert_header("content-type", "application/javascript; charset=utf-8"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = EastmoneyProvider::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();
        let quote = provider.fetch_fund_price("161903").await.unwrap();
        assert_eq!(quote.code, "161903");
        assert_eq!(quote.source, "eastmoney");
    }

    #[tokio::test]
    async fn test_unknown_fund_is_not_found() {
        let mock_server = MockServer::start().await;
        let provider = EastmoneyProvider::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();

        let result = provider.fetch_fund_price("000000").await;
        assert!(matches!(result, Err(QuoteError::NotFound { .. })));
    }
}
