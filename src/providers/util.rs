use crate::core::QuoteError;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Builds a client whose every request is bounded by `timeout`.
pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Sends a quote request and maps transport failures, 404 and 429 responses
/// onto the per-code error kinds.
pub async fn send_quote_request(
    code: &str,
    request: reqwest::RequestBuilder,
) -> Result<Response, QuoteError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            QuoteError::network(code, format!("request timed out: {e}"))
        } else {
            QuoteError::network(code, format!("request error: {e}"))
        }
    })?;

    match response.status() {
        s if s.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(QuoteError::not_found(code, "HTTP 404 Not Found")),
        StatusCode::TOO_MANY_REQUESTS => Err(QuoteError::rate_limited(
            code,
            "HTTP 429 Too Many Requests",
        )),
        s => Err(QuoteError::network(code, format!("HTTP error: {s}"))),
    }
}

/// Reads a response body as text, mapping read failures to network errors.
pub async fn read_body(code: &str, response: Response) -> Result<String, QuoteError> {
    response
        .text()
        .await
        .map_err(|e| QuoteError::network(code, format!("failed to read response body: {e}")))
}
