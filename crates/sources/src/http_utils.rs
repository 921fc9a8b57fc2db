use anyhow::{anyhow, Context, Result};
use reqwest::blocking::{Client, Response};
use serde_json::Value;
use std::time::Duration as StdDuration;

pub fn build_blocking_client(timeout_ms: u64) -> Result<Client> {
    Client::builder()
        .timeout(StdDuration::from_millis(timeout_ms.max(500)))
        .build()
        .context("failed building reqwest blocking client")
}

pub fn redacted_endpoint_label(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return "unknown".to_string();
    }
    match reqwest::Url::parse(endpoint) {
        Ok(url) => {
            let host = url.host_str().unwrap_or("unknown");
            match url.port() {
                Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
                None => format!("{}://{}", url.scheme(), host),
            }
        }
        Err(_) => "invalid_endpoint".to_string(),
    }
}

pub fn classify_request_error(error: &reqwest::Error) -> &'static str {
    if error.is_timeout() {
        "timeout"
    } else if error.is_connect() {
        "connect"
    } else if error.is_request() {
        "request"
    } else if error.is_body() {
        "body"
    } else if error.is_decode() {
        "decode"
    } else if error.is_redirect() {
        "redirect"
    } else if error.is_status() {
        "status"
    } else {
        "other"
    }
}

/// Connection failures, timeouts and DNS failures. DNS errors surface as
/// connect errors in reqwest.
pub fn is_network_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

pub fn read_json_response(response: Response, endpoint: &str) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!(
            "http status={} endpoint={}",
            status.as_u16(),
            redacted_endpoint_label(endpoint)
        ));
    }
    response.json::<Value>().with_context(|| {
        format!(
            "invalid json endpoint={}",
            redacted_endpoint_label(endpoint)
        )
    })
}

pub fn post_rpc(client: &Client, endpoint: &str, payload: &Value) -> Result<Value> {
    let response = client.post(endpoint).json(payload).send().with_context(|| {
        format!(
            "rpc request failed endpoint={}",
            redacted_endpoint_label(endpoint)
        )
    })?;
    read_json_response(response, endpoint)
}

/// Reads a JSON number or numeric string.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|parsed| parsed.is_finite())
}

pub fn value_as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|raw| u32::try_from(raw).ok()),
        Value::String(raw) => raw.trim().parse::<u32>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacted_endpoint_label_drops_path_and_query() {
        assert_eq!(
            redacted_endpoint_label("https://api.helius.xyz/v0/addresses/x/balances?api-key=secret"),
            "https://api.helius.xyz"
        );
        assert_eq!(
            redacted_endpoint_label("http://127.0.0.1:8899"),
            "http://127.0.0.1:8899"
        );
        assert_eq!(redacted_endpoint_label("not a url"), "invalid_endpoint");
        assert_eq!(redacted_endpoint_label(" "), "unknown");
    }

    #[test]
    fn value_as_f64_accepts_numbers_and_numeric_strings() {
        assert_eq!(value_as_f64(&json!(1.25)), Some(1.25));
        assert_eq!(value_as_f64(&json!("0.004")), Some(0.004));
        assert_eq!(value_as_f64(&json!("n/a")), None);
        assert_eq!(value_as_f64(&json!(null)), None);
    }

    #[test]
    fn value_as_u32_accepts_numbers_and_numeric_strings() {
        assert_eq!(value_as_u32(&json!(9)), Some(9));
        assert_eq!(value_as_u32(&json!("6")), Some(6));
        assert_eq!(value_as_u32(&json!(-1)), None);
    }
}
