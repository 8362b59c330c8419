//! Batched JSON-RPC execution
//!
//! Compiled payloads are sent as array-bodied POSTs of at most
//! `max_requests_per_batch` requests, strictly one batch at a time, pausing
//! between batches. Responses are matched to requests by position.

use crate::config::FetchOptions;
use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::time::Duration;

#[async_trait]
pub trait Transport: Send + Sync {
    /// POSTs `body` as JSON to `endpoint` and returns the parsed JSON response.
    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<Value>().await?)
    }
}

/// One account returned by `getProgramAccounts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAccount {
    pub pubkey: String,
    /// Base64 account data, possibly a `dataSlice` of it
    pub data: String,
}

/// Sends every payload and returns one account list per payload, in order.
///
/// Failed batches and malformed responses yield empty lists rather than errors.
pub async fn execute(
    payloads: &[Value],
    endpoint: &str,
    options: &FetchOptions,
    transport: &dyn Transport,
) -> Vec<Vec<RawAccount>> {
    let batch_size = options.max_requests_per_batch.max(1);
    let batch_count = payloads.len().div_ceil(batch_size);
    let mut results = Vec::with_capacity(payloads.len());

    for (index, batch) in payloads.chunks(batch_size).enumerate() {
        let body = Value::Array(batch.to_vec());
        if options.debug {
            tracing::debug!(request = %body, "getProgramAccounts batch");
        }
        tracing::debug!(
            "Sending batch {}/{} ({} requests) to {}",
            index + 1,
            batch_count,
            batch.len(),
            endpoint
        );

        match transport.post(endpoint, &body).await {
            Ok(Value::Array(items)) => {
                if options.debug {
                    let response = serde_json::to_string(&items).unwrap_or_default();
                    tracing::debug!(response = %response, "getProgramAccounts batch response");
                }
                if items.len() != batch.len() {
                    tracing::warn!(
                        "Batch {} returned {} responses for {} requests",
                        index + 1,
                        items.len(),
                        batch.len()
                    );
                }
                for position in 0..batch.len() {
                    results.push(items.get(position).map(parse_response).unwrap_or_default());
                }
            }
            Ok(other) => {
                tracing::warn!("Batch {} returned a non-array response: {}", index + 1, other);
                results.extend(std::iter::repeat_with(Vec::new).take(batch.len()));
            }
            Err(e) => {
                tracing::warn!("Batch {} failed: {}", index + 1, e);
                results.extend(std::iter::repeat_with(Vec::new).take(batch.len()));
            }
        }

        if !options.delay_between_batches.is_zero() && index + 1 < batch_count {
            tokio::time::sleep(options.delay_between_batches).await;
        }
    }

    results
}

/// Extracts accounts from one JSON-RPC response object.
fn parse_response(response: &Value) -> Vec<RawAccount> {
    if let Some(error) = response.get("error") {
        tracing::warn!("getProgramAccounts error: {}", error);
        return Vec::new();
    }

    let accounts = match response.get("result") {
        Some(Value::Array(items)) => items,
        Some(Value::Object(envelope)) => match envelope.get("value") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => {
            tracing::warn!("getProgramAccounts response missing result");
            return Vec::new();
        }
    };

    accounts.iter().filter_map(parse_account).collect()
}

fn parse_account(item: &Value) -> Option<RawAccount> {
    let pubkey = item.get("pubkey")?.as_str()?.to_string();
    let data = match item.pointer("/account/data")? {
        Value::Array(parts) => parts.first()?.as_str()?,
        Value::String(blob) => blob.as_str(),
        _ => return None,
    };
    Some(RawAccount {
        pubkey,
        data: data.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Echoes one empty result per request and records call times.
    struct EchoTransport {
        calls: Mutex<Vec<(Instant, usize)>>,
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn post(&self, _endpoint: &str, body: &Value) -> Result<Value, TransportError> {
            let n = body.as_array().map(Vec::len).unwrap_or(0);
            self.calls.lock().unwrap().push((Instant::now(), n));
            Ok(Value::Array(
                (0..n).map(|_| json!({ "jsonrpc": "2.0", "id": 1, "result": [] })).collect(),
            ))
        }
    }

    /// Paused time advances in whole timer ticks; allow one tick of slack.
    fn assert_close(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual <= expected + Duration::from_millis(1),
            "expected ~{:?}, got {:?}",
            expected,
            actual
        );
    }

    fn payloads(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({ "id": 1, "params": [i.to_string()] })).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_are_paced() {
        for (n, batch_size) in [(1, 1), (5, 2), (6, 3), (7, 100), (10, 1)] {
            let transport = EchoTransport {
                calls: Mutex::new(Vec::new()),
            };
            let options = FetchOptions::default()
                .with_batch_size(batch_size)
                .with_batch_delay(Duration::from_millis(250));

            let start = Instant::now();
            let results = execute(&payloads(n), "http://rpc", &options, &transport).await;
            let batches = n.div_ceil(batch_size);

            assert_eq!(results.len(), n);
            let calls = transport.calls.lock().unwrap();
            assert_eq!(calls.len(), batches);
            assert_eq!(calls.iter().map(|(_, c)| c).sum::<usize>(), n);
            assert_close(start.elapsed(), Duration::from_millis(250) * (batches as u32 - 1));
            for pair in calls.windows(2) {
                assert_close(pair[1].0 - pair[0].0, Duration::from_millis(250));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_and_zero_batch_size() {
        let transport = EchoTransport {
            calls: Mutex::new(Vec::new()),
        };
        let options = FetchOptions::default()
            .with_batch_size(0)
            .with_batch_delay(Duration::ZERO);

        let start = Instant::now();
        let results = execute(&payloads(3), "http://rpc", &options, &transport).await;

        assert_eq!(results.len(), 3);
        assert_eq!(transport.calls.lock().unwrap().len(), 3);
        assert_close(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_debug_logging_keeps_results() {
        let transport = EchoTransport {
            calls: Mutex::new(Vec::new()),
        };
        let options = FetchOptions::default()
            .with_debug(true)
            .with_batch_size(2)
            .with_batch_delay(Duration::ZERO);

        let results = execute(&payloads(3), "http://rpc", &options, &transport).await;

        assert_eq!(results.len(), 3);
        assert_eq!(transport.calls.lock().unwrap().len(), 2);
    }

    struct FailingTransport;

    #[async_trait]
    impl Transport for FailingTransport {
        async fn post(&self, _endpoint: &str, _body: &Value) -> Result<Value, TransportError> {
            Err(TransportError::Rejected("503".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_batch_degrades_to_empty() {
        let options = FetchOptions::default().with_batch_delay(Duration::ZERO);
        let results = execute(&payloads(4), "http://rpc", &options, &FailingTransport).await;

        assert_eq!(results, vec![Vec::<RawAccount>::new(); 4]);
    }

    #[test]
    fn test_parse_response_shapes() {
        let bare = json!({
            "result": [
                { "pubkey": "A", "account": { "data": ["AQI=", "base64"] } },
                { "pubkey": "B", "account": { "data": "AwQ=" } },
                { "pubkey": "C", "account": {} }
            ]
        });
        assert_eq!(
            parse_response(&bare),
            vec![
                RawAccount { pubkey: "A".into(), data: "AQI=".into() },
                RawAccount { pubkey: "B".into(), data: "AwQ=".into() },
            ]
        );

        let envelope = json!({
            "result": {
                "context": { "slot": 1 },
                "value": [{ "pubkey": "A", "account": { "data": ["", "base64"] } }]
            }
        });
        assert_eq!(parse_response(&envelope).len(), 1);

        assert!(parse_response(&json!({ "error": { "code": -32602 } })).is_empty());
        assert!(parse_response(&json!({ "result": null })).is_empty());
    }
}
