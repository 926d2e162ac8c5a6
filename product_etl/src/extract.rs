use serde_json::Value;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{EtlError, Result};

pub struct Extractor {
    client: reqwest::Client,
    endpoint: String,
}

impl Extractor {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| EtlError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.products_endpoint(),
        })
    }

    /// One GET against the products endpoint. No retries.
    pub async fn extract(&self) -> Result<Vec<Value>> {
        let body = self.fetch().await.map_err(|e| {
            error!("Failed to fetch data from API: {}", e);
            EtlError::Network(e)
        })?;

        let products = parse_products(&body).inspect_err(|e| error!("{}", e))?;

        info!(
            "Successfully extracted {} products from {}",
            products.len(),
            self.endpoint
        );
        Ok(products)
    }

    async fn fetch(&self) -> reqwest::Result<Vec<u8>> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.bytes().await?.to_vec())
    }
}

/// Pulls the non-empty `products` array out of the response envelope.
pub fn parse_products(body: &[u8]) -> Result<Vec<Value>> {
    let envelope: Value = serde_json::from_slice(body)
        .map_err(|e| EtlError::Format(format!("response is not valid JSON: {e}")))?;

    let products = match envelope {
        Value::Object(mut map) => map.remove("products"),
        _ => {
            return Err(EtlError::Format(
                "response body is not a JSON object".to_string(),
            ))
        }
    };

    match products {
        Some(Value::Array(products)) if !products.is_empty() => Ok(products),
        Some(Value::Array(_)) | Some(Value::Null) | None => Err(EtlError::Format(
            "No products found in API response".to_string(),
        )),
        Some(other) => Err(EtlError::Format(format!(
            "expected `products` to be an array, got {}",
            json_type(&other)
        ))),
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn format_message(result: Result<Vec<Value>>) -> String {
        match result {
            Err(EtlError::Format(message)) => message,
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn parse_returns_records_untouched() {
        let body = json!({
            "products": [{"id": 1, "title": "Widget", "extra": [1, 2]}],
            "total": 1
        });

        let products = parse_products(body.to_string().as_bytes()).unwrap();

        assert_eq!(products, vec![json!({"id": 1, "title": "Widget", "extra": [1, 2]})]);
    }

    #[test]
    fn parse_rejects_empty_and_missing_products() {
        for body in [json!({"products": []}), json!({"items": [1]}), json!({"products": null})] {
            let message = format_message(parse_products(body.to_string().as_bytes()));
            assert_eq!(message, "No products found in API response");
        }
    }

    #[test]
    fn parse_rejects_wrong_shapes() {
        let message = format_message(parse_products(br#"{"products": "lots"}"#));
        assert!(message.contains("a string"), "{message}");

        let message = format_message(parse_products(b"[1, 2, 3]"));
        assert!(message.contains("not a JSON object"), "{message}");

        let message = format_message(parse_products(b"<html>"));
        assert!(message.contains("not valid JSON"), "{message}");
    }

    #[tokio::test]
    async fn extract_fetches_products_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "products": [{"id": 1}, {"id": 2}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = Config::default().with_base_url(server.uri());
        let products = Extractor::new(&config).unwrap().extract().await.unwrap();

        assert_eq!(products.len(), 2);
    }

    #[tokio::test]
    async fn extract_maps_http_status_to_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let config = Config::default().with_base_url(server.uri());
        let err = Extractor::new(&config).unwrap().extract().await.unwrap_err();

        assert_eq!(err.kind(), "NetworkError");
    }

    #[tokio::test]
    async fn extract_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"products": [{"id": 1}]}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut config = Config::default().with_base_url(server.uri());
        config.request_timeout = Duration::from_millis(200);
        let err = Extractor::new(&config).unwrap().extract().await.unwrap_err();

        match err {
            EtlError::Network(cause) => assert!(cause.is_timeout()),
            other => panic!("expected network error, got {other:?}"),
        }
    }
}
