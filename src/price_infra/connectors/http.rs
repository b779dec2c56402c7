use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use crate::error::{Error, Result};
use crate::price_infra::connectors::{binance, coinbase, PriceSource};
use crate::price_infra::{PriceSourceConfig, ResponseFormat};

pub struct HttpPriceSource {
    name: String,
    endpoint: String,
    format: ResponseFormat,
    client: Client,
}

impl HttpPriceSource {
    pub fn new(config: &PriceSourceConfig, client: Client) -> Self {
        HttpPriceSource {
            name: config.name.clone(),
            endpoint: config.endpoint.clone(),
            format: config.format.clone(),
            client,
        }
    }

    fn url_for(&self, symbol: &str) -> String {
        self.endpoint.replace("{symbol}", symbol)
    }

    fn failed(&self, reason: impl Into<String>) -> Error {
        Error::SourceFailed {
            source_name: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn parse(&self, body: &[u8]) -> Result<f64> {
        match &self.format {
            ResponseFormat::Binance => binance::parse_price(&self.name, body),
            ResponseFormat::Coinbase => coinbase::parse_price(&self.name, body),
            ResponseFormat::Json { pointer } => {
                let doc: Value = serde_json::from_slice(body)
                    .map_err(|e| self.failed(format!("invalid JSON: {}", e)))?;

                match doc.pointer(pointer) {
                    Some(Value::Number(n)) => n.as_f64()
                        .ok_or_else(|| self.failed(format!("{} is not a float", pointer))),
                    Some(Value::String(s)) => s.parse()
                        .map_err(|_| self.failed(format!("unparseable price '{}'", s))),
                    Some(_) => Err(self.failed(format!("{} is not numeric", pointer))),
                    None => Err(self.failed(format!("{} not found", pointer))),
                }
            }
        }
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn fetch_price(&self, symbol: &str) -> Result<f64> {
        let url = self.url_for(symbol);

        let response = self.client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.failed(format!("HTTP {}", status)));
        }

        let body = response.bytes()
            .await
            .map_err(|e| self.failed(e.to_string()))?;

        let price = self.parse(&body)?;
        if !price.is_finite() || price <= 0.0 {
            return Err(self.failed(format!("non-positive price {}", price)));
        }

        tracing::debug!("Fetched {} from {}: {}", symbol, self.name, price);
        Ok(price)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer, endpoint: &str, format: ResponseFormat) -> HttpPriceSource {
        let config = PriceSourceConfig {
            name: "test".to_string(),
            weight: None,
            endpoint: format!("{}{}", server.uri(), endpoint),
            format,
            enabled: true,
        };
        HttpPriceSource::new(&config, Client::new())
    }

    #[tokio::test]
    async fn fetches_binance_ticker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/price"))
            .and(query_param("symbol", "NEOUSDT"))
            .respond_with(ResponseTemplate::new(200)
                .set_body_json(json!({"symbol": "NEOUSDT", "price": "10.25"})))
            .mount(&server)
            .await;

        let src = source(&server, "/api/v3/ticker/price?symbol={symbol}USDT", ResponseFormat::Binance);
        assert_eq!(src.fetch_price("NEO").await.unwrap(), 10.25);
    }

    #[tokio::test]
    async fn fetches_coinbase_spot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/prices/GAS-USD/spot"))
            .respond_with(ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"amount": "4.5", "base": "GAS", "currency": "USD"}})))
            .mount(&server)
            .await;

        let src = source(&server, "/v2/prices/{symbol}-USD/spot", ResponseFormat::Coinbase);
        assert_eq!(src.fetch_price("GAS").await.unwrap(), 4.5);
    }

    #[tokio::test]
    async fn extracts_value_by_pointer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quotes/NEO"))
            .respond_with(ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"quote": {"usd": 11.0}}})))
            .mount(&server)
            .await;

        let src = source(
            &server,
            "/quotes/{symbol}",
            ResponseFormat::Json { pointer: "/data/quote/usd".to_string() },
        );
        assert_eq!(src.fetch_price("NEO").await.unwrap(), 11.0);
    }

    #[tokio::test]
    async fn server_error_is_a_source_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let src = source(&server, "/quotes/{symbol}", ResponseFormat::Json { pointer: "/p".to_string() });
        let err = src.fetch_price("NEO").await.unwrap_err();
        assert!(matches!(err, Error::SourceFailed { ref reason, .. } if reason.contains("503")));
    }

    #[tokio::test]
    async fn zero_price_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"p": 0})))
            .mount(&server)
            .await;

        let src = source(&server, "/quotes/{symbol}", ResponseFormat::Json { pointer: "/p".to_string() });
        assert!(src.fetch_price("NEO").await.is_err());
    }
}
