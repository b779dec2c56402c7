use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use crate::error::{Error, Result};
use crate::triggers::Parameters;
use crate::types::ids::FunctionId;

/// Runs user functions in the secure execution environment. Treated as slow
/// and unreliable: callers never block scheduling on it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FunctionExecutor: Send + Sync {
    async fn execute(&self, function_id: &FunctionId, parameters: &Parameters) -> Result<Value>;
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    function_id: &'a FunctionId,
    parameters: &'a Parameters,
}

/// Posts executions to the executor service over HTTP.
pub struct HttpFunctionExecutor {
    endpoint: String,
    client: Client,
}

impl HttpFunctionExecutor {
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(HttpFunctionExecutor {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl FunctionExecutor for HttpFunctionExecutor {
    async fn execute(&self, function_id: &FunctionId, parameters: &Parameters) -> Result<Value> {
        let response = self.client
            .post(&self.endpoint)
            .json(&ExecuteRequest { function_id, parameters })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ExecutionFailed(format!("HTTP {}: {}", status, body)));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_function_and_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/execute"))
            .and(body_json(json!({"function_id": "fn-1", "parameters": {"to": "NXa", "amount": 2}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tx": "0xabc"})))
            .expect(1)
            .mount(&server)
            .await;

        let executor = HttpFunctionExecutor::new(format!("{}/execute", server.uri()), Duration::from_secs(5)).unwrap();
        let mut params = Parameters::new();
        params.insert("to".to_string(), json!("NXa"));
        params.insert("amount".to_string(), json!(2));

        let result = executor.execute(&"fn-1".into(), &params).await.unwrap();
        assert_eq!(result, json!({"tx": "0xabc"}));
    }

    #[tokio::test]
    async fn non_success_status_is_execution_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("enclave unavailable"))
            .mount(&server)
            .await;

        let executor = HttpFunctionExecutor::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = executor.execute(&"fn-1".into(), &Parameters::new()).await.unwrap_err();
        assert!(matches!(err, Error::ExecutionFailed(ref msg) if msg.contains("enclave unavailable")));
    }
}
