use anyhow::{Result, bail};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

/// Synchronous call into a deployed model endpoint.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, endpoint_name: &str, content_type: &str, body: Vec<u8>)
    -> Result<Vec<u8>>;
}

/// Calls `{runtime_url}/endpoints/{endpoint_name}/invocations`.
#[derive(Debug, Clone)]
pub struct HttpModelInvoker {
    client: reqwest::Client,
    runtime_url: String,
}

impl HttpModelInvoker {
    pub fn new(runtime_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            runtime_url: runtime_url.into(),
        }
    }

    fn invocation_url(&self, endpoint_name: &str) -> String {
        format!(
            "{}/endpoints/{}/invocations",
            self.runtime_url.trim_end_matches('/'),
            endpoint_name
        )
    }
}

#[async_trait]
impl ModelInvoker for HttpModelInvoker {
    #[tracing::instrument(skip(self, body), fields(body_len = body.len()))]
    async fn invoke(
        &self,
        endpoint_name: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(self.invocation_url(endpoint_name))
            .header(CONTENT_TYPE, content_type)
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            bail!(
                "Model endpoint {} returned {}: {}",
                endpoint_name,
                status,
                String::from_utf8_lossy(&bytes)
            );
        }

        tracing::debug!(response_len = bytes.len(), "Model invocation completed");
        Ok(bytes.to_vec())
    }
}
