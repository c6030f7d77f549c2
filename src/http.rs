use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// POST `body` as `application/json`. Errors only on transport failure;
    /// any status code is returned as a response.
    async fn post_json(&self, url: &str, body: String) -> Result<HttpResponse>;
}

/// No request timeout is set; the stack's defaults apply.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    #[tracing::instrument(skip(self, body), fields(body_len = body.len()))]
    async fn post_json(&self, url: &str, body: String) -> Result<HttpResponse> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(status = status.as_u16(), "Response received");

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::HeaderMap, http::StatusCode, routing::post};
    use tokio::net::TcpListener;

    async fn spawn(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn posts_json_and_returns_body() {
        let app = Router::new().route(
            "/echo",
            post(|headers: HeaderMap, body: String| async move {
                let content_type = headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                format!("{content_type}|{body}")
            }),
        );
        let base = spawn(app).await;

        let response = ReqwestClient::new()
            .post_json(&format!("{base}/echo"), r#"{"a":1}"#.to_string())
            .await
            .unwrap();

        assert!(response.is_success());
        assert_eq!(response.status_text, "OK");
        assert_eq!(response.body, r#"application/json|{"a":1}"#);
    }

    #[tokio::test]
    async fn error_status_is_a_response_not_an_error() {
        let app = Router::new().route(
            "/fail",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "internal error") }),
        );
        let base = spawn(app).await;

        let response = ReqwestClient::new()
            .post_json(&format!("{base}/fail"), "{}".to_string())
            .await
            .unwrap();

        assert!(!response.is_success());
        assert_eq!(response.status, 500);
        assert_eq!(response.status_text, "Internal Server Error");
        assert_eq!(response.body, "internal error");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = ReqwestClient::new()
            .post_json(&format!("http://{addr}/predict"), "{}".to_string())
            .await;
        assert!(result.is_err());
    }
}
