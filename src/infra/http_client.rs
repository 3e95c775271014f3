use crate::app::ports::{HttpClientPort, HttpResponse};
use crate::constants::USER_AGENT;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// reqwest-backed transport. Built once per process; every request carries
/// the configured timeout.
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.unwrap_or(USER_AGENT))
            .build()?;
        Ok(Self { client })
    }

    async fn into_response(resp: reqwest::Response) -> Result<HttpResponse, String> {
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = resp.bytes().await.map_err(|e| e.to_string())?.to_vec();
        tracing::debug!(status, size = bytes.len(), "HTTP response");
        Ok(HttpResponse { status, bytes, content_type })
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get(&self, url: &str) -> Result<HttpResponse, String> {
        tracing::debug!(url, "HTTP GET");
        let resp = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        Self::into_response(resp).await
    }

    async fn post(&self, url: &str, content_type: &str, body: String) -> Result<HttpResponse, String> {
        tracing::debug!(url, bytes = body.len(), "HTTP POST");
        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Self::into_response(resp).await
    }
}
