use async_trait::async_trait;
use serde::Serialize;
use site_builder_store::{CacheInvalidator, DeliveryError};
use std::time::Duration;
use tracing::info;

/// Posts `{"site": ..., "paths": [...]}` to a URL after each publish
#[derive(Debug, Clone)]
pub struct WebhookInvalidator {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Serialize)]
struct InvalidationRequest<'a> {
    site: &'a str,
    paths: &'a [String],
}

impl WebhookInvalidator {
    pub fn new(url: impl Into<String>) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DeliveryError::Request(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CacheInvalidator for WebhookInvalidator {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn invalidate(&self, site: &str, paths: &[String]) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.url)
            .json(&InvalidationRequest { site, paths })
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(site, count = paths.len(), "invalidation webhook accepted");
        Ok(())
    }
}
