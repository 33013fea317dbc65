use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Invalidation request failed: {0}")]
    Request(String),

    #[error("Invalidation rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Tells the delivery layer that published paths changed.
///
/// Callers report failures and carry on: a stale cache is not worth
/// failing a publish over.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    fn name(&self) -> &'static str;

    /// `paths` are site-relative, e.g. `/index.html`
    async fn invalidate(&self, site: &str, paths: &[String]) -> Result<(), DeliveryError>;
}

/// Does nothing, for storage that is served directly
#[derive(Debug, Default)]
pub struct NoopInvalidator;

#[async_trait]
impl CacheInvalidator for NoopInvalidator {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn invalidate(&self, _site: &str, _paths: &[String]) -> Result<(), DeliveryError> {
        Ok(())
    }
}

/// Logs the paths that would be invalidated
#[derive(Debug, Default)]
pub struct LogInvalidator;

#[async_trait]
impl CacheInvalidator for LogInvalidator {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn invalidate(&self, site: &str, paths: &[String]) -> Result<(), DeliveryError> {
        info!(site, paths = ?paths, "cache invalidation");
        Ok(())
    }
}

/// Remembers every call; optionally fails them all
#[derive(Debug, Default)]
pub struct RecordingInvalidator {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    fail: bool,
}

impl RecordingInvalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl CacheInvalidator for RecordingInvalidator {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn invalidate(&self, site: &str, paths: &[String]) -> Result<(), DeliveryError> {
        self.calls
            .lock()
            .await
            .push((site.to_string(), paths.to_vec()));
        if self.fail {
            return Err(DeliveryError::Request("simulated failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_invalidator() {
        let recorder = RecordingInvalidator::new();
        recorder
            .invalidate("example.com", &["/index.html".to_string()])
            .await
            .unwrap();
        assert_eq!(
            recorder.calls().await,
            vec![("example.com".to_string(), vec!["/index.html".to_string()])]
        );
    }

    #[tokio::test]
    async fn test_failing_invalidator_still_records() {
        let recorder = RecordingInvalidator::failing();
        assert!(recorder.invalidate("example.com", &[]).await.is_err());
        assert_eq!(recorder.calls().await.len(), 1);
    }
}
