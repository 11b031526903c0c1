//! Deadline wrapper for any provider.
//!
//! A slow model must not hold a request forever. Completions and
//! embeddings that exceed the deadline become [`ProviderError::Timeout`].

use async_trait::async_trait;
use cloudpilot_core::error::ProviderError;
use cloudpilot_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub struct TimeoutProvider {
    inner: Arc<dyn Provider>,
    timeout: Duration,
}

impl TimeoutProvider {
    pub fn new(inner: Arc<dyn Provider>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    fn timed_out(&self, what: &str) -> ProviderError {
        warn!(
            provider = %self.inner.name(),
            timeout_secs = self.timeout.as_secs(),
            "{what} timed out"
        );
        ProviderError::Timeout(format!(
            "Provider '{}' timed out after {}s",
            self.inner.name(),
            self.timeout.as_secs()
        ))
    }
}

#[async_trait]
impl Provider for TimeoutProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<Completion, ProviderError> {
        tokio::time::timeout(self.timeout, self.inner.complete(request))
            .await
            .map_err(|_| self.timed_out("Completion"))?
    }

    async fn embed(&self, inputs: &[String]) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        tokio::time::timeout(self.timeout, self.inner.embed(inputs))
            .await
            .map_err(|_| self.timed_out("Embedding"))?
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        tokio::time::timeout(self.timeout, self.inner.health_check())
            .await
            .map_err(|_| self.timed_out("Health check"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A provider that sleeps before answering.
    struct SlowProvider {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Provider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(Completion::new(request.prompt, "slow-1"))
        }
    }

    fn slow(delay_secs: u64) -> Arc<SlowProvider> {
        Arc::new(SlowProvider {
            delay: Duration::from_secs(delay_secs),
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn fast_call_passes_through() {
        let inner = slow(1);
        let provider = TimeoutProvider::new(inner.clone(), Duration::from_secs(10));
        let completion = provider.complete(CompletionRequest::new("hi")).await.unwrap();
        assert_eq!(completion.text, "hi");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.name(), "slow");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let provider = TimeoutProvider::new(slow(600), Duration::from_secs(120));
        let err = provider.complete(CompletionRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
        assert!(err.to_string().contains("120s"));
    }

    #[tokio::test]
    async fn inner_errors_are_preserved() {
        let provider = TimeoutProvider::new(slow(0), Duration::from_secs(1));
        let err = provider.embed(&["x".into()]).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
