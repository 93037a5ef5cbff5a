//! One-time cloud state refresh.
//!
//! Before reading resources of a cloud, the remote service is asked to
//! refresh its view of that cloud. This happens at most once per
//! (api key, cloud) for the life of the process, however many reads race for
//! it. Callers for different keys proceed in parallel; callers for the same
//! key wait on that key's lock and then observe the first caller's outcome.
//!
//! A failed refresh is remembered and returned to every later caller without
//! calling the service again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::enums::CloudProvider;
use crate::error::ProviderError;

type RefreshKey = (String, i32);

/// The recorded result of the refresh for one key.
#[derive(Debug, Default)]
struct RefreshOutcome {
    done: bool,
    err: Option<(tonic::Code, String)>,
}

/// Memoizes refreshes per (api key, cloud).
#[derive(Debug, Clone, Default)]
pub struct RefreshCoordinator {
    outcomes: Arc<Mutex<HashMap<RefreshKey, Arc<tokio::sync::Mutex<RefreshOutcome>>>>>,
}

impl RefreshCoordinator {
    /// Create an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    fn outcome(&self, key: RefreshKey) -> Arc<tokio::sync::Mutex<RefreshOutcome>> {
        let mut outcomes = self
            .outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        outcomes.entry(key).or_default().clone()
    }

    /// Run `run` unless a refresh for (`api_key`, `cloud`) already ran, and
    /// return its outcome.
    pub async fn refresh<F, Fut>(
        &self,
        api_key: &str,
        cloud: CloudProvider,
        run: F,
    ) -> Result<(), ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ProviderError>>,
    {
        let outcome = self.outcome((api_key.to_string(), cloud as i32));
        let mut outcome = outcome.lock().await;

        if !outcome.done {
            info!(cloud = cloud.as_str_name(), "Refreshing cloud state");
            if let Err(e) = run().await {
                warn!(cloud = cloud.as_str_name(), error = %e, "Cloud state refresh failed");
                outcome.err = Some((e.code().unwrap_or(tonic::Code::Unknown), e.message()));
            }
            outcome.done = true;
        } else {
            debug!(cloud = cloud.as_str_name(), "Cloud state already refreshed");
        }

        match &outcome.err {
            Some((code, message)) => Err(ProviderError::Remote {
                code: *code,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_refresh_runs_once_per_key() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            coordinator
                .refresh("key", CloudProvider::Aws, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let calls_clone = calls.clone();
        coordinator
            .refresh("key", CloudProvider::Azure, || async move {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        let calls_clone = calls.clone();
        coordinator
            .refresh("other", CloudProvider::Aws, || async move {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_failed_refresh() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let coordinator = coordinator.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .refresh("key", CloudProvider::Gcp, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Err(ProviderError::from(tonic::Status::permission_denied(
                            "gcp credentials rejected",
                        )))
                    })
                    .await
            }));
        }

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert_eq!(err.code(), Some(tonic::Code::PermissionDenied));
            assert_eq!(err.to_string(), "gcp credentials rejected");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_retried() {
        let coordinator = RefreshCoordinator::new();
        let first = coordinator
            .refresh("key", CloudProvider::Aws, || async {
                Err(ProviderError::from(tonic::Status::unavailable("down")))
            })
            .await;
        assert!(first.is_err());

        let second = coordinator
            .refresh("key", CloudProvider::Aws, || async { Ok(()) })
            .await;
        let err = second.unwrap_err();
        assert_eq!(err.code(), Some(tonic::Code::Unavailable));
        assert_eq!(err.message(), "down");
    }
}
