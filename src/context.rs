use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Stage, SweepError};

/// Cancellation and deadline shared by every stage of a run
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline measured from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `fut` unless the run is cancelled or the deadline passes first
    pub async fn guard<T, F>(&self, stage: Stage, fut: F) -> Result<T, SweepError>
    where
        F: Future<Output = Result<T, SweepError>>,
    {
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SweepError::Cancelled { stage }),
            _ = deadline => Err(SweepError::Timeout { stage }),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Backend;

    #[tokio::test]
    async fn test_guard_passes_result_through() {
        let ctx = RunContext::new();
        let value = ctx
            .guard(Stage::ActiveSet, async { Ok::<_, SweepError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_times_out() {
        let ctx = RunContext::new().with_timeout(Duration::from_secs(5));
        let err = ctx
            .guard(Stage::Scan(Backend::Cluster), async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, SweepError>(())
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SweepError::Timeout {
                stage: Stage::Scan(Backend::Cluster)
            }
        ));
    }

    #[tokio::test]
    async fn test_guard_observes_cancellation() {
        let ctx = RunContext::new();
        let clone = ctx.clone();
        clone.cancel();

        let err = ctx
            .guard(Stage::ActiveSet, std::future::pending::<Result<(), SweepError>>())
            .await
            .unwrap_err();
        assert!(matches!(err, SweepError::Cancelled { .. }));
        assert!(ctx.is_cancelled());
    }
}
