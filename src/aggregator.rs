use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::stream::{self, Stream};
use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::error::{Stage, SweepError};
use crate::models::{ActiveSet, Backend, DanglingItem, ReviewId};
use crate::scanner::ResourceScanner;

/// Scanner shared with its task
pub type SharedScanner = Arc<dyn ResourceScanner>;

/// The single terminal outcome every scanner task reports
struct TaskOutcome {
    backend: Backend,
    result: Result<Vec<ReviewId>, SweepError>,
}

/// Fan-in over concurrently running scanners.
///
/// Items come out in the order scanners finish; within one backend they keep
/// the scanner's enumeration order. The first failure cancels the shared
/// context, aborts the remaining tasks and ends the aggregation.
pub struct FanIn {
    tasks: JoinSet<TaskOutcome>,
    pending: VecDeque<DanglingItem>,
    remaining: usize,
    ctx: RunContext,
    finished: bool,
}

impl FanIn {
    /// Start one task per scanner
    pub fn spawn(scanners: Vec<SharedScanner>, active: Arc<ActiveSet>, ctx: RunContext) -> Self {
        let mut tasks = JoinSet::new();

        for scanner in scanners {
            let backend = scanner.backend();
            let active = Arc::clone(&active);
            let task_ctx = ctx.clone();

            tasks.spawn(async move {
                debug!(%backend, "Scanner started");
                let scan = task_ctx.guard(Stage::Scan(backend), async {
                    scanner
                        .scan(&active)
                        .await
                        .map_err(|source| SweepError::Scan { backend, source })
                });
                let result = AssertUnwindSafe(scan)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(SweepError::TaskFailed {
                            backend,
                            message: panic_message(&*panic),
                        })
                    });
                TaskOutcome { backend, result }
            });
        }

        let remaining = tasks.len();
        info!(scanners = remaining, "Started backend scans");

        Self {
            tasks,
            pending: VecDeque::new(),
            remaining,
            ctx,
            finished: false,
        }
    }

    /// Next dangling item, the first error, or `None` once every scanner is done
    pub async fn next(&mut self) -> Option<Result<DanglingItem, SweepError>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(Ok(item));
            }

            if self.finished {
                return None;
            }

            if self.remaining == 0 {
                self.finished = true;
                info!("All backend scans complete");
                return None;
            }

            let joined = match self.tasks.join_next().await {
                Some(joined) => joined,
                None => {
                    // Only reachable if a task was joined outside this loop
                    self.finished = true;
                    return None;
                }
            };

            match joined {
                Ok(TaskOutcome {
                    backend,
                    result: Ok(ids),
                }) => {
                    self.remaining -= 1;
                    info!(
                        %backend,
                        dangling = ids.len(),
                        remaining = self.remaining,
                        "Scanner finished"
                    );
                    self.pending.extend(
                        ids.into_iter()
                            .map(|review_id| DanglingItem { review_id, backend }),
                    );
                }
                Ok(TaskOutcome {
                    result: Err(err), ..
                }) => {
                    return Some(Err(self.fail(err)));
                }
                Err(join_err) => {
                    // Panics are caught inside the task; only an external abort lands here
                    debug!(error = %join_err, "Scanner task did not complete");
                    let err = SweepError::Cancelled {
                        stage: Stage::Aggregate,
                    };
                    return Some(Err(self.fail(err)));
                }
            }
        }
    }

    fn fail(&mut self, err: SweepError) -> SweepError {
        warn!(error = %err, "Scan failed, cancelling remaining scans");
        self.ctx.cancel();
        self.tasks.abort_all();
        self.pending.clear();
        self.finished = true;
        err
    }

    /// Turn the fan-in into a stream that ends after completion or the first error
    pub fn into_stream(self) -> impl Stream<Item = Result<DanglingItem, SweepError>> {
        stream::unfold(self, |mut fan_in| async move {
            fan_in.next().await.map(|item| (item, fan_in))
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "scanner panicked".to_string()
    }
}

/// Run every scanner concurrently against `active` and merge their results
pub fn aggregate(
    scanners: Vec<SharedScanner>,
    active: Arc<ActiveSet>,
    ctx: RunContext,
) -> impl Stream<Item = Result<DanglingItem, SweepError>> {
    FanIn::spawn(scanners, active, ctx).into_stream()
}
