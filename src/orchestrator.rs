use std::collections::BTreeSet;
use std::pin::pin;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tracing::info;

use crate::aggregator::{aggregate, SharedScanner};
use crate::config::Config;
use crate::context::RunContext;
use crate::error::{Stage, SweepError};
use crate::gitlab::ActiveSetProvider;
use crate::models::{Backend, SweepReport};
use crate::scanner::{
    BucketLister, ClusterSettings, DatabaseLister, NameScanner, NamespaceLister,
};

/// Drives a sweep: active set first, then every backend scan in parallel
pub struct Orchestrator<P: ActiveSetProvider> {
    provider: P,
    scanners: Vec<SharedScanner>,
}

impl<P: ActiveSetProvider> Orchestrator<P> {
    pub fn new(provider: P, scanners: Vec<SharedScanner>) -> Self {
        Self {
            provider,
            scanners,
        }
    }

    pub fn backends(&self) -> Vec<Backend> {
        self.scanners.iter().map(|s| s.backend()).collect()
    }

    /// Run one sweep.
    ///
    /// Any error ends the run; a report is only returned when the active set
    /// and every backend scan succeeded.
    pub async fn run(&self, ctx: &RunContext) -> Result<SweepReport, SweepError> {
        let backends = self.backends();
        info!(backends = ?backends, "Starting sweep");

        let active = ctx.guard(Stage::ActiveSet, self.provider.fetch()).await?;
        info!(open = active.len(), "Fetched active merge requests");

        let active = Arc::new(active);
        let mut items = pin!(aggregate(
            self.scanners.clone(),
            Arc::clone(&active),
            ctx.clone()
        ));

        let mut dangling = Vec::new();
        while let Some(item) = items.next().await {
            let item = item?;
            info!(backend = %item.backend, review = %item.review_id, "Dangling resource");
            dangling.push(item);
        }

        info!(dangling = dangling.len(), "Sweep complete");

        Ok(SweepReport {
            scanned_at: Utc::now(),
            backends,
            active: active.sorted(),
            dangling,
        })
    }
}

/// One scanner per requested backend, in a stable order without repeats
pub fn build_scanners(
    config: &Config,
    backends: &[Backend],
    cluster: &ClusterSettings,
) -> Result<Vec<SharedScanner>, SweepError> {
    let selected: BTreeSet<Backend> = backends.iter().copied().collect();

    selected
        .into_iter()
        .map(|backend| {
            let scanner: SharedScanner = match backend {
                Backend::Cluster => Arc::new(NameScanner::new(
                    backend,
                    NamespaceLister::new(cluster.clone()),
                )),
                Backend::Database => Arc::new(NameScanner::new(
                    backend,
                    DatabaseLister::new(config.database_url()?),
                )),
                Backend::ObjectStore => Arc::new(NameScanner::new(
                    backend,
                    BucketLister::new(config.object_store_access()?),
                )),
            };
            Ok(scanner)
        })
        .collect()
}

/// Plain-text report for stdout
pub fn generate_summary(report: &SweepReport) -> String {
    let mut out = String::new();

    let active: Vec<String> = report.active.iter().map(|id| id.to_string()).collect();
    out.push_str(&format!(
        "Open merge requests ({}): {}\n\n",
        active.len(),
        if active.is_empty() {
            "none".to_string()
        } else {
            active.join(", ")
        }
    ));

    if report.is_clean() {
        out.push_str("No dangling resources found.\n");
        return out;
    }

    out.push_str("Dangling resources:\n");
    for item in &report.dangling {
        out.push_str(&format!("  {}\n", item));
    }

    out.push_str("\nTotals:\n");
    for backend in &report.backends {
        out.push_str(&format!(
            "  {}: {}\n",
            backend,
            report.dangling_for(*backend).len()
        ));
    }

    out
}

/// JSON report, for piping into cleanup tooling
pub fn generate_json(report: &SweepReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::ScanError;
    use crate::models::{ActiveSet, DanglingItem, ReviewId};
    use crate::scanner::tests::StaticLister;
    use crate::scanner::ResourceScanner;

    struct FixedProvider(Result<Vec<u64>, &'static str>);

    #[async_trait]
    impl ActiveSetProvider for FixedProvider {
        async fn fetch(&self) -> Result<ActiveSet, SweepError> {
            match &self.0 {
                Ok(ids) => Ok(ids.iter().map(|id| ReviewId(*id)).collect()),
                Err(msg) => Err(SweepError::ActiveSetFetch(anyhow::anyhow!(*msg))),
            }
        }
    }

    /// Records whether a scan was ever started
    struct WatchedScanner {
        called: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ResourceScanner for WatchedScanner {
        fn backend(&self) -> Backend {
            Backend::Cluster
        }

        async fn scan(&self, _active: &ActiveSet) -> Result<Vec<ReviewId>, ScanError> {
            self.called.store(true, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn scanner(backend: Backend, names: &[&str]) -> SharedScanner {
        Arc::new(NameScanner::new(backend, StaticLister::of(names)))
    }

    #[tokio::test]
    async fn test_run_reports_every_backend() {
        let orchestrator = Orchestrator::new(
            FixedProvider(Ok(vec![9, 5, 7])),
            vec![
                scanner(
                    Backend::Cluster,
                    &["mirera-2-42-review-5", "mirera-2-42-review-12", "other-ns"],
                ),
                scanner(Backend::Database, &["mirera-review-3", "mirera-review-3-backup"]),
                scanner(Backend::ObjectStore, &["mirera-7-assets", "mirera-8"]),
            ],
        );

        let report = orchestrator.run(&RunContext::new()).await.unwrap();

        assert_eq!(report.active, vec![ReviewId(5), ReviewId(7), ReviewId(9)]);
        assert_eq!(report.dangling_for(Backend::Cluster), vec![ReviewId(12)]);
        assert_eq!(
            report.dangling_for(Backend::Database),
            vec![ReviewId(3), ReviewId(3)]
        );
        assert_eq!(report.dangling_for(Backend::ObjectStore), vec![ReviewId(8)]);
        assert_eq!(report.dangling.len(), 4);
    }

    #[tokio::test]
    async fn test_fetch_failure_starts_no_scan() {
        let called = Arc::new(AtomicBool::new(false));
        let orchestrator = Orchestrator::new(
            FixedProvider(Err("503 Service Unavailable")),
            vec![Arc::new(WatchedScanner {
                called: Arc::clone(&called),
            })],
        );

        let err = orchestrator.run(&RunContext::new()).await.unwrap_err();
        assert!(matches!(err, SweepError::ActiveSetFetch(_)));
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_scan_failure_returns_no_report() {
        let orchestrator = Orchestrator::new(
            FixedProvider(Ok(vec![])),
            vec![
                scanner(Backend::Cluster, &["mirera-2-42-review-12"]),
                scanner(Backend::ObjectStore, &["mirera-8", "mirera-9z"]),
            ],
        );

        let err = orchestrator.run(&RunContext::new()).await.unwrap_err();
        assert!(matches!(
            err,
            SweepError::Scan {
                backend: Backend::ObjectStore,
                source: ScanError::InvalidIdentifier { .. }
            }
        ));
    }

    #[test]
    fn test_build_scanners_dedups_and_orders() {
        let config: Config = serde_json::from_str(
            r#"{"gitlab": "t", "mongo": "postgres://db/postgres",
                "minio": {"endpoint": "minio:9000", "access": "a", "secret": "s"}}"#,
        )
        .unwrap();

        let scanners = build_scanners(
            &config,
            &[Backend::ObjectStore, Backend::Cluster, Backend::ObjectStore],
            &ClusterSettings::default(),
        )
        .unwrap();

        let backends: Vec<_> = scanners.iter().map(|s| s.backend()).collect();
        assert_eq!(backends, vec![Backend::Cluster, Backend::ObjectStore]);
    }

    #[test]
    fn test_build_scanners_requires_backend_config() {
        let config: Config = serde_json::from_str(r#"{"gitlab": "t"}"#).unwrap();

        assert!(build_scanners(&config, &[Backend::Cluster], &ClusterSettings::default()).is_ok());
        assert!(matches!(
            build_scanners(&config, &[Backend::Database], &ClusterSettings::default()),
            Err(SweepError::Config { .. })
        ));

        let config: Config =
            serde_json::from_str(r#"{"gitlab": "t", "mongo": "mongodb://127.0.0.1:27017"}"#)
                .unwrap();
        assert!(matches!(
            build_scanners(&config, &Backend::ALL, &ClusterSettings::default()),
            Err(SweepError::Config { .. })
        ));
    }

    fn report(dangling: Vec<DanglingItem>) -> SweepReport {
        SweepReport {
            scanned_at: Utc::now(),
            backends: Backend::ALL.to_vec(),
            active: vec![ReviewId(5), ReviewId(9)],
            dangling,
        }
    }

    #[test]
    fn test_generate_summary_clean() {
        let summary = generate_summary(&report(Vec::new()));
        assert!(summary.contains("Open merge requests (2): 5, 9"));
        assert!(summary.contains("No dangling resources found"));
    }

    #[test]
    fn test_generate_summary_lists_items() {
        let summary = generate_summary(&report(vec![
            DanglingItem {
                review_id: ReviewId(12),
                backend: Backend::Cluster,
            },
            DanglingItem {
                review_id: ReviewId(8),
                backend: Backend::ObjectStore,
            },
        ]));

        assert!(summary.contains("  k8s\t12\n"));
        assert!(summary.contains("  object-store\t8\n"));
        assert!(summary.contains("  database: 0\n"));
    }

    #[test]
    fn test_generate_json() {
        let json = generate_json(&report(vec![DanglingItem {
            review_id: ReviewId(3),
            backend: Backend::Database,
        }]))
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["dangling"][0]["review_id"], 3);
        assert_eq!(value["dangling"][0]["backend"], "database");
        assert_eq!(value["active"], serde_json::json!([5, 9]));
    }
}
