use std::collections::HashSet;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a single merge request (GitLab `iid`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(pub u64);

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReviewId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(ReviewId)
    }
}

/// Review ids that are still open at scan time.
///
/// Built once per run and never mutated afterwards, so it can be shared by
/// every scanner task behind an `Arc` without locking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSet {
    ids: HashSet<ReviewId>,
}

impl ActiveSet {
    pub fn new(ids: impl IntoIterator<Item = ReviewId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: ReviewId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in ascending order, for reporting
    pub fn sorted(&self) -> Vec<ReviewId> {
        let mut ids: Vec<_> = self.ids.iter().copied().collect();
        ids.sort();
        ids
    }
}

impl FromIterator<ReviewId> for ActiveSet {
    fn from_iter<T: IntoIterator<Item = ReviewId>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Infrastructure system hosting review-scoped resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Kubernetes namespaces
    Cluster,
    /// Database instances
    Database,
    /// Object-storage buckets
    ObjectStore,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Cluster, Backend::Database, Backend::ObjectStore];

    /// Short label used in reports and logs
    pub fn label(&self) -> &'static str {
        match self {
            Backend::Cluster => "k8s",
            Backend::Database => "database",
            Backend::ObjectStore => "object-store",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A review id found in a backend but absent from the active set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DanglingItem {
    pub review_id: ReviewId,
    pub backend: Backend,
}

impl fmt::Display for DanglingItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.backend, self.review_id)
    }
}

/// Result of a complete, successful sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub scanned_at: DateTime<Utc>,
    pub backends: Vec<Backend>,
    pub active: Vec<ReviewId>,
    pub dangling: Vec<DanglingItem>,
}

impl SweepReport {
    /// Dangling ids for one backend, in the order they were received
    pub fn dangling_for(&self, backend: Backend) -> Vec<ReviewId> {
        self.dangling
            .iter()
            .filter(|d| d.backend == backend)
            .map(|d| d.review_id)
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.dangling.is_empty()
    }
}
