pub mod cluster;
pub mod database;
pub mod object_store;

pub use cluster::{ClusterSettings, NamespaceLister};
pub use database::DatabaseLister;
pub use object_store::BucketLister;

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, instrument};

use crate::error::ScanError;
use crate::filter::is_dangling;
use crate::models::{ActiveSet, Backend, ReviewId};

/// Namespace prefix used by the review deployment pipeline
pub const CLUSTER_PREFIX: &str = "mirera-2-42-review-";

/// Database name prefix, also sent to the server as `^mirera-review`
pub const DATABASE_PREFIX: &str = "mirera-review";

/// Bucket names carry the review id right after `mirera-`
pub const BUCKET_PATTERN: &str = r"^mirera-[0-9]+";

static BUCKET_REGEX: OnceLock<Regex> = OnceLock::new();

/// Enumerates resources in one backend and reports dangling review ids
#[async_trait]
pub trait ResourceScanner: Send + Sync {
    fn backend(&self) -> Backend;

    /// One full enumeration pass; ids keep the backend's listing order
    async fn scan(&self, active: &ActiveSet) -> Result<Vec<ReviewId>, ScanError>;
}

/// Read-only listing of resource names in a backend
#[async_trait]
pub trait NameLister: Send + Sync {
    async fn list_names(&self) -> anyhow::Result<Vec<String>>;
}

/// Decides whether a resource name belongs to a review
#[derive(Debug, Clone)]
pub enum NameMatcher {
    Prefix(String),
    Pattern(Regex),
}

impl NameMatcher {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameMatcher::Prefix(prefix) => name.starts_with(prefix.as_str()),
            NameMatcher::Pattern(re) => re.is_match(name),
        }
    }
}

/// Backend naming convention: which names are review-owned, and where the id sits
#[derive(Debug, Clone)]
pub struct NamingRule {
    matcher: NameMatcher,
    delimiter: char,
    index: usize,
}

impl NamingRule {
    pub fn new(matcher: NameMatcher, delimiter: char, index: usize) -> Self {
        Self {
            matcher,
            delimiter,
            index,
        }
    }

    /// `mirera-2-42-review-<id>`
    pub fn cluster() -> Self {
        Self::new(NameMatcher::Prefix(CLUSTER_PREFIX.to_string()), '-', 4)
    }

    /// `mirera-review-<id>[-...]`
    pub fn database() -> Self {
        Self::new(NameMatcher::Prefix(DATABASE_PREFIX.to_string()), '-', 2)
    }

    /// `mirera-<id>[-...]`
    pub fn object_store() -> Self {
        let re = BUCKET_REGEX
            .get_or_init(|| Regex::new(BUCKET_PATTERN).expect("bucket pattern is a valid regex"));
        Self::new(NameMatcher::Pattern(re.clone()), '-', 1)
    }

    pub fn for_backend(backend: Backend) -> Self {
        match backend {
            Backend::Cluster => Self::cluster(),
            Backend::Database => Self::database(),
            Backend::ObjectStore => Self::object_store(),
        }
    }

    /// Review id embedded in `name`.
    ///
    /// `Ok(None)` for names outside the convention. A name that matches but
    /// carries no integer at the id position is an error: the convention has
    /// drifted and skipping it would under-report.
    pub fn extract(&self, name: &str) -> Result<Option<ReviewId>, ScanError> {
        if !self.matcher.matches(name) {
            return Ok(None);
        }

        let segment = name
            .split(self.delimiter)
            .nth(self.index)
            .ok_or_else(|| ScanError::MissingSegment {
                name: name.to_string(),
                index: self.index,
            })?;

        segment
            .parse::<ReviewId>()
            .map(Some)
            .map_err(|source| ScanError::InvalidIdentifier {
                name: name.to_string(),
                segment: segment.to_string(),
                source,
            })
    }
}

/// Apply a naming rule and the orphan filter to a listing.
///
/// Duplicates are kept: two resources for the same review yield two ids.
pub fn scan_names<I, S>(
    rule: &NamingRule,
    names: I,
    active: &ActiveSet,
) -> Result<Vec<ReviewId>, ScanError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut dangling = Vec::new();

    for name in names {
        let name = name.as_ref();
        let Some(id) = rule.extract(name)? else {
            continue;
        };

        if is_dangling(id, active) {
            debug!(name, review = %id, "Dangling resource");
            dangling.push(id);
        }
    }

    Ok(dangling)
}

/// Generic scanner: list names, then run them through the backend's rule
pub struct NameScanner<L> {
    backend: Backend,
    rule: NamingRule,
    lister: L,
}

impl<L: NameLister> NameScanner<L> {
    pub fn new(backend: Backend, lister: L) -> Self {
        Self {
            backend,
            rule: NamingRule::for_backend(backend),
            lister,
        }
    }
}

#[async_trait]
impl<L: NameLister> ResourceScanner for NameScanner<L> {
    fn backend(&self) -> Backend {
        self.backend
    }

    #[instrument(skip(self, active), fields(backend = %self.backend))]
    async fn scan(&self, active: &ActiveSet) -> Result<Vec<ReviewId>, ScanError> {
        let names = self
            .lister
            .list_names()
            .await
            .map_err(ScanError::Enumerate)?;

        debug!(count = names.len(), "Listed resources");

        let dangling = scan_names(&self.rule, &names, active)?;

        info!(
            listed = names.len(),
            dangling = dangling.len(),
            "Scan complete"
        );

        Ok(dangling)
    }
}
