use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use tracing::debug;

use super::NameLister;
use crate::config::ObjectStoreAccess;

/// MinIO ignores the region, but the SDK requires one
const DEFAULT_REGION: &str = "us-east-1";

/// Lists buckets on an S3-compatible object store
pub struct BucketLister {
    endpoint_url: String,
    access_key: String,
    secret_key: String,
}

impl BucketLister {
    pub fn new(access: &ObjectStoreAccess) -> Self {
        Self {
            endpoint_url: endpoint_url(&access.endpoint, access.secure),
            access_key: access.access.clone(),
            secret_key: access.secret.clone(),
        }
    }

    async fn client(&self) -> Client {
        let credentials = Credentials::new(
            &self.access_key,
            &self.secret_key,
            None,
            None,
            "review-sweep",
        );

        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(&self.endpoint_url)
            .credentials_provider(credentials)
            .region(Region::new(DEFAULT_REGION))
            .load()
            .await;

        let config = aws_sdk_s3::config::Builder::from(&shared_config)
            .force_path_style(true)
            .build();

        Client::from_conf(config)
    }
}

#[async_trait]
impl NameLister for BucketLister {
    async fn list_names(&self) -> Result<Vec<String>> {
        let output = self
            .client()
            .await
            .list_buckets()
            .send()
            .await
            .with_context(|| format!("Failed to list buckets at {}", self.endpoint_url))?;

        // No server-side filter for ListBuckets; the naming rule does it
        let names: Vec<String> = output
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.name().map(str::to_string))
            .collect();

        debug!(count = names.len(), "Listed buckets");

        Ok(names)
    }
}

/// Credentials files carry a bare `host:port`; add a scheme when missing
fn endpoint_url(endpoint: &str, secure: bool) -> String {
    if endpoint.contains("://") {
        return endpoint.to_string();
    }
    let scheme = if secure { "https" } else { "http" };
    format!("{}://{}", scheme, endpoint)
}
