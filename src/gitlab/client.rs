use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::config::SourceControlConfig;
use crate::error::SweepError;
use crate::models::{ActiveSet, ReviewId};

/// Source of the review ids that are still open
#[async_trait]
pub trait ActiveSetProvider: Send + Sync {
    async fn fetch(&self) -> Result<ActiveSet, SweepError>;
}

/// GitLab REST client for merge request listings
pub struct GitLabClient {
    client: Client,
    base_url: String,
    project_id: u64,
    per_page: u32,
    token: String,
}

#[derive(Debug, Deserialize)]
struct MergeRequest {
    iid: u64,
}

impl GitLabClient {
    /// Create a client for one project, authenticated with a private token
    pub fn new(config: &SourceControlConfig, token: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            project_id: config.project_id,
            per_page: config.per_page.max(1),
            token: token.to_string(),
        })
    }

    fn merge_requests_url(&self) -> String {
        format!(
            "{}/api/v4/projects/{}/merge_requests",
            self.base_url, self.project_id
        )
    }

    /// Ids of every open merge request, following pagination
    #[instrument(skip(self), fields(project = self.project_id))]
    pub async fn open_merge_requests(&self) -> Result<Vec<ReviewId>> {
        let url = self.merge_requests_url();
        let mut ids = Vec::new();
        let mut page: u32 = 1;

        loop {
            debug!(page, "Fetching merge request page");

            let response = self
                .client
                .get(&url)
                .query(&[("state", "opened")])
                .query(&[("per_page", self.per_page), ("page", page)])
                .header("PRIVATE-TOKEN", &self.token)
                .send()
                .await
                .context("Failed to send request to GitLab")?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                anyhow::bail!("GitLab API error ({}): {}", status, error_text);
            }

            let next_page = response
                .headers()
                .get("x-next-page")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u32>().ok());

            let batch: Vec<MergeRequest> = response
                .json()
                .await
                .context("Failed to parse merge request list")?;

            ids.extend(batch.into_iter().map(|mr| ReviewId(mr.iid)));

            match next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        info!(count = ids.len(), "Fetched open merge requests");

        Ok(ids)
    }
}

#[async_trait]
impl ActiveSetProvider for GitLabClient {
    async fn fetch(&self) -> Result<ActiveSet, SweepError> {
        self.open_merge_requests()
            .await
            .map(ActiveSet::new)
            .map_err(SweepError::ActiveSetFetch)
    }
}
