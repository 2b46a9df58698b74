use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

use super::NameLister;

/// How the cluster scanner finds its kubeconfig
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSettings {
    /// Explicit kubeconfig; `None` lets kube infer (in-cluster or `$KUBECONFIG`)
    pub kubeconfig: Option<PathBuf>,
}

impl ClusterSettings {
    pub fn new(kubeconfig: Option<PathBuf>) -> Self {
        Self { kubeconfig }
    }

    /// `~/.kube/config` when it exists, otherwise inferred config
    pub fn from_env() -> Self {
        let kubeconfig = dirs::home_dir()
            .map(|home| home.join(".kube").join("config"))
            .filter(|path| path.exists());
        Self { kubeconfig }
    }

    /// Explicit path wins over the environment default
    pub fn with_override(self, kubeconfig: Option<PathBuf>) -> Self {
        match kubeconfig {
            Some(path) => Self::new(Some(path)),
            None => self,
        }
    }
}

/// Lists Kubernetes namespaces visible to the configured credentials
pub struct NamespaceLister {
    settings: ClusterSettings,
}

impl NamespaceLister {
    pub fn new(settings: ClusterSettings) -> Self {
        Self { settings }
    }

    async fn client(&self) -> Result<Client> {
        let config = match &self.settings.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).with_context(|| {
                    format!("Failed to read kubeconfig from {}", path.display())
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .context("Failed to create Kubernetes config from kubeconfig")?
            }
            None => Config::infer()
                .await
                .context("Failed to infer Kubernetes config")?,
        };

        Client::try_from(config).context("Failed to create Kubernetes client")
    }
}

#[async_trait]
impl NameLister for NamespaceLister {
    async fn list_names(&self) -> Result<Vec<String>> {
        let namespaces: Api<Namespace> = Api::all(self.client().await?);
        let list = namespaces
            .list(&ListParams::default())
            .await
            .context("Failed to list namespaces")?;

        debug!(count = list.items.len(), "Listed namespaces");

        Ok(list
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect())
    }
}
